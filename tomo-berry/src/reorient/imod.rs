//! 调用 IMOD `rotatevol` 的重采样器.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use ndarray::Array3;

use super::{ResampleError, ResampleRequest, Resampler};
use crate::consts::defaults::{ROTATEVOL, TOOL_TIMEOUT_SECS};
use crate::{mrc, tool, VolumeFormat, VolumeSource};

/// 同一工作目录中多次调用的输出文件编号.
static OUTPUT_SEQ: AtomicUsize = AtomicUsize::new(0);

/// 离开作用域时删除文件.
struct RemoveOnDrop(PathBuf);

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        if self.0.exists() {
            if let Err(e) = std::fs::remove_file(&self.0) {
                log::warn!("cannot remove {}: {e}", self.0.display());
            }
        }
    }
}

/// 以子进程方式运行 `rotatevol`. 只接受 MRC 输入.
#[derive(Debug, Clone)]
pub struct ImodResampler {
    program: PathBuf,
    timeout: Duration,
}

impl Default for ImodResampler {
    fn default() -> Self {
        Self {
            program: PathBuf::from(ROTATEVOL),
            timeout: Duration::from_secs(TOOL_TIMEOUT_SECS),
        }
    }
}

impl ImodResampler {
    /// 指定 `rotatevol` 可执行文件与超时.
    pub fn new<P: Into<PathBuf>>(program: P, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// 构建命令行. `-angles` 的顺序是 Z, Y, X.
    fn command(&self, input: &Path, output: &Path, req: &ResampleRequest) -> Command {
        let [cx, cy, cz] = req.center;
        let [rx, ry, rz] = req.rotation;
        let mut cmd = Command::new(&self.program);
        cmd.arg(input)
            .arg(output)
            .arg("-size")
            .arg(format!("{},{},{}", req.width, req.height, req.thickness))
            .arg("-center")
            .arg(format!("{cx},{cy},{cz}"))
            .arg("-angles")
            .arg(format!("{rz},{ry},{rx}"));
        cmd
    }
}

impl Resampler for ImodResampler {
    fn resample(
        &self,
        volume: &VolumeSource,
        request: &ResampleRequest,
        workdir: &Path,
    ) -> Result<Array3<f32>, ResampleError> {
        let info = volume.info();
        if info.format() != VolumeFormat::Mrc {
            return Err(ResampleError::UnsupportedInput(info.format()));
        }

        let seq = OUTPUT_SEQ.fetch_add(1, Ordering::Relaxed);
        let output = tool::absolute(&workdir.join(format!("rotated{seq}.mrc")))?;
        let guard = RemoveOnDrop(output.clone());

        let input = tool::absolute(info.path())?;
        let mut cmd = self.command(&input, &output, request);
        cmd.current_dir(workdir);
        tool::run(&mut cmd, self.timeout)?;

        if !output.is_file() {
            return Err(ResampleError::MissingOutput(output));
        }
        let data = mrc::read_volume(&guard.0)?;
        request.check_output(&data)?;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn request() -> ResampleRequest {
        ResampleRequest {
            width: 6,
            height: 4,
            thickness: 3,
            center: [2.5, 1.5, 7.0],
            rotation: [10.0, 20.0, 30.0],
        }
    }

    #[test]
    fn test_command_line() {
        let r = ImodResampler::default();
        let cmd = r.command(Path::new("in.rec"), Path::new("out.mrc"), &request());
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(cmd.get_program(), "rotatevol");
        assert_eq!(
            args,
            ["in.rec", "out.mrc", "-size", "6,4,3", "-center", "2.5,1.5,7", "-angles", "30,20,10"]
        );
    }

    #[test]
    fn test_rejects_memory_volume() {
        let dir = tempfile::tempdir().unwrap();
        let vol = VolumeSource::from_array(Array3::zeros((2, 2, 2)));
        let err = ImodResampler::default()
            .resample(&vol, &request(), dir.path())
            .unwrap_err();
        assert!(matches!(err, ResampleError::UnsupportedInput(VolumeFormat::Memory)));
    }

    /// 用 shell 脚本冒充 `rotatevol`: 把输入原样复制到输出.
    #[cfg(unix)]
    #[test]
    fn test_fake_tool_round_trip() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-rotatevol");
        std::fs::write(&script, "#!/bin/sh\ncp \"$1\" \"$2\"\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let input = dir.path().join("vol.rec");
        let data = Array3::from_shape_fn((3, 4, 6), |(z, h, w)| (z * 100 + h * 10 + w) as f32);
        mrc::write_volume(&input, data.view()).unwrap();
        let vol = VolumeSource::open(&input).unwrap();

        let work = tempfile::tempdir().unwrap();
        let r = ImodResampler::new(&script, Duration::from_secs(10));
        let out = r.resample(&vol, &request(), work.path()).unwrap();
        assert_eq!(out, data);
        // 输出在读回后被删除.
        assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);

        let bad = ResampleRequest {
            thickness: 1,
            ..request()
        };
        let err = r.resample(&vol, &bad, work.path()).unwrap_err();
        assert!(matches!(err, ResampleError::ShapeMismatch { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_relative_input_and_workdir() {
        use std::os::unix::fs::PermissionsExt;

        let tools = tempfile::tempdir().unwrap();
        let script = tools.path().join("fake-rotatevol");
        std::fs::write(&script, "#!/bin/sh\ncp \"$1\" \"$2\"\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        // 数据与工作目录都以相对于进程目录的路径给出.
        let local = tempfile::Builder::new().tempdir_in(".").unwrap();
        let rel = local.path().file_name().map(Path::new).unwrap();
        let input = rel.join("vol.rec");
        let work = rel.join("work");
        std::fs::create_dir(&work).unwrap();
        let data = Array3::from_shape_fn((3, 4, 6), |(z, h, w)| (z * 10 + h + w) as f32);
        mrc::write_volume(&input, data.view()).unwrap();
        let vol = VolumeSource::open(&input).unwrap();
        assert!(vol.info().path().is_relative());

        let r = ImodResampler::new(&script, Duration::from_secs(10));
        let out = r.resample(&vol, &request(), &work).unwrap();
        assert_eq!(out, data);
        assert_eq!(std::fs::read_dir(&work).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("vol.mrc");
        mrc::write_volume(&input, Array3::<f32>::zeros((1, 2, 2)).view()).unwrap();
        let vol = VolumeSource::open(&input).unwrap();
        let r = ImodResampler::new("true", Duration::from_secs(10));
        let err = r.resample(&vol, &request(), dir.path()).unwrap_err();
        assert!(matches!(err, ResampleError::MissingOutput(_)));
    }
}
