//! 外部命令行工具 (IMOD 等) 的调用.
//!
//! 工具以子进程方式同步运行, stdout/stderr 由独立线程读取以免管道写满阻塞,
//! 超时后子进程被杀死并报告 [`ToolError::Timeout`].

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// 轮询子进程状态的间隔.
const POLL: Duration = Duration::from_millis(20);

/// 运行外部工具错误.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// 无法启动 (通常是找不到可执行文件).
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        /// 程序名.
        program: String,

        /// 底层错误.
        source: std::io::Error,
    },

    /// 等待子进程时的 I/O 错误.
    #[error("failed to wait for `{program}`: {source}")]
    Wait {
        /// 程序名.
        program: String,

        /// 底层错误.
        source: std::io::Error,
    },

    /// 运行超时, 子进程已被杀死.
    #[error("`{program}` timed out after {}s", .after.as_secs_f64())]
    Timeout {
        /// 程序名.
        program: String,

        /// 超时时长.
        after: Duration,
    },

    /// 非零退出.
    #[error("`{program}` exited with {status}: {stderr}")]
    Failed {
        /// 程序名.
        program: String,

        /// 退出状态.
        status: ExitStatus,

        /// 标准错误输出 (截断后).
        stderr: String,
    },
}

/// 子进程的输出.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// 标准输出.
    pub stdout: Vec<u8>,

    /// 标准错误输出.
    pub stderr: Vec<u8>,
}

impl ToolOutput {
    /// 以 UTF-8 (有损) 解读标准输出.
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

fn program_name(cmd: &Command) -> String {
    cmd.get_program().to_string_lossy().into_owned()
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            // 读失败时保留已读到的部分.
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn wait_with_deadline(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            child.kill()?;
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(POLL);
    }
}

/// 相对当前进程目录的绝对路径. 工具在自己的工作目录中运行,
/// 传给它们的文件路径必须先经过这一步.
pub fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    std::path::absolute(path)
}

/// 运行 `cmd`, 最多等待 `timeout`. 只有零退出才返回 `Ok`.
pub fn run(cmd: &mut Command, timeout: Duration) -> Result<ToolOutput, ToolError> {
    let program = program_name(cmd);
    log::debug!("running {cmd:?}");

    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ToolError::Spawn {
            program: program.clone(),
            source,
        })?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = match wait_with_deadline(&mut child, timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            return Err(ToolError::Timeout {
                program,
                after: timeout,
            })
        }
        Err(source) => return Err(ToolError::Wait { program, source }),
    };

    let output = ToolOutput {
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
    };
    if !status.success() {
        let mut stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.len() > 512 {
            let mut cut = 512;
            while !stderr.is_char_boundary(cut) {
                cut -= 1;
            }
            stderr.truncate(cut);
        }
        return Err(ToolError::Failed {
            program,
            status,
            stderr,
        });
    }
    Ok(output)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn test_collects_stdout() {
        let out = run(&mut sh("echo hello; echo oops >&2"), Duration::from_secs(10)).unwrap();
        assert_eq!(out.stdout_lossy(), "hello\n");
        assert_eq!(out.stderr, b"oops\n");
    }

    #[test]
    fn test_nonzero_exit() {
        let err = run(&mut sh("echo bad >&2; exit 3"), Duration::from_secs(10)).unwrap_err();
        match err {
            ToolError::Failed { status, stderr, .. } => {
                assert_eq!(status.code(), Some(3));
                assert_eq!(stderr, "bad");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_timeout_kills_child() {
        let start = Instant::now();
        let err = run(&mut sh("sleep 5"), Duration::from_millis(100)).unwrap_err();
        assert!(matches!(err, ToolError::Timeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_relative_path_survives_workdir() {
        // 相对于进程目录的文件, 在另一个工作目录里运行的命令也能找到.
        let local = tempfile::Builder::new().tempdir_in(".").unwrap();
        let rel = local.path().file_name().map(Path::new).unwrap().join("in.txt");
        assert!(rel.is_relative());
        std::fs::write(&rel, "payload").unwrap();

        let work = tempfile::tempdir().unwrap();
        let abs = absolute(&rel).unwrap();
        assert!(abs.is_absolute());
        let mut cmd = Command::new("cat");
        cmd.arg(&abs).current_dir(work.path());
        assert_eq!(run(&mut cmd, Duration::from_secs(10)).unwrap().stdout, b"payload");

        let mut cmd = Command::new("cat");
        cmd.arg(&rel).current_dir(work.path());
        assert!(run(&mut cmd, Duration::from_secs(10)).is_err());
    }

    #[test]
    fn test_missing_binary() {
        let mut cmd = Command::new("/nonexistent/definitely-not-a-tool");
        let err = run(&mut cmd, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
    }
}
