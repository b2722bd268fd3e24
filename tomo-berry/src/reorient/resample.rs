use std::path::{Path, PathBuf};

use ndarray::Array3;

use crate::tool::ToolError;
use crate::{Idx3d, VolumeError, VolumeFormat, VolumeSource};

/// 重采样错误.
#[derive(Debug, thiserror::Error)]
pub enum ResampleError {
    /// 外部工具失败 (非零退出, 超时, 无法启动).
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// 工具成功退出但没有产出文件.
    #[error("resampler produced no output at {}", .0.display())]
    MissingOutput(PathBuf),

    /// 读取输入或输出体数据失败.
    #[error(transparent)]
    Volume(#[from] VolumeError),

    /// 无法解析输入或输出路径.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 重采样器不支持该格式的输入.
    #[error("resampler cannot read {0:?} volumes")]
    UnsupportedInput(VolumeFormat),

    /// 输出形状与请求不符.
    #[error("resampled shape {found:?} differs from requested {expected:?}")]
    ShapeMismatch {
        /// 请求的 (t, 高, 宽).
        expected: Idx3d,

        /// 实际的 (t, 高, 宽).
        found: Idx3d,
    },
}

/// 一次重采样请求.
///
/// 输出是 `(thickness, height, width)` 的体数据; 输出中心
/// `((width - 1) / 2, (height - 1) / 2, (thickness - 1) / 2)` 对应输入中的 `center`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ResampleRequest {
    /// 输出宽度.
    pub width: usize,

    /// 输出高度.
    pub height: usize,

    /// 输出层数, 即 slab 厚度.
    pub thickness: usize,

    /// 旋转中心 `[x, y, z]`, 输入体素坐标.
    pub center: [f64; 3],

    /// `[rx, ry, rz]` 度数.
    pub rotation: [f64; 3],
}

impl ResampleRequest {
    /// 期望的输出形状 (t, 高, 宽).
    #[inline]
    pub fn output_shape(&self) -> Idx3d {
        (self.thickness, self.height, self.width)
    }

    /// 检查 `data` 形状是否符合请求.
    pub fn check_output(&self, data: &Array3<f32>) -> Result<(), ResampleError> {
        let expected = self.output_shape();
        let found = data.dim();
        if found != expected {
            return Err(ResampleError::ShapeMismatch { expected, found });
        }
        Ok(())
    }
}

/// 旋转重采样器.
///
/// 实现必须可以被多个工作线程共享. 中间文件只能写在 `workdir` 中.
pub trait Resampler: Sync {
    /// 按 `request` 重采样 `volume`.
    fn resample(
        &self,
        volume: &VolumeSource,
        request: &ResampleRequest,
        workdir: &Path,
    ) -> Result<Array3<f32>, ResampleError>;
}

impl<R: Resampler + ?Sized> Resampler for &R {
    fn resample(
        &self,
        volume: &VolumeSource,
        request: &ResampleRequest,
        workdir: &Path,
    ) -> Result<Array3<f32>, ResampleError> {
        (**self).resample(volume, request, workdir)
    }
}
