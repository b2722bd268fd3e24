//! 取向 slab 的重采样与平均.
//!
//! 约定: 输出平面与体数据的宽、高相同 (`W x H`), slab 的短轴是输出的 Z 方向,
//! 共 `T` 层; 标注中心位于输出体的中心. 旋转依次绕 Z、Y、X 轴.

mod imod;
mod native;
mod resample;
mod rotation;

use std::num::NonZeroUsize;
use std::path::Path;

pub use imod::ImodResampler;
pub use native::NativeResampler;
pub use resample::{ResampleError, ResampleRequest, Resampler};
pub use rotation::Rotation;

use crate::consts::defaults::{MAX_VOLUME_HEIGHT, SLAB_THICKNESS};
use crate::orient::AnnotationRecord;
use crate::{Idx3d, Projection, VolumeInfo, VolumeSource};

/// 重定向错误.
#[derive(Debug, thiserror::Error)]
pub enum ReorientError {
    /// 体数据高度超过上限, 未做任何重采样.
    #[error("volume height {height} exceeds the ceiling {limit}")]
    Oversize {
        /// 体数据高度.
        height: usize,

        /// 配置的上限.
        limit: usize,
    },

    /// 标注中心不在体数据内.
    #[error("annotation center {center:?} lies outside volume of shape {shape:?}")]
    OutOfBounds {
        /// 标注中心 `[x, y, z]`.
        center: [f64; 3],

        /// 体数据形状 (z, 高, 宽).
        shape: Idx3d,
    },

    /// 重采样失败.
    #[error(transparent)]
    Resample(#[from] ResampleError),
}

/// 对单条标注生成一张平均投影.
#[derive(Debug, Clone)]
pub struct SlabReorienter<R> {
    resampler: R,
    thickness: NonZeroUsize,
    max_height: Option<usize>,
}

impl<R: Resampler> SlabReorienter<R> {
    /// 使用默认厚度与默认高度上限.
    pub fn new(resampler: R) -> Self {
        Self {
            resampler,
            thickness: NonZeroUsize::new(SLAB_THICKNESS).unwrap_or(NonZeroUsize::MIN),
            max_height: Some(MAX_VOLUME_HEIGHT),
        }
    }

    /// 设置 slab 厚度 `T`. `T = 1` 即单次不平均的重采样.
    pub fn with_thickness(mut self, thickness: NonZeroUsize) -> Self {
        self.thickness = thickness;
        self
    }

    /// 设置体数据高度上限, `None` 表示不检查.
    pub fn with_max_height(mut self, limit: Option<usize>) -> Self {
        self.max_height = limit;
        self
    }

    /// slab 厚度.
    #[inline]
    pub fn thickness(&self) -> NonZeroUsize {
        self.thickness
    }

    /// 体数据高度上限.
    #[inline]
    pub fn max_height(&self) -> Option<usize> {
        self.max_height
    }

    /// 只看文件头, 判断体数据是否过高.
    pub fn check_size(&self, info: &VolumeInfo) -> Result<(), ReorientError> {
        match self.max_height {
            Some(limit) if info.height() > limit => Err(ReorientError::Oversize {
                height: info.height(),
                limit,
            }),
            _ => Ok(()),
        }
    }

    /// 为 `record` 重采样一个 slab 并逐像素平均. 返回 `H x W` 的投影.
    pub fn reorient(
        &self,
        volume: &VolumeSource,
        record: &AnnotationRecord,
        workdir: &Path,
    ) -> Result<Projection, ReorientError> {
        let info = volume.info();
        self.check_size(info)?;
        if !info.contains(record.center) {
            return Err(ReorientError::OutOfBounds {
                center: record.center,
                shape: info.shape(),
            });
        }

        let request = ResampleRequest {
            width: info.width(),
            height: info.height(),
            thickness: self.thickness.get(),
            center: record.center,
            rotation: record.rotation,
        };
        let slab = self.resampler.resample(volume, &request, workdir)?;
        request.check_output(&slab)?;

        // 形状已检查, 层数不为 0.
        Projection::average(slab.view()).ok_or_else(|| {
            ReorientError::Resample(ResampleError::ShapeMismatch {
                expected: request.output_shape(),
                found: slab.dim(),
            })
        })
    }
}
