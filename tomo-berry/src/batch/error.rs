//! 批处理错误.

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::orient::ExtractError;
use crate::reorient::ReorientError;
use crate::sample::SampleError;
use crate::{DegenerateIntensityRange, VolumeError};

use super::ConfigError;

/// 数据对被跳过的原因分类. 显示名即故障日志中的第二列.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum SkipKind {
    /// 查看工具失败, 或输出的表格式不对.
    ParseFailure,

    /// 没有任何标注.
    NoAnnotations,

    /// 体数据过高.
    OversizeSkip,

    /// 重采样失败.
    ResampleFailure,

    /// 投影强度范围退化.
    DegenerateIntensityRange,

    /// 帧边长过小.
    FrameTooSmall,

    /// 帧边长大于投影.
    FrameTooLarge,

    /// 负样本模式下有多个结构.
    MultiStructureUnsupported,

    /// 标注中心不在体数据内.
    AnnotationOutOfBounds,

    /// 体数据无法读取.
    VolumeUnreadable,

    /// 写出结果失败.
    OutputFailure,
}

impl SkipKind {
    /// 显示名.
    pub fn name(self) -> &'static str {
        match self {
            Self::ParseFailure => "ParseFailure",
            Self::NoAnnotations => "NoAnnotations",
            Self::OversizeSkip => "OversizeSkip",
            Self::ResampleFailure => "ResampleFailure",
            Self::DegenerateIntensityRange => "DegenerateIntensityRange",
            Self::FrameTooSmall => "FrameTooSmall",
            Self::FrameTooLarge => "FrameTooLarge",
            Self::MultiStructureUnsupported => "MultiStructureUnsupported",
            Self::AnnotationOutOfBounds => "AnnotationOutOfBounds",
            Self::VolumeUnreadable => "VolumeUnreadable",
            Self::OutputFailure => "OutputFailure",
        }
    }
}

impl fmt::Display for SkipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 单个数据对的错误. 只会导致该数据对被跳过.
#[derive(Debug, thiserror::Error)]
pub enum PairError {
    /// 取向提取失败.
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// 重定向失败.
    #[error(transparent)]
    Reorient(#[from] ReorientError),

    /// 归一化失败.
    #[error(transparent)]
    Normalize(#[from] DegenerateIntensityRange),

    /// 采样失败.
    #[error(transparent)]
    Sample(#[from] SampleError),

    /// 体数据文件头无法读取.
    #[error(transparent)]
    Volume(#[from] VolumeError),

    /// 帧写出失败.
    #[error("cannot write {}: {source}", .path.display())]
    WriteFrame {
        /// 目标文件.
        path: PathBuf,

        /// 底层错误.
        source: image::ImageError,
    },

    /// 投影写出失败.
    #[error("cannot write {}: {source}", .path.display())]
    WriteProjection {
        /// 目标文件.
        path: PathBuf,

        /// 底层错误.
        source: VolumeError,
    },

    /// 无法创建数据对的工作目录.
    #[error("cannot create working directory: {0}")]
    Workdir(#[source] io::Error),
}

impl PairError {
    /// 跳过原因分类.
    pub fn kind(&self) -> SkipKind {
        match self {
            Self::Extract(ExtractError::NoAnnotations) => SkipKind::NoAnnotations,
            Self::Extract(_) => SkipKind::ParseFailure,
            Self::Reorient(ReorientError::Oversize { .. }) => SkipKind::OversizeSkip,
            Self::Reorient(ReorientError::OutOfBounds { .. }) => SkipKind::AnnotationOutOfBounds,
            Self::Reorient(ReorientError::Resample(_)) => SkipKind::ResampleFailure,
            Self::Normalize(_) => SkipKind::DegenerateIntensityRange,
            Self::Sample(SampleError::FrameTooSmall(..)) => SkipKind::FrameTooSmall,
            Self::Sample(SampleError::FrameTooLarge { .. }) => SkipKind::FrameTooLarge,
            Self::Sample(SampleError::MultiStructureUnsupported(_)) => {
                SkipKind::MultiStructureUnsupported
            }
            Self::Volume(_) => SkipKind::VolumeUnreadable,
            Self::WriteFrame { .. } | Self::WriteProjection { .. } | Self::Workdir(_) => {
                SkipKind::OutputFailure
            }
        }
    }
}

/// 批处理的致命错误. 只在处理任何数据对之前发生.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// 配置非法.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// 数据集根目录不可读.
    #[error("cannot read dataset root {}: {source}", .path.display())]
    DatasetRoot {
        /// 根目录.
        path: PathBuf,

        /// 底层错误.
        source: io::Error,
    },

    /// 输出目录不可写.
    #[error("cannot write output directory {}: {source}", .path.display())]
    OutputDir {
        /// 输出目录.
        path: PathBuf,

        /// 底层错误.
        source: io::Error,
    },

    /// 故障日志无法读取或创建.
    #[error("cannot open fault log {}: {source}", .path.display())]
    FaultLog {
        /// 日志路径.
        path: PathBuf,

        /// 底层错误.
        source: io::Error,
    },

    /// 无法创建线程池.
    #[cfg(feature = "rayon")]
    #[error("cannot build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}
