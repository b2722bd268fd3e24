use std::path::{Path, PathBuf};

use ndarray::Array3;
use once_cell::unsync::OnceCell;

use crate::Idx3d;

pub mod mrc;
mod nii;
pub mod slice;
pub mod window;

pub use slice::{Frame, FrameTag, GrayImage8, ImgWriteRaw, Projection};

pub use window::{IntensityNormalizer, IntensityWindow, PercentileBounds};

/// 读取体数据错误.
#[derive(Debug, thiserror::Error)]
pub enum VolumeError {
    /// 底层 I/O 错误.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// MRC header 不合法.
    #[error("bad MRC header: {0}")]
    BadHeader(String),

    /// 不支持的 MRC 数据模式.
    #[error("unsupported MRC mode {0}")]
    UnsupportedMode(i32),

    /// 无法从文件名推断体数据格式.
    #[error("unknown volume format: {}", .0.display())]
    UnknownFormat(PathBuf),

    /// nifti 读取错误.
    #[error("nifti error: {0}")]
    Nifti(#[from] nifti::NiftiError),
}

/// 体数据的存储格式.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum VolumeFormat {
    /// MRC / IMOD 格式 (`.mrc`, `.rec`, `.st`, `.ali`, `.map`).
    Mrc,

    /// nifti 格式 (`.nii`, `.nii.gz`).
    Nifti,

    /// 仅存在于内存中的体数据, 没有对应文件.
    Memory,
}

impl VolumeFormat {
    /// 根据扩展名推断格式. 无法识别时返回 `None`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let name = path.as_ref().file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".nii") || name.ends_with(".nii.gz") {
            return Some(Self::Nifti);
        }
        match name.rsplit_once('.')?.1 {
            "mrc" | "rec" | "st" | "ali" | "map" => Some(Self::Mrc),
            _ => None,
        }
    }
}

/// 体数据的元信息. 只读取文件头, 不加载体素.
#[derive(Clone, Debug)]
pub struct VolumeInfo {
    path: PathBuf,
    format: VolumeFormat,
    shape: Idx3d,
}

impl VolumeInfo {
    /// 只读取文件头, 获取体数据路径、格式和形状.
    pub fn probe<P: AsRef<Path>>(path: P) -> Result<Self, VolumeError> {
        let path = path.as_ref().to_owned();
        let format = VolumeFormat::from_path(&path)
            .ok_or_else(|| VolumeError::UnknownFormat(path.clone()))?;
        let shape = match format {
            VolumeFormat::Mrc => mrc::read_header(&path)?.shape(),
            VolumeFormat::Nifti => nii::read_shape(&path)?,
            VolumeFormat::Memory => unreachable!("文件名不会被推断为内存格式"),
        };
        Ok(Self {
            path,
            format,
            shape,
        })
    }

    /// 体数据文件路径. 内存体数据的路径为空.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 存储格式.
    #[inline]
    pub fn format(&self) -> VolumeFormat {
        self.format
    }

    /// 形状 (z, 高, 宽).
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.shape
    }

    /// 切片层数.
    #[inline]
    pub fn len_z(&self) -> usize {
        self.shape.0
    }

    /// 高度 (y 方向体素个数).
    #[inline]
    pub fn height(&self) -> usize {
        self.shape.1
    }

    /// 宽度 (x 方向体素个数).
    #[inline]
    pub fn width(&self) -> usize {
        self.shape.2
    }

    /// 判断体素坐标 `[x, y, z]` 是否落在体数据内.
    pub fn contains(&self, [x, y, z]: [f64; 3]) -> bool {
        let (len_z, h, w) = self.shape;
        let inside = |v: f64, n: usize| v.is_finite() && v >= 0.0 && v <= (n as f64 - 1.0);
        inside(x, w) && inside(y, h) && inside(z, len_z)
    }
}

/// 一个数据对所用的体数据.
///
/// 体素在第一次被需要时才会加载, 且在数据对的整个处理期间只加载一次.
/// 该结构不会被跨线程共享.
#[derive(Debug)]
pub struct VolumeSource {
    info: VolumeInfo,
    data: OnceCell<Array3<f32>>,
}

impl VolumeSource {
    /// 打开体数据文件. 只读取文件头.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, VolumeError> {
        Ok(Self {
            info: VolumeInfo::probe(path)?,
            data: OnceCell::new(),
        })
    }

    /// 直接使用内存中的 (z, 高, 宽) 数据.
    pub fn from_array(data: Array3<f32>) -> Self {
        let info = VolumeInfo {
            path: PathBuf::new(),
            format: VolumeFormat::Memory,
            shape: data.dim(),
        };
        Self {
            info,
            data: OnceCell::with_value(data),
        }
    }

    /// 元信息.
    #[inline]
    pub fn info(&self) -> &VolumeInfo {
        &self.info
    }

    /// 体素数据是否已经加载.
    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.data.get().is_some()
    }

    /// 获取 (z, 高, 宽) 体素数据, 必要时从文件加载.
    pub fn data(&self) -> Result<&Array3<f32>, VolumeError> {
        self.data.get_or_try_init(|| {
            let data = match self.info.format {
                VolumeFormat::Mrc => mrc::read_volume(&self.info.path)?,
                VolumeFormat::Nifti => nii::read_volume(&self.info.path)?,
                VolumeFormat::Memory => unreachable!("内存体数据在构造时即已初始化"),
            };
            if data.dim() != self.info.shape {
                return Err(VolumeError::BadHeader(format!(
                    "header shape {:?} disagrees with data shape {:?}",
                    self.info.shape,
                    data.dim()
                )));
            }
            Ok(data)
        })
    }
}
