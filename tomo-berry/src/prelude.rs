//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx2dF, Idx3d};

pub use crate::data::slice::{Frame, FrameTag, GrayImage8, ImgWriteRaw, Projection};
pub use crate::data::window::{IntensityNormalizer, PercentileBounds};
pub use crate::data::{VolumeFormat, VolumeInfo, VolumeSource};

pub use crate::consts::Polarity;

pub use crate::orient::{
    AnnotationRecord, ImodInspector, ModelInspector, OrientationExtractor, TableInspector,
};
pub use crate::reorient::{ImodResampler, NativeResampler, Resampler, SlabReorienter};
pub use crate::sample::FrameSampler;

pub use crate::batch::{BatchConfig, BatchDriver, BatchReport, SampleMode, SkipKind};

pub use crate::dataset::home_dataset_dir_with;
pub use crate::dataset::{self, discover_pairs, PairSpec};
