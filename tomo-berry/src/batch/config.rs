//! 批处理配置.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::consts::defaults::*;
use crate::consts::MIN_FRAME_SIZE;
use crate::dataset::NamePattern;
use crate::PercentileBounds;

/// 采样哪一种极性的帧.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SampleMode {
    /// 只要正样本.
    #[default]
    Positive,

    /// 只要负样本.
    Negative,

    /// 两者都要.
    Both,
}

impl SampleMode {
    /// 是否采样正样本.
    #[inline]
    pub fn positives(self) -> bool {
        matches!(self, Self::Positive | Self::Both)
    }

    /// 是否采样负样本.
    #[inline]
    pub fn negatives(self) -> bool {
        matches!(self, Self::Negative | Self::Both)
    }
}

/// 没有任何标注的数据对在负样本模式下如何处理.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum NegativeFallback {
    /// 作为 `NoAnnotations` 跳过.
    #[default]
    Disabled,

    /// 以体数据中心为旋转中心、不旋转地取 slab, 平铺时不设排除框.
    Unrotated,
}

/// 标注查看工具.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum InspectorKind {
    /// `imodinfo -a`.
    #[default]
    Imod,

    /// 预先导出的文本表.
    Table,
}

/// 重采样器.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ResamplerKind {
    /// `rotatevol`.
    #[default]
    Imod,

    /// 进程内三线性重采样.
    Native,
}

/// 外部工具.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct ToolConfig {
    /// `imodinfo` 可执行文件.
    pub imodinfo: PathBuf,

    /// `rotatevol` 可执行文件.
    pub rotatevol: PathBuf,

    /// 单次调用的超时 (秒).
    pub timeout_secs: u64,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            imodinfo: PathBuf::from(IMODINFO),
            rotatevol: PathBuf::from(ROTATEVOL),
            timeout_secs: TOOL_TIMEOUT_SECS,
        }
    }
}

impl ToolConfig {
    /// 超时时长.
    #[inline]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// 配置错误. 在处理任何数据对之前报告.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// slab 厚度为 0.
    #[error("slab thickness must be at least 1")]
    ZeroThickness,

    /// 帧边长过小.
    #[error("frame size {0} is below the minimum {min}", min = MIN_FRAME_SIZE)]
    FrameTooSmall(usize),

    /// 正样本模式下每张图的帧数为 0.
    #[error("frames per image must be at least 1")]
    ZeroFrames,

    /// 百分位不满足 `0 <= lower < upper <= 100`.
    #[error("invalid percentile bounds {0} / {1}")]
    Percentiles(f64, f64),

    /// 文件名通配符为空.
    #[error("empty {0} pattern")]
    EmptyPattern(&'static str),

    /// 超时为 0.
    #[error("tool timeout must be at least 1 second")]
    ZeroTimeout,

    /// 数据集根目录为空.
    #[error("no dataset root configured")]
    NoDatasetRoot,

    /// 输出目录为空.
    #[error("no output directory configured")]
    NoOutputDir,
}

/// 批处理配置. 所有字段都有默认值.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct BatchConfig {
    /// 数据集根目录.
    pub dataset_root: PathBuf,

    /// 输出根目录. 帧写入 `<output_dir>/<dataset>/`.
    pub output_dir: PathBuf,

    /// 输出子目录名, 缺省为数据集根目录的名字.
    pub dataset_name: Option<String>,

    /// 标注文件通配符.
    pub annotation_pattern: String,

    /// 体数据文件通配符.
    pub volume_pattern: String,

    /// slab 厚度 `T`.
    pub slab_thickness: usize,

    /// 帧边长.
    pub frame_size: usize,

    /// 每条标注的正样本帧数.
    pub frames_per_image: usize,

    /// 体数据高度上限, 0 表示不检查.
    pub max_volume_height: usize,

    /// 下百分位.
    pub lower_percentile: f64,

    /// 上百分位.
    pub upper_percentile: f64,

    /// 采样极性.
    pub mode: SampleMode,

    /// 无标注时的负样本策略.
    pub negative_fallback: NegativeFallback,

    /// 负样本排除框半宽, 缺省为帧边长的一半.
    pub exclusion_half_width: Option<usize>,

    /// 随机种子. 缺省时每次运行不同.
    pub seed: Option<u64>,

    /// 并行数据对数, 0 表示全部核心.
    pub jobs: usize,

    /// 数据对临时目录的上级目录, 缺省为系统临时目录.
    pub scratch_dir: Option<PathBuf>,

    /// 标注查看工具.
    pub inspector: InspectorKind,

    /// 重采样器.
    pub resampler: ResamplerKind,

    /// 外部工具.
    pub tools: ToolConfig,

    /// 故障日志路径, 缺省为 `<output_dir>/<dataset>/skipped_pairs.txt`.
    pub fault_log: Option<PathBuf>,

    /// 只重跑该故障日志中列出的数据对.
    pub rerun_from: Option<PathBuf>,

    /// 第一个输出文件已存在的数据对不再重算.
    pub skip_existing: bool,

    /// 把平均投影另存为 `<pair>_averaged<k>.mrc`.
    pub keep_projections: bool,

    /// 只发现数据对, 不处理.
    pub dry_run: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            dataset_root: PathBuf::new(),
            output_dir: PathBuf::from("frames"),
            dataset_name: None,
            annotation_pattern: ANNOTATION_PATTERN.to_string(),
            volume_pattern: VOLUME_PATTERN.to_string(),
            slab_thickness: SLAB_THICKNESS,
            frame_size: FRAME_SIZE,
            frames_per_image: POSITIVE_FRAMES,
            max_volume_height: MAX_VOLUME_HEIGHT,
            lower_percentile: LOWER_PERCENTILE,
            upper_percentile: UPPER_PERCENTILE,
            mode: SampleMode::default(),
            negative_fallback: NegativeFallback::default(),
            exclusion_half_width: None,
            seed: None,
            jobs: 0,
            scratch_dir: None,
            inspector: InspectorKind::default(),
            resampler: ResamplerKind::default(),
            tools: ToolConfig::default(),
            fault_log: None,
            rerun_from: None,
            skip_existing: false,
            keep_projections: false,
            dry_run: false,
        }
    }
}

impl BatchConfig {
    /// 以 `dataset_root` 与 `output_dir` 创建, 其余取默认值.
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(dataset_root: P, output_dir: Q) -> Self {
        Self {
            dataset_root: dataset_root.into(),
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    /// 检查配置.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dataset_root.as_os_str().is_empty() {
            return Err(ConfigError::NoDatasetRoot);
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::NoOutputDir);
        }
        if self.slab_thickness == 0 {
            return Err(ConfigError::ZeroThickness);
        }
        if self.frame_size < MIN_FRAME_SIZE {
            return Err(ConfigError::FrameTooSmall(self.frame_size));
        }
        if self.mode.positives() && self.frames_per_image == 0 {
            return Err(ConfigError::ZeroFrames);
        }
        self.percentile_bounds()?;
        if self.annotation_pattern.is_empty() {
            return Err(ConfigError::EmptyPattern("annotation"));
        }
        if self.volume_pattern.is_empty() {
            return Err(ConfigError::EmptyPattern("volume"));
        }
        if self.tools.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    /// 百分位.
    pub fn percentile_bounds(&self) -> Result<PercentileBounds, ConfigError> {
        PercentileBounds::new(self.lower_percentile, self.upper_percentile)
            .ok_or(ConfigError::Percentiles(self.lower_percentile, self.upper_percentile))
    }

    /// slab 厚度.
    pub fn thickness(&self) -> Result<NonZeroUsize, ConfigError> {
        NonZeroUsize::new(self.slab_thickness).ok_or(ConfigError::ZeroThickness)
    }

    /// 体数据高度上限.
    #[inline]
    pub fn height_limit(&self) -> Option<usize> {
        (self.max_volume_height > 0).then_some(self.max_volume_height)
    }

    /// 标注文件通配符.
    #[inline]
    pub fn annotation_pattern(&self) -> NamePattern {
        NamePattern::new(&self.annotation_pattern)
    }

    /// 体数据文件通配符.
    #[inline]
    pub fn volume_pattern(&self) -> NamePattern {
        NamePattern::new(&self.volume_pattern)
    }

    /// 输出子目录名.
    pub fn dataset_name(&self) -> String {
        match &self.dataset_name {
            Some(name) => name.clone(),
            None => self
                .dataset_root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "dataset".to_string()),
        }
    }

    /// 帧的输出目录 `<output_dir>/<dataset>`.
    pub fn frame_dir(&self) -> PathBuf {
        self.output_dir.join(self.dataset_name())
    }

    /// 故障日志路径.
    pub fn fault_log_path(&self) -> PathBuf {
        match &self.fault_log {
            Some(p) => p.clone(),
            None => self.frame_dir().join(FAULT_LOG_NAME),
        }
    }

    /// 临时目录的上级目录.
    pub fn scratch_root(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// 数据集根目录.
    #[inline]
    pub fn root(&self) -> &Path {
        &self.dataset_root
    }
}
