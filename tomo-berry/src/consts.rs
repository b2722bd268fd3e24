//! 通用常量.

/// 批处理各项参数的默认值.
pub mod defaults {
    /// 每个 slab 重采样的薄片层数.
    pub const SLAB_THICKNESS: usize = 15;

    /// 输出帧边长 (像素).
    pub const FRAME_SIZE: usize = 256;

    /// 每张投影图采样的正样本帧个数.
    pub const POSITIVE_FRAMES: usize = 5;

    /// 体数据高度上限. 超过该值的体数据不做重采样.
    pub const MAX_VOLUME_HEIGHT: usize = 1000;

    /// 归一化时的下百分位.
    pub const LOWER_PERCENTILE: f64 = 1.0;

    /// 归一化时的上百分位.
    pub const UPPER_PERCENTILE: f64 = 99.0;

    /// 标注文件名模式.
    pub const ANNOTATION_PATTERN: &str = "FM*.mod";

    /// 体数据文件名模式.
    pub const VOLUME_PATTERN: &str = "*.rec";

    /// 外部工具的超时时间 (秒).
    pub const TOOL_TIMEOUT_SECS: u64 = 600;

    /// IMOD 模型查看工具.
    pub const IMODINFO: &str = "imodinfo";

    /// IMOD 体数据旋转重采样工具.
    pub const ROTATEVOL: &str = "rotatevol";

    /// 故障日志文件名, 位于输出目录下.
    pub const FAULT_LOG_NAME: &str = "skipped_pairs.txt";
}

/// 帧边长下限. 比一个典型鞭毛马达还小的帧没有意义.
pub const MIN_FRAME_SIZE: usize = 60;

/// 正样本裁剪窗口右下角相对图像中点的最小偏移.
pub const POSITIVE_BAND_OFFSET: usize = 50;

/// `imodinfo -a` 输出中携带取向与中心的行前缀.
pub const SLICER_ANGLE_TAG: &str = "slicerAngle";

/// 一条标注记录的数值字段个数 (3 个旋转角 + 3 个中心坐标).
pub const RECORD_FIELDS: usize = 6;

/// 帧的极性.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Polarity {
    /// 包含结构的正样本.
    Positive,

    /// 背景负样本.
    Negative,
}

impl Polarity {
    /// 是否为正样本.
    #[inline]
    pub fn is_positive(&self) -> bool {
        matches!(self, Self::Positive)
    }

    /// 是否为负样本.
    #[inline]
    pub fn is_negative(&self) -> bool {
        !self.is_positive()
    }
}
