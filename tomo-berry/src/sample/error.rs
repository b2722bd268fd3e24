//! 帧采样的运行时错误.

/// 帧采样错误.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SampleError {
    /// 帧边长小于最小结构尺寸.
    ///
    /// 第一个参数为请求的边长, 第二个为下限.
    #[error("frame size {0} is below the minimum {1}")]
    FrameTooSmall(usize, usize),

    /// 帧边长大于图像.
    #[error("frame size {size} exceeds image of {height}x{width}")]
    FrameTooLarge {
        /// 请求的边长.
        size: usize,

        /// 图像高度.
        height: usize,

        /// 图像宽度.
        width: usize,
    },

    /// 同一图像中有多个结构, 单排除框的几何无定义.
    #[error("{0} structures in one image, negative sampling supports one")]
    MultiStructureUnsupported(usize),
}
