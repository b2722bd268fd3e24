//! 从归一化图像中采样固定大小的正方形帧.
//!
//! 重定向之后, 被标注的结构位于图像中心附近:
//!
//! - 正样本在中心附近的一个偏移带内随机裁剪;
//! - 负样本把图像平铺成网格, 只保留与结构排除框不相交的格子.
//!
//! 两种帧都做了垂直翻转 (见 [`Frame`]).

mod error;

pub use error::SampleError;

use rand::Rng;

use crate::consts::defaults::FRAME_SIZE;
use crate::consts::{MIN_FRAME_SIZE, POSITIVE_BAND_OFFSET};
use crate::{Frame, FrameTag, GrayImage8, Idx2d, Idx2dF};

/// 帧采样器.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FrameSampler {
    frame_size: usize,
    half_width: Option<usize>,
}

impl Default for FrameSampler {
    fn default() -> Self {
        Self::new(FRAME_SIZE)
    }
}

/// 半开区间 `[a0, a1)` 与 `[b0, b1)` 是否相交.
#[inline]
fn overlaps(a0: f64, a1: f64, b0: f64, b1: f64) -> bool {
    a0 < b1 && b0 < a1
}

/// 在一个轴上为裁剪终点挑选区间 `[lo, hi]`.
///
/// 名义上是 `[mid + 50, mid + size]`, 再收缩到图像之内.
fn end_band(dim: usize, size: usize) -> (usize, usize) {
    let mid = dim / 2;
    let hi = (mid + size).min(dim);
    let lo = (mid + POSITIVE_BAND_OFFSET).max(size).min(hi);
    (lo, hi)
}

impl FrameSampler {
    /// 以 `frame_size` 为帧边长. 排除框半宽默认为 `frame_size / 2`.
    #[inline]
    pub fn new(frame_size: usize) -> Self {
        Self {
            frame_size,
            half_width: None,
        }
    }

    /// 指定负样本排除框的半宽.
    #[inline]
    pub fn with_exclusion_half_width(mut self, half_width: usize) -> Self {
        self.half_width = Some(half_width);
        self
    }

    /// 帧边长.
    #[inline]
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// 排除框半宽.
    #[inline]
    pub fn exclusion_half_width(&self) -> usize {
        self.half_width.unwrap_or(self.frame_size / 2)
    }

    /// 检查帧边长对于 `image` 是否合法.
    pub fn check(&self, image: &GrayImage8) -> Result<(), SampleError> {
        let size = self.frame_size;
        if size < MIN_FRAME_SIZE {
            return Err(SampleError::FrameTooSmall(size, MIN_FRAME_SIZE));
        }
        let (height, width) = image.shape();
        if size > width || size > height {
            return Err(SampleError::FrameTooLarge { size, height, width });
        }
        Ok(())
    }

    /// 正样本: 在图像中心附近随机裁剪 `count` 帧.
    ///
    /// 每一帧独立抽取, 允许重复.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        image: &GrayImage8,
        count: usize,
        rng: &mut R,
    ) -> Result<Vec<Frame>, SampleError> {
        self.check(image)?;
        let size = self.frame_size;
        let (height, width) = image.shape();
        let (h_lo, h_hi) = end_band(height, size);
        let (w_lo, w_hi) = end_band(width, size);

        let mut frames = Vec::with_capacity(count);
        for i in 0..count {
            let h_end = rng.random_range(h_lo..=h_hi);
            let w_end = rng.random_range(w_lo..=w_hi);
            let origin = (h_end - size, w_end - size);
            // 终点区间保证裁剪不越界.
            if let Some(crop) = image.crop(origin, size) {
                frames.push(Frame::from_crop(crop, origin, FrameTag::Index(i)));
            }
        }
        Ok(frames)
    }

    /// 负样本: 网格平铺, 跳过与 `structures` 排除框相交的格子.
    ///
    /// `structures` 为空时不排除任何格子; 多于一个时返回
    /// [`SampleError::MultiStructureUnsupported`]. 不足一整格的边缘被丢弃.
    pub fn sample_negative(
        &self,
        image: &GrayImage8,
        structures: &[Idx2dF],
    ) -> Result<Vec<Frame>, SampleError> {
        if structures.len() > 1 {
            return Err(SampleError::MultiStructureUnsupported(structures.len()));
        }
        self.check(image)?;

        let size = self.frame_size;
        let (height, width) = image.shape();
        let exclusion = structures.first().map(|&(ch, cw)| {
            let r = self.exclusion_half_width() as f64;
            ((ch - r, ch + r), (cw - r, cw + r))
        });

        let mut frames = Vec::new();
        for row in 0..height / size {
            for col in 0..width / size {
                let origin: Idx2d = (row * size, col * size);
                let (h0, w0) = (origin.0 as f64, origin.1 as f64);
                let (h1, w1) = (h0 + size as f64, w0 + size as f64);
                let blocked = exclusion.is_some_and(|((eh0, eh1), (ew0, ew1))| {
                    overlaps(h0, h1, eh0, eh1) && overlaps(w0, w1, ew0, ew1)
                });
                if blocked {
                    continue;
                }
                if let Some(crop) = image.crop(origin, size) {
                    frames.push(Frame::from_crop(crop, origin, FrameTag::Cell { row, col }));
                }
            }
        }
        Ok(frames)
    }
}
