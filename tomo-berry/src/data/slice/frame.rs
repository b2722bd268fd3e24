use ndarray::{s, Array2, ArrayView2};

use crate::consts::Polarity;
use crate::Idx2d;

/// 帧在所属图像中的编号方式.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum FrameTag {
    /// 正样本: 第几次随机裁剪.
    Index(usize),

    /// 负样本: 网格中的 (行, 列).
    Cell {
        /// 网格行号.
        row: usize,

        /// 网格列号.
        col: usize,
    },
}

/// 固定大小的正方形 8-bit 帧, 及其采样元信息.
///
/// 像素已经做过垂直翻转, 与重采样器的坐标手性相符, 可以直接落盘.
#[derive(Clone, Debug)]
pub struct Frame {
    pixels: Array2<u8>,
    origin: Idx2d,
    polarity: Polarity,
    tag: FrameTag,
}

impl Frame {
    /// 以未翻转的裁剪结果 `crop` 构建帧. `origin` 为其在源图像中的左上角.
    pub(crate) fn from_crop(crop: ArrayView2<u8>, origin: Idx2d, tag: FrameTag) -> Self {
        let polarity = match tag {
            FrameTag::Index(_) => Polarity::Positive,
            FrameTag::Cell { .. } => Polarity::Negative,
        };
        Self {
            pixels: crop.slice(s![..;-1, ..]).to_owned(),
            origin,
            polarity,
            tag,
        }
    }

    /// 像素 (高, 宽), 已垂直翻转.
    #[inline]
    pub fn pixels(&self) -> ArrayView2<'_, u8> {
        self.pixels.view()
    }

    /// 帧边长.
    #[inline]
    pub fn size(&self) -> usize {
        self.pixels.nrows()
    }

    /// 裁剪左上角在源图像中的位置 (高, 宽).
    #[inline]
    pub fn origin(&self) -> Idx2d {
        self.origin
    }

    /// 极性.
    #[inline]
    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    /// 编号.
    #[inline]
    pub fn tag(&self) -> FrameTag {
        self.tag
    }

    /// 源图像上的包围盒 `[h0, h1) x [w0, w1)`.
    #[inline]
    pub fn bounding_box(&self) -> (Idx2d, Idx2d) {
        let (h0, w0) = self.origin;
        let n = self.size();
        ((h0, w0), (h0 + n, w0 + n))
    }

    /// 将正样本编号整体后移 `by`. 一个数据对有多条标注时,
    /// 用它让各标注的帧编号连续而不冲突. 负样本不受影响.
    pub fn shift_index(&mut self, by: usize) {
        if let FrameTag::Index(i) = &mut self.tag {
            *i += by;
        }
    }

    /// 以 `source` 为前缀的确定性文件名.
    ///
    /// 正样本为 `<source>_frame<index>.png`, 负样本为
    /// `<source>_frame_<row>_<col>.png`.
    pub fn file_name(&self, source: &str) -> String {
        match self.tag {
            FrameTag::Index(i) => format!("{source}_frame{i}.png"),
            FrameTag::Cell { row, col } => format!("{source}_frame_{row}_{col}.png"),
        }
    }
}
