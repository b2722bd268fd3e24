use ndarray::{s, Array2, ArrayView2, ArrayView3, Axis};

use crate::data::window::{DegenerateIntensityRange, IntensityNormalizer};
use crate::{Idx2d, Idx2dF};

/// slab 平均后得到的 2D 投影 (高, 宽).
///
/// 它只在单个标注的处理期间存在, 随即被归一化为 [`GrayImage8`].
#[derive(Clone, Debug)]
pub struct Projection {
    data: Array2<f32>,
}

impl Projection {
    /// 直接初始化.
    #[inline]
    pub fn new(data: Array2<f32>) -> Self {
        Self { data }
    }

    /// 沿第 0 维逐像素平均 (t, 高, 宽) slab 的所有层.
    /// 层数为 0 时返回 `None`.
    ///
    /// 累加在 `f64` 中进行, 避免厚 slab 的精度损失.
    pub fn average(slab: ArrayView3<f32>) -> Option<Self> {
        let (t, h, w) = slab.dim();
        if t == 0 {
            return None;
        }
        let mut acc = Array2::<f64>::zeros((h, w));
        for layer in slab.axis_iter(Axis(0)) {
            acc.zip_mut_with(&layer, |a, &v| *a += v as f64);
        }
        let n = t as f64;
        Some(Self {
            data: acc.mapv(|v| (v / n) as f32),
        })
    }

    /// 图像的分辨率 (高, 宽).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        self.data.dim()
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.data.view()
    }

    /// 投影中心 (高, 宽). 重定向后标注结构位于此处.
    #[inline]
    pub fn center(&self) -> Idx2dF {
        let (h, w) = self.shape();
        (h as f64 / 2.0, w as f64 / 2.0)
    }

    /// 百分位归一化为 8-bit 图像.
    pub fn normalize(
        &self,
        normalizer: &IntensityNormalizer,
    ) -> Result<GrayImage8, DegenerateIntensityRange> {
        normalizer.normalize(self.view()).map(GrayImage8::new)
    }
}

/// 8-bit 灰度图像 (高, 宽). 构造后不可变.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage8 {
    data: Array2<u8>,
}

impl GrayImage8 {
    /// 直接初始化.
    #[inline]
    pub fn new(data: Array2<u8>) -> Self {
        Self { data }
    }

    /// 图像的分辨率 (高, 宽).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        self.data.dim()
    }

    /// 图像宽度.
    #[inline]
    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    /// 图像高度.
    #[inline]
    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn view(&self) -> ArrayView2<'_, u8> {
        self.data.view()
    }

    /// 图像中心 (高, 宽).
    #[inline]
    pub fn center(&self) -> Idx2dF {
        let (h, w) = self.shape();
        (h as f64 / 2.0, w as f64 / 2.0)
    }

    /// 以 `origin` (高, 宽) 为左上角裁剪 `size * size` 的正方形视图.
    /// 越界时返回 `None`.
    pub fn crop(&self, (h0, w0): Idx2d, size: usize) -> Option<ArrayView2<'_, u8>> {
        let (h, w) = self.shape();
        if h0.checked_add(size)? > h || w0.checked_add(size)? > w {
            return None;
        }
        Some(self.data.slice(s![h0..h0 + size, w0..w0 + size]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_average_single_layer_is_identity() {
        let slab = Array3::from_shape_fn((1, 4, 6), |(_, h, w)| (h * 6 + w) as f32);
        let p = Projection::average(slab.view()).unwrap();
        assert_eq!(p.shape(), (4, 6));
        assert_eq!(p.view(), slab.index_axis(Axis(0), 0));
    }

    #[test]
    fn test_average_keeps_plane_shape() {
        for t in [1, 2, 7, 15] {
            let slab = Array3::from_shape_fn((t, 9, 11), |(z, _, _)| z as f32);
            let p = Projection::average(slab.view()).unwrap();
            assert_eq!(p.shape(), (9, 11));
            let expected = (t - 1) as f32 / 2.0;
            assert!(p.view().iter().all(|&v| (v - expected).abs() < 1e-6));
        }
        assert!(Projection::average(Array3::<f32>::zeros((0, 3, 3)).view()).is_none());
    }

    #[test]
    fn test_crop_bounds() {
        let img = GrayImage8::new(Array2::from_shape_fn((8, 10), |(h, w)| (h * 10 + w) as u8));
        let c = img.crop((2, 3), 4).unwrap();
        assert_eq!(c.dim(), (4, 4));
        assert_eq!(c[(0, 0)], 23);
        assert!(img.crop((4, 0), 4).is_some());
        assert!(img.crop((5, 0), 4).is_none());
        assert!(img.crop((0, 7), 4).is_none());
        assert!(img.crop((usize::MAX, 0), 4).is_none());
    }
}
