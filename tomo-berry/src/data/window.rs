//! 百分位强度窗口与 8-bit 归一化.

use ndarray::{Array2, ArrayView2};
use ordered_float::OrderedFloat;

use crate::consts::defaults::{LOWER_PERCENTILE, UPPER_PERCENTILE};

/// 一对百分位数 `lower < upper`, 取值在 `[0, 100]` 内.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PercentileBounds {
    lower: f64,
    upper: f64,
}

impl PercentileBounds {
    /// 构建百分位对. 不满足 `0 <= lower < upper <= 100` 时返回 `None`.
    pub fn new(lower: f64, upper: f64) -> Option<Self> {
        if (0.0..=100.0).contains(&lower) && (0.0..=100.0).contains(&upper) && lower < upper {
            Some(Self { lower, upper })
        } else {
            None
        }
    }

    /// 第 1 / 第 99 百分位.
    #[inline]
    pub const fn standard() -> Self {
        Self {
            lower: LOWER_PERCENTILE,
            upper: UPPER_PERCENTILE,
        }
    }

    /// 下百分位.
    #[inline]
    pub fn lower(&self) -> f64 {
        self.lower
    }

    /// 上百分位.
    #[inline]
    pub fn upper(&self) -> f64 {
        self.upper
    }
}

impl Default for PercentileBounds {
    fn default() -> Self {
        Self::standard()
    }
}

/// 两个百分位重合, 无法线性拉伸.
#[derive(Copy, Clone, Debug, PartialEq, thiserror::Error)]
#[error("degenerate intensity range: [{low}, {high}]")]
pub struct DegenerateIntensityRange {
    /// 下百分位对应的强度.
    pub low: f64,

    /// 上百分位对应的强度.
    pub high: f64,
}

/// 强度窗口 `[low, high]`. 窗外的值被截断到边界.
///
/// 该窗口是只读的. 若要修改窗口参数, 你应该创建新的实例.
#[derive(Copy, Clone, Debug)]
pub struct IntensityWindow {
    low: f64,
    high: f64,
}

impl IntensityWindow {
    /// 构建强度窗口.
    ///
    /// `low` 与 `high` 必须有限, 且 `high` 相对 `low` 有可分辨的差距,
    /// 否则返回 [`DegenerateIntensityRange`].
    pub fn new(low: f64, high: f64) -> Result<Self, DegenerateIntensityRange> {
        let tolerance = f64::EPSILON * low.abs().max(high.abs());
        if low.is_finite() && high.is_finite() && high - low > tolerance {
            Ok(Self { low, high })
        } else {
            Err(DegenerateIntensityRange { low, high })
        }
    }

    /// 由 `values` 中有限值的百分位构建窗口. 非有限值不参与统计.
    pub fn from_percentiles<I>(values: I, bounds: PercentileBounds) -> Result<Self, DegenerateIntensityRange>
    where
        I: IntoIterator<Item = f32>,
    {
        let mut sorted: Vec<f64> = values
            .into_iter()
            .filter(|v| v.is_finite())
            .map(f64::from)
            .collect();
        if sorted.is_empty() {
            return Err(DegenerateIntensityRange {
                low: f64::NAN,
                high: f64::NAN,
            });
        }
        sorted.sort_unstable_by_key(|&v| OrderedFloat(v));
        Self::new(
            percentile(&sorted, bounds.lower),
            percentile(&sorted, bounds.upper),
        )
    }

    /// 窗下限.
    #[inline]
    pub fn low(&self) -> f64 {
        self.low
    }

    /// 窗上限.
    #[inline]
    pub fn high(&self) -> f64 {
        self.high
    }

    /// 窗宽.
    #[inline]
    pub fn width(&self) -> f64 {
        self.high - self.low
    }

    /// 求 `v` 在当前窗口下对应的灰度值 (0 <= value <= 255). 非有限值映射为 0.
    pub fn eval(&self, v: f32) -> u8 {
        let v = v as f64;
        if !v.is_finite() || v <= self.low {
            u8::MIN
        } else if v >= self.high {
            u8::MAX
        } else {
            // 255, not 256.
            ((v - self.low) / self.width() * 255.0).round() as u8
        }
    }
}

/// 已排序数据 `sorted` 的第 `p` 百分位, 在相邻次序统计量之间线性插值.
///
/// `sorted` 不能为空.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// 百分位截断归一化器.
#[derive(Copy, Clone, Debug, Default)]
pub struct IntensityNormalizer {
    bounds: PercentileBounds,
}

impl IntensityNormalizer {
    /// 使用给定百分位创建归一化器.
    #[inline]
    pub fn new(bounds: PercentileBounds) -> Self {
        Self { bounds }
    }

    /// 使用的百分位.
    #[inline]
    pub fn bounds(&self) -> PercentileBounds {
        self.bounds
    }

    /// 计算百分位窗口, 截断后线性映射到 `[0, 255]` 并量化.
    pub fn normalize(&self, image: ArrayView2<f32>) -> Result<Array2<u8>, DegenerateIntensityRange> {
        let window = IntensityWindow::from_percentiles(image.iter().copied(), self.bounds)?;
        Ok(image.map(|&v| window.eval(v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn float_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_bounds_invalid_input() {
        assert!(PercentileBounds::new(1.0, 99.0).is_some());
        assert!(PercentileBounds::new(0.0, 100.0).is_some());
        assert!(PercentileBounds::new(50.0, 50.0).is_none());
        assert!(PercentileBounds::new(-1.0, 99.0).is_none());
        assert!(PercentileBounds::new(1.0, 100.5).is_none());
    }

    #[test]
    fn test_percentile_interpolation() {
        let data: Vec<f64> = (0..=10).map(|v| v as f64).collect();
        assert!(float_eq(percentile(&data, 0.0), 0.0));
        assert!(float_eq(percentile(&data, 100.0), 10.0));
        assert!(float_eq(percentile(&data, 25.0), 2.5));
        assert!(float_eq(percentile(&[1.0, 3.0], 50.0), 2.0));
        assert!(float_eq(percentile(&[7.0], 99.0), 7.0));
    }

    #[test]
    fn test_window_eval() {
        let w = IntensityWindow::new(-1.0, 1.0).unwrap();
        assert_eq!(w.eval(f32::NAN), 0);
        assert_eq!(w.eval(f32::NEG_INFINITY), 0);
        assert_eq!(w.eval(-5.0), 0);
        assert_eq!(w.eval(5.0), 255);
        assert_eq!(w.eval(0.0), 128);
        assert_eq!(w.eval(1.0), 255);
    }

    #[test]
    fn test_constant_image_is_degenerate() {
        let img = Array2::from_elem((32, 32), 3.25f32);
        let err = IntensityNormalizer::default().normalize(img.view()).unwrap_err();
        assert_eq!(err.low, 3.25);
        assert_eq!(err.high, 3.25);

        let img = Array2::from_elem((4, 4), f32::NAN);
        assert!(IntensityNormalizer::default().normalize(img.view()).is_err());
    }

    #[test]
    fn test_near_constant_image_is_degenerate() {
        // 只有极少数离群点, 第 1 和第 99 百分位仍然重合.
        let mut img = Array2::from_elem((100, 100), 10.0f32);
        img[(0, 0)] = -1e6;
        img[(99, 99)] = 1e6;
        assert!(IntensityNormalizer::default().normalize(img.view()).is_err());
    }

    #[test]
    fn test_clipping_and_range() {
        let img = Array2::from_shape_fn((100, 100), |(h, w)| (h * 100 + w) as f32);
        let out = IntensityNormalizer::default().normalize(img.view()).unwrap();
        assert_eq!(out.dim(), (100, 100));
        assert_eq!(out[(0, 0)], 0);
        assert_eq!(out[(99, 99)], 255);
        assert!(out.iter().filter(|&&v| v == 0).count() >= 100);
        assert!(out.iter().zip(out.iter().skip(1)).all(|(a, b)| a <= b));
    }

    #[test]
    fn test_idempotent_on_normalized_image() {
        // 两端各有 2% 的像素饱和, 因此第 1/99 百分位正好是 0 和 255.
        let img = Array2::from_shape_fn((100, 100), |(h, w)| {
            let i = h * 100 + w;
            match i {
                0..=199 => 0u8,
                _ if i >= 9800 => 255u8,
                _ => (i % 256) as u8,
            }
        });
        let normalizer = IntensityNormalizer::default();
        let once = normalizer.normalize(img.mapv(f32::from).view()).unwrap();
        assert_eq!(once, img);
        let twice = normalizer.normalize(once.mapv(f32::from).view()).unwrap();
        assert_eq!(twice, once);
    }
}
