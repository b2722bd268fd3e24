//! 进程内的旋转 + 三线性重采样.

use std::path::Path;

use nalgebra::Vector3;
use ndarray::{Array3, ArrayView3, ArrayViewMut2, Axis};

use super::{ResampleError, ResampleRequest, Resampler, Rotation};
use crate::VolumeSource;

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
    }
}

/// 进程内重采样器. 与 `rotatevol` 采用相同的旋转约定,
/// 体外的采样点取整个体数据的均值.
///
/// 不保证与 `rotatevol` 的输出逐位相同.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeResampler;

/// 边界上的舍入误差容限 (体素).
const SNAP: f64 = 1e-6;

/// 三线性插值采样器.
struct Sampler<'a> {
    data: ArrayView3<'a, f32>,
    fill: f32,
}

impl Sampler<'_> {
    /// 在体素坐标 `[x, y, z]` 处采样.
    fn at(&self, [x, y, z]: [f64; 3]) -> f32 {
        let (nz, ny, nx) = self.data.dim();
        let inside = |v: f64, n: usize| v >= -SNAP && v <= n as f64 - 1.0 + SNAP;
        if !(inside(x, nx) && inside(y, ny) && inside(z, nz)) {
            return self.fill;
        }
        let snap = |v: f64, n: usize| v.clamp(0.0, n as f64 - 1.0);
        let (x, y, z) = (snap(x, nx), snap(y, ny), snap(z, nz));

        let (x0, y0, z0) = (x.floor() as usize, y.floor() as usize, z.floor() as usize);
        let (x1, y1, z1) = ((x0 + 1).min(nx - 1), (y0 + 1).min(ny - 1), (z0 + 1).min(nz - 1));
        let (fx, fy, fz) = (x - x0 as f64, y - y0 as f64, z - z0 as f64);

        let d = &self.data;
        let v = |z: usize, y: usize, x: usize| d[(z, y, x)] as f64;
        let lerp = |a: f64, b: f64, t: f64| a + (b - a) * t;

        let c00 = lerp(v(z0, y0, x0), v(z0, y0, x1), fx);
        let c01 = lerp(v(z0, y1, x0), v(z0, y1, x1), fx);
        let c10 = lerp(v(z1, y0, x0), v(z1, y0, x1), fx);
        let c11 = lerp(v(z1, y1, x0), v(z1, y1, x1), fx);
        let c0 = lerp(c00, c01, fy);
        let c1 = lerp(c10, c11, fy);
        lerp(c0, c1, fz) as f32
    }

    /// 填满输出的第 `t` 层.
    fn fill_layer(&self, t: usize, mut layer: ArrayViewMut2<f32>, req: &ResampleRequest, rot: &Rotation) {
        let half = |n: usize| (n as f64 - 1.0) / 2.0;
        let (hw, hh, ht) = (half(req.width), half(req.height), half(req.thickness));
        let [cx, cy, cz] = req.center;
        let dz = t as f64 - ht;
        for ((h, w), out) in layer.indexed_iter_mut() {
            let o = rot.apply_inverse(&Vector3::new(w as f64 - hw, h as f64 - hh, dz));
            *out = self.at([cx + o.x, cy + o.y, cz + o.z]);
        }
    }
}

fn mean(data: ArrayView3<f32>) -> f32 {
    if data.is_empty() {
        return 0.0;
    }
    let sum: f64 = data.iter().map(|&v| v as f64).sum();
    (sum / data.len() as f64) as f32
}

impl Resampler for NativeResampler {
    fn resample(
        &self,
        volume: &VolumeSource,
        request: &ResampleRequest,
        _workdir: &Path,
    ) -> Result<Array3<f32>, ResampleError> {
        let data = volume.data()?.view();
        let sampler = Sampler {
            data,
            fill: mean(data),
        };
        let rot = Rotation::from_degrees(request.rotation);
        let mut out = Array3::<f32>::zeros(request.output_shape());

        cfg_if::cfg_if! {
            if #[cfg(feature = "rayon")] {
                out.axis_iter_mut(Axis(0))
                    .into_par_iter()
                    .enumerate()
                    .for_each(|(t, layer)| sampler.fill_layer(t, layer, request, &rot));
            } else {
                for (t, layer) in out.axis_iter_mut(Axis(0)).enumerate() {
                    sampler.fill_layer(t, layer, request, &rot);
                }
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> Array3<f32> {
        Array3::from_shape_fn((9, 5, 7), |(z, h, w)| (z * 100 + h * 10 + w) as f32)
    }

    fn request(thickness: usize, center: [f64; 3], rotation: [f64; 3]) -> ResampleRequest {
        ResampleRequest {
            width: 7,
            height: 5,
            thickness,
            center,
            rotation,
        }
    }

    #[test]
    fn test_identity_single_layer() {
        let data = ramp();
        let vol = VolumeSource::from_array(data.clone());
        let req = request(1, [3.0, 2.0, 4.0], [0.0; 3]);
        let out = NativeResampler.resample(&vol, &req, Path::new(".")).unwrap();
        assert_eq!(out.dim(), (1, 5, 7));
        assert_eq!(out.index_axis(Axis(0), 0), data.index_axis(Axis(0), 4));
    }

    #[test]
    fn test_identity_slab_follows_z() {
        let data = ramp();
        let vol = VolumeSource::from_array(data.clone());
        let out = NativeResampler
            .resample(&vol, &request(3, [3.0, 2.0, 4.0], [0.0; 3]), Path::new("."))
            .unwrap();
        for t in 0..3 {
            assert_eq!(out.index_axis(Axis(0), t), data.index_axis(Axis(0), 3 + t));
        }
    }

    #[test]
    fn test_outside_takes_mean() {
        let vol = VolumeSource::from_array(Array3::from_elem((2, 3, 3), 4.0));
        // 中心在体外, 全部采样点都在外面.
        let out = NativeResampler
            .resample(
                &vol,
                &ResampleRequest {
                    width: 3,
                    height: 3,
                    thickness: 1,
                    center: [100.0, 100.0, 100.0],
                    rotation: [0.0; 3],
                },
                Path::new("."),
            )
            .unwrap();
        assert!(out.iter().all(|&v| v == 4.0));
    }

    #[test]
    fn test_trilinear_midpoint() {
        let vol = VolumeSource::from_array(Array3::from_shape_fn((2, 2, 2), |(z, y, x)| {
            (z * 4 + y * 2 + x) as f32
        }));
        let data = vol.data().unwrap().view();
        let s = Sampler { data, fill: -1.0 };
        assert!((s.at([0.5, 0.5, 0.5]) - 3.5).abs() < 1e-6);
        assert_eq!(s.at([1.0, 1.0, 1.0]), 7.0);
        assert_eq!(s.at([1.01, 0.0, 0.0]), -1.0);
    }

    #[test]
    fn test_quarter_turn_about_z() {
        // 5x5 的平面, 绕 Z 转 90 度后, 输出的 x 方向对应输入的 -y 方向.
        let data = Array3::from_shape_fn((1, 5, 5), |(_, h, w)| (h * 5 + w) as f32);
        let vol = VolumeSource::from_array(data.clone());
        let req = ResampleRequest {
            width: 5,
            height: 5,
            thickness: 1,
            center: [2.0, 2.0, 0.0],
            rotation: [0.0, 0.0, 90.0],
        };
        let out = NativeResampler.resample(&vol, &req, Path::new(".")).unwrap();
        for h in 0..5 {
            for w in 0..5 {
                let expected = data[(0, 4 - w, h)];
                assert!((out[(0, h, w)] - expected).abs() < 1e-4);
            }
        }
    }
}
