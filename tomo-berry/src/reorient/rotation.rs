//! 刚体旋转.

use nalgebra::{Matrix3, Rotation3, Vector3};

/// 作用于 `[x, y, z]` 列向量的旋转.
///
/// 由 `(rx, ry, rz)` 度数构建, 依次绕 Z、Y、X 轴旋转, 即 `R = Rx * Ry * Rz`.
/// 这与 `rotatevol -angles rz,ry,rx` 的约定一致.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Rotation {
    r: Rotation3<f64>,
}

impl Rotation {
    /// 单位旋转.
    #[inline]
    pub fn identity() -> Self {
        Self {
            r: Rotation3::identity(),
        }
    }

    /// 由绕 X / Y / Z 轴的角度 (度) 构建.
    pub fn from_degrees([rx, ry, rz]: [f64; 3]) -> Self {
        let x = Rotation3::from_axis_angle(&Vector3::x_axis(), rx.to_radians());
        let y = Rotation3::from_axis_angle(&Vector3::y_axis(), ry.to_radians());
        let z = Rotation3::from_axis_angle(&Vector3::z_axis(), rz.to_radians());
        Self { r: x * y * z }
    }

    /// 旋转矩阵.
    #[inline]
    pub fn matrix(&self) -> &Matrix3<f64> {
        self.r.matrix()
    }

    /// `R * v`.
    #[inline]
    pub fn apply(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.r * v
    }

    /// `R^T * v`, 即逆旋转.
    #[inline]
    pub fn apply_inverse(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.r.inverse_transform_vector(v)
    }
}

impl Default for Rotation {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vector3<f64>, b: [f64; 3]) -> bool {
        (a - Vector3::from(b)).norm() < 1e-9
    }

    #[test]
    fn test_zero_is_identity() {
        let r = Rotation::from_degrees([0.0; 3]);
        assert!((r.matrix() - Matrix3::identity()).norm() < 1e-12);
    }

    #[test]
    fn test_quarter_turns() {
        let rz = Rotation::from_degrees([0.0, 0.0, 90.0]);
        assert!(close(rz.apply(&Vector3::x()), [0.0, 1.0, 0.0]));

        let rx = Rotation::from_degrees([90.0, 0.0, 0.0]);
        assert!(close(rx.apply(&Vector3::y()), [0.0, 0.0, 1.0]));

        let ry = Rotation::from_degrees([0.0, 90.0, 0.0]);
        assert!(close(ry.apply(&Vector3::z()), [1.0, 0.0, 0.0]));
    }

    #[test]
    fn test_z_applied_before_x() {
        // 先绕 Z 把 x 轴转到 y 轴, 再绕 X 把 y 轴转到 z 轴.
        let r = Rotation::from_degrees([90.0, 0.0, 90.0]);
        assert!(close(r.apply(&Vector3::x()), [0.0, 0.0, 1.0]));
    }

    #[test]
    fn test_inverse_round_trip() {
        let r = Rotation::from_degrees([12.5, -40.0, 171.0]);
        let v = Vector3::new(3.0, -7.5, 0.25);
        assert!(close(r.apply_inverse(&r.apply(&v)), [3.0, -7.5, 0.25]));
        assert!(close(r.apply(&r.apply_inverse(&v)), [3.0, -7.5, 0.25]));
    }
}
