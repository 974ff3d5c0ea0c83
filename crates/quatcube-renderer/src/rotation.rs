//! Quaternion to rotation conversions.
//!
//! Both forms are pure functions of the sample. Neither normalizes its input:
//! samples come straight off the wire and are expected to be near-unit.

use glam::{Mat4, Quat, Vec3, Vec4};
use quatcube_config::RotationMode;

/// Below this `sqrt(1 - w²)` the rotation axis is undefined.
pub const AXIS_EPSILON: f32 = 1e-6;

/// Rotation as an axis and an angle in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisAngle {
    pub axis: Vec3,
    pub angle: f32,
}

impl AxisAngle {
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_axis_angle(self.axis, self.angle)
    }
}

/// Rotation matrix straight from the quaternion terms.
///
/// A non-unit quaternion gives a correspondingly scaled/skewed matrix.
/// Translation and perspective parts are identity.
pub fn quat_to_matrix(q: Quat) -> Mat4 {
    let (x, y, z, w) = (q.x, q.y, q.z, q.w);

    let (xx, yy, zz) = (x * x, y * y, z * z);
    let (xy, xz, yz) = (x * y, x * z, y * z);
    let (wx, wy, wz) = (w * x, w * y, w * z);

    // glam matrices are column-major.
    Mat4::from_cols(
        Vec4::new(1.0 - 2.0 * (yy + zz), 2.0 * (xy + wz), 2.0 * (xz - wy), 0.0),
        Vec4::new(2.0 * (xy - wz), 1.0 - 2.0 * (xx + zz), 2.0 * (yz + wx), 0.0),
        Vec4::new(2.0 * (xz + wy), 2.0 * (yz - wx), 1.0 - 2.0 * (xx + yy), 0.0),
        Vec4::W,
    )
}

/// Axis-angle form of the quaternion.
///
/// When the rotation is (near) identity the axis is undefined; `Vec3::X` is
/// returned with the computed angle instead of dividing by ~0.
pub fn quat_to_axis_angle(q: Quat) -> AxisAngle {
    // Slightly non-unit samples can carry |w| > 1.
    let w = q.w.clamp(-1.0, 1.0);
    let angle = 2.0 * w.acos();
    let s = (1.0 - w * w).sqrt();

    if s < AXIS_EPSILON {
        return AxisAngle {
            axis: Vec3::X,
            angle,
        };
    }

    AxisAngle {
        axis: Vec3::new(q.x / s, q.y / s, q.z / s),
        angle,
    }
}

/// Model matrix for the cube using the configured conversion.
pub fn model_matrix(q: Quat, mode: RotationMode) -> Mat4 {
    match mode {
        RotationMode::Matrix => quat_to_matrix(q),
        RotationMode::AxisAngle => quat_to_axis_angle(q).to_matrix(),
    }
}
