//! Rigid-plus-uniform-scale transform used to place a reference particle's
//! mesh into world space, generalized from a 2D position+rotation isometry
//! to 3D with an added uniform scale factor.

use vek::Vec3;

/// Rotation about an arbitrary axis, stored as axis + angle (Rodrigues'
/// formula) so it composes without pulling in a quaternion dependency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisAngle {
    axis: Vec3<f64>,
    angle: f64,
}

impl AxisAngle {
    /// Build a rotation from an axis (need not be normalized) and an angle
    /// in radians. Falls back to the identity rotation if the axis is
    /// degenerate (zero length).
    pub fn new(axis: Vec3<f64>, angle: f64) -> Self {
        let len = axis.magnitude();
        let axis = if len > 1e-12 { axis / len } else { Vec3::unit_z() };

        Self { axis, angle }
    }

    /// The identity rotation (angle = 0).
    pub fn identity() -> Self {
        Self {
            axis: Vec3::unit_z(),
            angle: 0.0,
        }
    }

    /// Rotate a point about the origin.
    pub fn rotate(&self, p: Vec3<f64>) -> Vec3<f64> {
        if self.angle == 0.0 {
            return p;
        }

        let (sin, cos) = self.angle.sin_cos();
        let k = self.axis;

        // Rodrigues' rotation formula: p_rot = p*cos + (k x p)*sin + k*(k.p)*(1-cos)
        p * cos + k.cross(p) * sin + k * k.dot(p) * (1.0 - cos)
    }

    pub fn axis(&self) -> Vec3<f64> {
        self.axis
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }
}

impl Default for AxisAngle {
    fn default() -> Self {
        Self::identity()
    }
}

/// `T(p) = c + s * R(theta, axis) * (p - p0)`: a rigid transform with a
/// uniform scale, applied about a pivot `p0` and translated to a new center
/// `c`. This is the reference-to-world placement operator for a particle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Point in reference space that maps to `translation` (usually the
    /// reference particle's centroid).
    pub pivot: Vec3<f64>,
    pub translation: Vec3<f64>,
    pub rotation: AxisAngle,
    pub scale: f64,
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            pivot: Vec3::zero(),
            translation: Vec3::zero(),
            rotation: AxisAngle::identity(),
            scale: 1.0,
        }
    }

    pub fn new(pivot: Vec3<f64>, translation: Vec3<f64>, rotation: AxisAngle, scale: f64) -> Self {
        Self {
            pivot,
            translation,
            rotation,
            scale,
        }
    }

    /// Apply the transform to a reference-space point.
    pub fn apply(&self, p: Vec3<f64>) -> Vec3<f64> {
        self.translation + self.rotation.rotate((p - self.pivot) * self.scale)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotate_quarter_turn_about_z() {
        let rot = AxisAngle::new(Vec3::unit_z(), std::f64::consts::FRAC_PI_2);
        let p = rot.rotate(Vec3::new(1.0, 0.0, 0.0));

        assert!((p.x - 0.0).abs() < 1e-9);
        assert!((p.y - 1.0).abs() < 1e-9);
        assert!((p.z - 0.0).abs() < 1e-9);
    }

    #[test]
    fn identity_transform_is_noop() {
        let t = Transform::identity();
        let p = Vec3::new(3.0, -2.0, 1.0);

        assert_eq!(t.apply(p), p);
    }

    #[test]
    fn transform_applies_pivot_scale_rotation_translation_in_order() {
        let t = Transform::new(
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            AxisAngle::new(Vec3::unit_z(), std::f64::consts::FRAC_PI_2),
            2.0,
        );
        // p - pivot = (1, 0, 0); scaled = (2, 0, 0); rotated 90deg = (0, 2, 0);
        // translated = (10, 2, 0).
        let p = t.apply(Vec3::new(2.0, 0.0, 0.0));

        assert!((p.x - 10.0).abs() < 1e-9);
        assert!((p.y - 2.0).abs() < 1e-9);
        assert!((p.z - 0.0).abs() < 1e-9);
    }
}
