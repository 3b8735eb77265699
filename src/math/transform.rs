use glam::{EulerRot, Mat4, Quat, Vec3};

/// A decomposed affine transform: translation, rotation, scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    /// Builds a transform from translate, XYZ Euler rotate (radians) and scale channels.
    pub fn from_channels(translate: Vec3, rotate: Vec3, scale: Vec3) -> Self {
        Self {
            position: translate,
            rotation: Quat::from_euler(EulerRot::XYZ, rotate.x, rotate.y, rotate.z),
            scale,
        }
    }

    pub fn from_matrix(matrix: &Mat4) -> Self {
        let (scale, rotation, position) = matrix.to_scale_rotation_translation();
        Self {
            position,
            rotation,
            scale,
        }
    }

    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// XYZ Euler angles in radians, the layout of the `rotate` channel.
    pub fn euler(&self) -> Vec3 {
        let (x, y, z) = self.rotation.to_euler(EulerRot::XYZ);
        Vec3::new(x, y, z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_round_trip_preserves_channels() {
        let rotate = Vec3::new(0.3, -0.2, 1.1);
        let transform = Transform::from_channels(Vec3::new(1.0, 2.0, 3.0), rotate, Vec3::ONE);
        let back = Transform::from_matrix(&transform.to_matrix());

        assert!((back.position - transform.position).length() < 1e-5);
        assert!((back.euler() - rotate).length() < 1e-4);
    }
}
