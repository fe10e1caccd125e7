//! Math utilities and types
//!
//! Thin aliases over nalgebra plus the projection helpers the renderer needs.

pub use nalgebra::{Matrix4, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;
}

/// Math utility functions
pub mod utils {
    use super::constants;

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }
}

/// Extension trait for Mat4 with additional convenience methods
pub trait Mat4Ext {
    /// Create a rotation matrix around the Z axis
    fn rotation_z(angle: f32) -> Mat4;

    /// Right-handed perspective projection mapping depth to `[0, 1]`.
    ///
    /// Clip-space Y still points up; see [`Mat4Ext::flip_clip_y`].
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Right-handed look-at view matrix
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;

    /// Negate the Y scale of a projection so +Y lands at the top of a Vulkan framebuffer
    fn flip_clip_y(self) -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn rotation_z(angle: f32) -> Mat4 {
        Mat4::from_axis_angle(&Vec3::z_axis(), angle)
    }

    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        let tan_half_fovy = (fov_y * 0.5).tan();

        let mut result = Mat4::zeros();
        result[(0, 0)] = 1.0 / (aspect * tan_half_fovy);
        result[(1, 1)] = 1.0 / tan_half_fovy;
        result[(2, 2)] = far / (near - far);
        result[(2, 3)] = -(far * near) / (far - near);
        result[(3, 2)] = -1.0;
        result
    }

    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        Mat4::look_at_rh(&Point3::from(eye), &Point3::from(target), &up)
    }

    fn flip_clip_y(mut self) -> Mat4 {
        self[(1, 1)] *= -1.0;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_perspective_maps_near_and_far_to_unit_depth() {
        let proj = Mat4::perspective(utils::deg_to_rad(45.0), 1.5, 0.1, 10.0);

        let near = proj * Vec4::new(0.0, 0.0, -0.1, 1.0);
        let far = proj * Vec4::new(0.0, 0.0, -10.0, 1.0);

        assert_relative_eq!(near.z / near.w, 0.0, epsilon = 1e-5);
        assert_relative_eq!(far.z / far.w, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_flip_clip_y_only_touches_y_scale() {
        let proj = Mat4::perspective(utils::deg_to_rad(45.0), 1.0, 0.1, 10.0);
        let flipped = proj.flip_clip_y();

        assert_relative_eq!(flipped[(1, 1)], -proj[(1, 1)]);
        assert_relative_eq!(flipped[(0, 0)], proj[(0, 0)]);
        assert_relative_eq!(flipped[(2, 2)], proj[(2, 2)]);
    }

    #[test]
    fn test_look_at_places_target_in_front() {
        let view = Mat4::look_at(Vec3::new(2.0, 2.0, 2.0), Vec3::zeros(), Vec3::z());
        let origin = view.transform_point(&Point3::origin());

        // Right-handed view space looks down -Z
        assert!(origin.z < 0.0);
        assert_relative_eq!(origin.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(origin.y, 0.0, epsilon = 1e-5);
    }
}
