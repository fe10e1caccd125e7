//! Per-frame uniform data and persistently mapped uniform buffers

use ash::{vk, Device};
use std::marker::PhantomData;

use super::buffer::{Buffer, HOST_VISIBLE_COHERENT};
use crate::foundation::math::{utils::deg_to_rad, Mat4, Mat4Ext, Vec3};
use crate::render::backends::vulkan::VulkanResult;

/// Camera position the scene is viewed from
pub const CAMERA_EYE: [f32; 3] = [2.0, 2.0, 2.0];
/// Vertical field of view in degrees
pub const FOV_Y_DEGREES: f32 = 45.0;
/// Near clip plane
pub const NEAR_PLANE: f32 = 0.1;
/// Far clip plane
pub const FAR_PLANE: f32 = 10.0;
/// Spin rate of every drawable around +Z
pub const ROTATION_DEGREES_PER_SECOND: f32 = 90.0;

/// Model/view/projection block at binding 0 of the vertex shader
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct UniformBufferObject {
    /// Object to world
    pub model: [[f32; 4]; 4],
    /// World to view
    pub view: [[f32; 4]; 4],
    /// View to clip, Y already flipped for Vulkan
    pub proj: [[f32; 4]; 4],
}

unsafe impl bytemuck::Pod for UniformBufferObject {}
unsafe impl bytemuck::Zeroable for UniformBufferObject {}

impl UniformBufferObject {
    /// Transforms for a drawable placed by `placement`, `elapsed_seconds` after startup
    pub fn compute(placement: &Mat4, elapsed_seconds: f32, extent: vk::Extent2D) -> Self {
        let spin = Mat4::rotation_z(elapsed_seconds * deg_to_rad(ROTATION_DEGREES_PER_SECOND));
        let model = placement * spin;

        let view = Mat4::look_at(Vec3::from(CAMERA_EYE), Vec3::zeros(), Vec3::z());

        let aspect = extent.width as f32 / extent.height.max(1) as f32;
        let proj = Mat4::perspective(deg_to_rad(FOV_Y_DEGREES), aspect, NEAR_PLANE, FAR_PLANE).flip_clip_y();

        Self {
            model: model.into(),
            view: view.into(),
            proj: proj.into(),
        }
    }
}

/// Host-coherent uniform buffer mapped for its whole lifetime
///
/// Coherent memory makes writes visible without an explicit flush. The frame
/// fence guarantees the GPU is not reading when the CPU writes.
pub struct UniformBuffer<T: bytemuck::Pod> {
    buffer: Buffer,
    mapped: *mut T,
    _marker: PhantomData<T>,
}

impl<T: bytemuck::Pod> UniformBuffer<T> {
    /// Allocate and map a buffer holding one `T`
    pub fn new(device: Device, memory_properties: &vk::PhysicalDeviceMemoryProperties) -> VulkanResult<Self> {
        let buffer = Buffer::new(
            device,
            memory_properties,
            std::mem::size_of::<T>() as vk::DeviceSize,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            HOST_VISIBLE_COHERENT,
        )?;
        let mapped = buffer.map_memory()?.cast::<T>();

        Ok(Self {
            buffer,
            mapped,
            _marker: PhantomData,
        })
    }

    /// Overwrite the buffer contents
    pub fn write(&mut self, value: &T) {
        unsafe {
            self.mapped.write(*value);
        }
    }

    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    /// Size of the bound range
    pub fn range(&self) -> vk::DeviceSize {
        std::mem::size_of::<T>() as vk::DeviceSize
    }
}

impl<T: bytemuck::Pod> Drop for UniformBuffer<T> {
    fn drop(&mut self) {
        self.buffer.unmap_memory();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Point3, Vec4};
    use approx::assert_relative_eq;
    use nalgebra::Translation3;

    const EXTENT: vk::Extent2D = vk::Extent2D { width: 800, height: 600 };

    #[test]
    fn test_layout_is_three_matrices() {
        assert_eq!(std::mem::size_of::<UniformBufferObject>(), 3 * 64);
    }

    #[test]
    fn test_model_spins_a_quarter_turn_per_second() {
        let ubo = UniformBufferObject::compute(&Mat4::identity(), 1.0, EXTENT);
        let model = Mat4::from(ubo.model);

        let rotated = model * Vec4::new(1.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(rotated.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(rotated.y, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_placement_applies_after_spin() {
        let placement = Translation3::new(0.6, 0.0, 0.0).to_homogeneous();
        let ubo = UniformBufferObject::compute(&placement, 1.0, EXTENT);
        let model = Mat4::from(ubo.model);

        let origin = model.transform_point(&Point3::origin());
        assert_relative_eq!(origin.x, 0.6, epsilon = 1e-5);
        assert_relative_eq!(origin.y, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_projection_uses_extent_aspect_and_flips_y() {
        let ubo = UniformBufferObject::compute(&Mat4::identity(), 0.0, EXTENT);
        let proj = Mat4::from(ubo.proj);

        let focal = 1.0 / (deg_to_rad(FOV_Y_DEGREES) * 0.5).tan();
        assert_relative_eq!(proj[(1, 1)], -focal, epsilon = 1e-5);
        assert_relative_eq!(proj[(0, 0)], focal / (800.0 / 600.0), epsilon = 1e-5);
    }

    #[test]
    fn test_zero_height_extent_does_not_divide_by_zero() {
        let ubo = UniformBufferObject::compute(&Mat4::identity(), 0.0, vk::Extent2D { width: 800, height: 0 });
        assert!(ubo.proj.iter().flatten().all(|value| value.is_finite()));
    }
}
