//! GPU-side drawable objects
//!
//! A drawable owns its geometry, texture and per-slot uniforms. It shares the
//! device, pipeline and pools with every other drawable.

use ash::vk;

use super::buffer::Buffer;
use super::descriptor_set::{write_textured_set, DescriptorPool};
use super::texture::Texture;
use super::uniform::{UniformBuffer, UniformBufferObject};
use super::UploadContext;
use crate::assets::ImageData;
use crate::foundation::math::Mat4;
use crate::render::backends::vulkan::rendering::commands::ActiveRenderPass;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};
use crate::render::mesh::Mesh;

/// One textured mesh ready to draw
pub struct Drawable {
    // Owned by the descriptor pool, listed for binding only
    descriptor_sets: Vec<vk::DescriptorSet>,
    uniforms: Vec<UniformBuffer<UniformBufferObject>>,
    texture: Texture,
    index_buffer: Buffer,
    vertex_buffer: Buffer,
    index_count: u32,
    placement: Mat4,
}

impl Drawable {
    /// Upload `mesh` and `image` and allocate one uniform buffer and descriptor set per frame slot
    pub fn new(
        upload: &UploadContext<'_>,
        descriptor_pool: &DescriptorPool,
        set_layout: vk::DescriptorSetLayout,
        frames_in_flight: usize,
        mesh: &Mesh,
        image: &ImageData,
        placement: Mat4,
    ) -> VulkanResult<Self> {
        if mesh.is_empty() {
            return Err(VulkanError::InvalidOperation {
                reason: "Cannot upload an empty mesh".to_string(),
            });
        }

        let vertex_buffer = Buffer::device_local_with_data(
            upload.device,
            upload.memory_properties,
            upload.command_pool,
            upload.queue,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            &mesh.vertices,
        )?;
        let index_buffer = Buffer::device_local_with_data(
            upload.device,
            upload.memory_properties,
            upload.command_pool,
            upload.queue,
            vk::BufferUsageFlags::INDEX_BUFFER,
            &mesh.indices,
        )?;
        let texture = Texture::from_image_data(upload, image)?;

        let uniforms = (0..frames_in_flight)
            .map(|_| UniformBuffer::new(upload.device.clone(), upload.memory_properties))
            .collect::<VulkanResult<Vec<_>>>()?;

        let layouts = vec![set_layout; frames_in_flight];
        let descriptor_sets = descriptor_pool.allocate_descriptor_sets(&layouts)?;
        for (set, uniform) in descriptor_sets.iter().zip(&uniforms) {
            write_textured_set(
                upload.device,
                *set,
                uniform.handle(),
                uniform.range(),
                texture.view(),
                texture.sampler(),
            );
        }

        log::debug!(
            "Drawable uploaded: {} vertices, {} indices, {} mip levels",
            mesh.vertices.len(),
            mesh.indices.len(),
            texture.mip_levels()
        );

        Ok(Self {
            descriptor_sets,
            uniforms,
            texture,
            index_buffer,
            vertex_buffer,
            index_count: mesh.index_count(),
            placement,
        })
    }

    /// Write this frame's transforms into the slot's uniform buffer
    pub fn update_uniform(&mut self, slot: usize, elapsed_seconds: f32, extent: vk::Extent2D) {
        let ubo = UniformBufferObject::compute(&self.placement, elapsed_seconds, extent);
        self.uniforms[slot].write(&ubo);
    }

    /// Record binds and the indexed draw for a frame slot
    pub fn record(&self, pass: &mut ActiveRenderPass<'_, '_>, pipeline_layout: vk::PipelineLayout, slot: usize) {
        pass.bind_vertex_buffer(self.vertex_buffer.handle());
        pass.bind_index_buffer(self.index_buffer.handle());
        pass.bind_descriptor_set(pipeline_layout, self.descriptor_sets[slot]);
        pass.draw_indexed(self.index_count);
    }
}
