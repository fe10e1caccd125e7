//! Vulkan-specific vertex layout definitions
//!
//! Kept apart from the mesh module so the core mesh types stay backend-agnostic.

use ash::vk;
use std::mem::{offset_of, size_of};

use crate::render::mesh::Vertex;

/// Binding the vertex buffer is bound to
pub const VERTEX_BINDING: u32 = 0;

/// Vulkan vertex layout implementation for the engine's Vertex type
pub struct VulkanVertexLayout;

impl VulkanVertexLayout {
    /// Get Vulkan vertex input binding description for Vertex
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: VERTEX_BINDING,
            stride: size_of::<Vertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Get Vulkan vertex input attribute descriptions for Vertex
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 3] {
        [
            // Position (location = 0)
            vk::VertexInputAttributeDescription {
                binding: VERTEX_BINDING,
                location: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: offset_of!(Vertex, pos) as u32,
            },
            // Color (location = 1)
            vk::VertexInputAttributeDescription {
                binding: VERTEX_BINDING,
                location: 1,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: offset_of!(Vertex, color) as u32,
            },
            // Texture coordinate (location = 2)
            vk::VertexInputAttributeDescription {
                binding: VERTEX_BINDING,
                location: 2,
                format: vk::Format::R32G32_SFLOAT,
                offset: offset_of!(Vertex, tex_coord) as u32,
            },
        ]
    }
}
