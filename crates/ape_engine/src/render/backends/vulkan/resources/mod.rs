//! Vulkan resource management
//!
//! Buffers, images, textures, uniforms, descriptors and the drawables built
//! from them. Device-local contents always arrive through a staging buffer and
//! a one-shot transfer.

use ash::{vk, Device};

use super::rendering::commands::CommandPool;

/// Buffer types (vertex, index, staging, generic)
pub mod buffer;

/// Images, layout transitions and mip generation
pub mod image;

/// Sampled textures
pub mod texture;

/// Per-frame uniform data
pub mod uniform;

/// Descriptor set management
pub mod descriptor_set;

/// Textured meshes
pub mod drawable;

pub use buffer::Buffer;
pub use descriptor_set::{DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder};
pub use drawable::Drawable;
pub use image::{Image, ImageSpec};
pub use texture::Texture;
pub use uniform::{UniformBuffer, UniformBufferObject};

/// What a load-time upload needs from the device
pub struct UploadContext<'a> {
    /// Logical device
    pub device: &'a Device,
    /// Memory types of the physical device
    pub memory_properties: &'a vk::PhysicalDeviceMemoryProperties,
    /// Feature support of [`texture::TEXTURE_FORMAT`]
    pub format_properties: vk::FormatProperties,
    /// Largest anisotropy a sampler may use
    pub max_anisotropy: f32,
    /// Pool for one-shot transfers
    pub command_pool: &'a CommandPool,
    /// Queue transfers are submitted to
    pub queue: vk::Queue,
}
