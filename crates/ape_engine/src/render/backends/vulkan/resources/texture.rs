//! Sampled textures with generated mip chains

use ash::{vk, Device};

use super::buffer::Buffer;
use super::UploadContext;
use super::image::{
    check_linear_blit_support, mip_levels, record_buffer_to_image_copy, record_layout_transition,
    record_mipmap_generation, Image, ImageSpec,
};
use crate::assets::image_loader::rgba_byte_len;
use crate::assets::ImageData;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Texel format used for decoded RGBA8 images
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

/// Sampler configuration for a texture with `mip_levels` levels
pub fn sampler_create_info(max_anisotropy: f32, mip_levels: u32) -> vk::SamplerCreateInfo {
    vk::SamplerCreateInfo::builder()
        .mag_filter(vk::Filter::LINEAR)
        .min_filter(vk::Filter::LINEAR)
        .address_mode_u(vk::SamplerAddressMode::REPEAT)
        .address_mode_v(vk::SamplerAddressMode::REPEAT)
        .address_mode_w(vk::SamplerAddressMode::REPEAT)
        .anisotropy_enable(true)
        .max_anisotropy(max_anisotropy)
        .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
        .unnormalized_coordinates(false)
        .compare_enable(false)
        .compare_op(vk::CompareOp::ALWAYS)
        .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
        .mip_lod_bias(0.0)
        .min_lod(0.0)
        .max_lod(mip_levels as f32)
        .build()
}

/// Sampler wrapper, destroyed on drop
pub struct Sampler {
    device: Device,
    sampler: vk::Sampler,
}

impl Sampler {
    /// Create a sampler
    pub fn new(device: Device, create_info: &vk::SamplerCreateInfo) -> VulkanResult<Self> {
        let sampler = unsafe { device.create_sampler(create_info, None).map_err(VulkanError::Api)? };
        Ok(Self { device, sampler })
    }

    /// Get sampler handle
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
        }
    }
}

/// Mipmapped, shader-readable texture and its sampler
pub struct Texture {
    sampler: Sampler,
    image: Image,
}

impl Texture {
    /// Upload decoded pixels and generate the full mip chain
    pub fn from_image_data(upload: &UploadContext<'_>, data: &ImageData) -> VulkanResult<Self> {
        let expected = rgba_byte_len(data.width, data.height);
        if data.width == 0 || data.height == 0 || data.data.len() != expected {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "Texture data is {} bytes, expected {} for {}x{} RGBA",
                    data.data.len(),
                    expected,
                    data.width,
                    data.height
                ),
            });
        }

        check_linear_blit_support(TEXTURE_FORMAT, &upload.format_properties)?;

        let extent = vk::Extent2D {
            width: data.width,
            height: data.height,
        };
        let levels = mip_levels(data.width, data.height);

        let staging = Buffer::staging_with_bytes(upload.device, upload.memory_properties, &data.data)?;
        let image = Image::new(
            upload.device.clone(),
            upload.memory_properties,
            ImageSpec {
                extent,
                mip_levels: levels,
                samples: vk::SampleCountFlags::TYPE_1,
                format: TEXTURE_FORMAT,
                usage: vk::ImageUsageFlags::TRANSFER_SRC
                    | vk::ImageUsageFlags::TRANSFER_DST
                    | vk::ImageUsageFlags::SAMPLED,
                aspect: vk::ImageAspectFlags::COLOR,
            },
        )?;

        // The recording closure returns nothing, so the transition result is carried out of it
        let mut recorded = Ok(());
        upload.command_pool.execute_one_shot(upload.queue, |device, command_buffer| {
            recorded = record_layout_transition(
                device,
                command_buffer,
                image.handle(),
                TEXTURE_FORMAT,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                levels,
            );
            if recorded.is_ok() {
                record_buffer_to_image_copy(device, command_buffer, staging.handle(), image.handle(), extent);
                record_mipmap_generation(device, command_buffer, image.handle(), extent, levels);
            }
        })?;
        recorded?;

        let sampler = Sampler::new(
            upload.device.clone(),
            &sampler_create_info(upload.max_anisotropy, levels),
        )?;

        log::debug!("Uploaded texture {}x{} with {} mip levels", data.width, data.height, levels);
        Ok(Self { sampler, image })
    }

    /// Image view covering the whole mip chain
    pub fn view(&self) -> vk::ImageView {
        self.image.view()
    }

    /// Sampler handle
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler.handle()
    }

    /// Number of mip levels
    pub fn mip_levels(&self) -> u32 {
        self.image.spec().mip_levels
    }
}
