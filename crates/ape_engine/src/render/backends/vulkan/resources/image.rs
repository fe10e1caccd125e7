//! Device images: allocation, views, layout transitions and mip chains

use ash::{vk, Device};

use super::buffer::allocate_memory;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Depth formats tried in order of preference
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Number of mip levels down to 1x1 for the larger dimension
pub fn mip_levels(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Whether a depth format carries a stencil aspect
pub fn has_stencil_component(format: vk::Format) -> bool {
    format == vk::Format::D32_SFLOAT_S8_UINT || format == vk::Format::D24_UNORM_S8_UINT
}

/// First candidate whose tiling supports every feature in `features`
pub fn find_supported_format(
    candidates: &[vk::Format],
    tiling: vk::ImageTiling,
    features: vk::FormatFeatureFlags,
    query: impl Fn(vk::Format) -> vk::FormatProperties,
) -> VulkanResult<vk::Format> {
    candidates
        .iter()
        .copied()
        .find(|&format| {
            let properties = query(format);
            match tiling {
                vk::ImageTiling::LINEAR => properties.linear_tiling_features.contains(features),
                vk::ImageTiling::OPTIMAL => properties.optimal_tiling_features.contains(features),
                _ => false,
            }
        })
        .ok_or_else(|| VulkanError::UnsupportedFormat(format!("None of {:?} supports {:?}", candidates, features)))
}

/// Depth attachment format supported with optimal tiling
pub fn find_depth_format(query: impl Fn(vk::Format) -> vk::FormatProperties) -> VulkanResult<vk::Format> {
    find_supported_format(
        &DEPTH_FORMAT_CANDIDATES,
        vk::ImageTiling::OPTIMAL,
        vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        query,
    )
}

/// Fail unless blits from `format` can use linear filtering
pub fn check_linear_blit_support(format: vk::Format, properties: &vk::FormatProperties) -> VulkanResult<()> {
    if properties
        .optimal_tiling_features
        .contains(vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR)
    {
        Ok(())
    } else {
        Err(VulkanError::UnsupportedFormat(format!(
            "{:?} does not support linear blitting",
            format
        )))
    }
}

/// Access masks and pipeline stages for one layout transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionMasks {
    /// Access that must complete before the barrier
    pub src_access: vk::AccessFlags,
    /// Access that waits on the barrier
    pub dst_access: vk::AccessFlags,
    /// Stage producing the prior access
    pub src_stage: vk::PipelineStageFlags,
    /// Stage consuming the new layout
    pub dst_stage: vk::PipelineStageFlags,
}

/// Look up the barrier parameters for a supported transition
///
/// The table is closed: anything not listed is an error.
pub fn transition_masks(old: vk::ImageLayout, new: vk::ImageLayout) -> VulkanResult<TransitionMasks> {
    match (old, new) {
        (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL) => Ok(TransitionMasks {
            src_access: vk::AccessFlags::empty(),
            dst_access: vk::AccessFlags::TRANSFER_WRITE,
            src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
            dst_stage: vk::PipelineStageFlags::TRANSFER,
        }),
        (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL) => Ok(TransitionMasks {
            src_access: vk::AccessFlags::TRANSFER_WRITE,
            dst_access: vk::AccessFlags::SHADER_READ,
            src_stage: vk::PipelineStageFlags::TRANSFER,
            dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
        }),
        (vk::ImageLayout::UNDEFINED, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL) => Ok(TransitionMasks {
            src_access: vk::AccessFlags::empty(),
            dst_access: vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
            dst_stage: vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        }),
        _ => Err(VulkanError::UnsupportedLayoutTransition { old, new }),
    }
}

/// Aspect mask a layout transition of `format` into `new` must cover
pub fn transition_aspect(format: vk::Format, new: vk::ImageLayout) -> vk::ImageAspectFlags {
    if new == vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL {
        if has_stencil_component(format) {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        } else {
            vk::ImageAspectFlags::DEPTH
        }
    } else {
        vk::ImageAspectFlags::COLOR
    }
}

/// Parameters for a 2D device-local image
#[derive(Debug, Clone, Copy)]
pub struct ImageSpec {
    /// Size in pixels
    pub extent: vk::Extent2D,
    /// Number of mip levels
    pub mip_levels: u32,
    /// Samples per pixel
    pub samples: vk::SampleCountFlags,
    /// Texel format
    pub format: vk::Format,
    /// Usage flags
    pub usage: vk::ImageUsageFlags,
    /// Aspect used for the view
    pub aspect: vk::ImageAspectFlags,
}

/// Create a 2D view over `mip_levels` levels of `image`
pub fn create_image_view(
    device: &Device,
    image: vk::Image,
    format: vk::Format,
    aspect: vk::ImageAspectFlags,
    mip_levels: u32,
) -> VulkanResult<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: aspect,
            base_mip_level: 0,
            level_count: mip_levels,
            base_array_layer: 0,
            layer_count: 1,
        });

    unsafe { device.create_image_view(&create_info, None).map_err(VulkanError::Api) }
}

/// Device-local image with bound memory and one view, destroyed on drop
pub struct Image {
    device: Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
    spec: ImageSpec,
}

impl Image {
    /// Create the image, bind memory and create its view
    pub fn new(
        device: Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        spec: ImageSpec,
    ) -> VulkanResult<Self> {
        let create_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: spec.extent.width,
                height: spec.extent.height,
                depth: 1,
            })
            .mip_levels(spec.mip_levels)
            .array_layers(1)
            .format(spec.format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(spec.usage)
            .samples(spec.samples)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let image = unsafe { device.create_image(&create_info, None).map_err(VulkanError::Api)? };
        let requirements = unsafe { device.get_image_memory_requirements(image) };

        let memory = match allocate_memory(
            &device,
            memory_properties,
            requirements,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ) {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_image(image, None) };
                return Err(e);
            }
        };

        let mut wrapped = Self {
            device,
            image,
            memory,
            view: vk::ImageView::null(),
            spec,
        };
        unsafe {
            wrapped
                .device
                .bind_image_memory(image, memory, 0)
                .map_err(VulkanError::Api)?;
        }
        wrapped.view = create_image_view(&wrapped.device, image, spec.format, spec.aspect, spec.mip_levels)?;

        log::debug!(
            "Created image {}x{} {:?} ({} mips, {:?})",
            spec.extent.width,
            spec.extent.height,
            spec.format,
            spec.mip_levels,
            spec.samples
        );
        Ok(wrapped)
    }

    /// Get image handle
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    /// Get the view covering every mip level
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Get the creation parameters
    pub fn spec(&self) -> &ImageSpec {
        &self.spec
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            if self.view != vk::ImageView::null() {
                self.device.destroy_image_view(self.view, None);
            }
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Record a whole-image layout transition from the supported table
pub fn record_layout_transition(
    device: &Device,
    command_buffer: vk::CommandBuffer,
    image: vk::Image,
    format: vk::Format,
    old: vk::ImageLayout,
    new: vk::ImageLayout,
    mip_levels: u32,
) -> VulkanResult<()> {
    let masks = transition_masks(old, new)?;

    let barrier = vk::ImageMemoryBarrier::builder()
        .old_layout(old)
        .new_layout(new)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: transition_aspect(format, new),
            base_mip_level: 0,
            level_count: mip_levels,
            base_array_layer: 0,
            layer_count: 1,
        })
        .src_access_mask(masks.src_access)
        .dst_access_mask(masks.dst_access);

    unsafe {
        device.cmd_pipeline_barrier(
            command_buffer,
            masks.src_stage,
            masks.dst_stage,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[barrier.build()],
        );
    }
    Ok(())
}

/// Record a copy of tightly packed pixels from `buffer` into mip level 0
pub fn record_buffer_to_image_copy(
    device: &Device,
    command_buffer: vk::CommandBuffer,
    buffer: vk::Buffer,
    image: vk::Image,
    extent: vk::Extent2D,
) {
    let region = vk::BufferImageCopy::builder()
        .buffer_offset(0)
        .buffer_row_length(0)
        .buffer_image_height(0)
        .image_subresource(vk::ImageSubresourceLayers {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level: 0,
            base_array_layer: 0,
            layer_count: 1,
        })
        .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
        .image_extent(vk::Extent3D {
            width: extent.width,
            height: extent.height,
            depth: 1,
        });

    unsafe {
        device.cmd_copy_buffer_to_image(
            command_buffer,
            buffer,
            image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &[region.build()],
        );
    }
}

/// Size of one mip level, never below 1x1
pub fn mip_extent(extent: vk::Extent2D, level: u32) -> vk::Extent2D {
    vk::Extent2D {
        width: (extent.width >> level).max(1),
        height: (extent.height >> level).max(1),
    }
}

fn blit_offsets(extent: vk::Extent2D) -> [vk::Offset3D; 2] {
    [
        vk::Offset3D { x: 0, y: 0, z: 0 },
        vk::Offset3D {
            x: extent.width as i32,
            y: extent.height as i32,
            z: 1,
        },
    ]
}

/// Fill mip levels 1.. by successive linear blits and leave every level shader-readable
///
/// Expects every level in TRANSFER_DST_OPTIMAL with level 0 already written.
pub fn record_mipmap_generation(
    device: &Device,
    command_buffer: vk::CommandBuffer,
    image: vk::Image,
    extent: vk::Extent2D,
    mip_levels: u32,
) {
    let mut barrier = vk::ImageMemoryBarrier::builder()
        .image(image)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        })
        .build();

    let subresource = |level: u32| vk::ImageSubresourceLayers {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        mip_level: level,
        base_array_layer: 0,
        layer_count: 1,
    };

    for level in 1..mip_levels {
        let source = level - 1;

        // Source level: written by the previous copy or blit, now read by this blit
        barrier.subresource_range.base_mip_level = source;
        barrier.old_layout = vk::ImageLayout::TRANSFER_DST_OPTIMAL;
        barrier.new_layout = vk::ImageLayout::TRANSFER_SRC_OPTIMAL;
        barrier.src_access_mask = vk::AccessFlags::TRANSFER_WRITE;
        barrier.dst_access_mask = vk::AccessFlags::TRANSFER_READ;
        unsafe {
            device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::TRANSFER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }

        let blit = vk::ImageBlit {
            src_subresource: subresource(source),
            src_offsets: blit_offsets(mip_extent(extent, source)),
            dst_subresource: subresource(level),
            dst_offsets: blit_offsets(mip_extent(extent, level)),
        };
        unsafe {
            device.cmd_blit_image(
                command_buffer,
                image,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[blit],
                vk::Filter::LINEAR,
            );
        }

        // Source level is final
        barrier.old_layout = vk::ImageLayout::TRANSFER_SRC_OPTIMAL;
        barrier.new_layout = vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL;
        barrier.src_access_mask = vk::AccessFlags::TRANSFER_READ;
        barrier.dst_access_mask = vk::AccessFlags::SHADER_READ;
        unsafe {
            device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }
    }

    // The last level is never a blit source and goes straight to shader-read
    barrier.subresource_range.base_mip_level = mip_levels.saturating_sub(1);
    barrier.old_layout = vk::ImageLayout::TRANSFER_DST_OPTIMAL;
    barrier.new_layout = vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL;
    barrier.src_access_mask = vk::AccessFlags::TRANSFER_WRITE;
    barrier.dst_access_mask = vk::AccessFlags::SHADER_READ;
    unsafe {
        device.cmd_pipeline_barrier(
            command_buffer,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[barrier],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn optimal(features: vk::FormatFeatureFlags) -> vk::FormatProperties {
        vk::FormatProperties {
            optimal_tiling_features: features,
            ..Default::default()
        }
    }

    #[test]
    fn test_mip_levels() {
        assert_eq!(mip_levels(512, 300), 10);
        assert_eq!(mip_levels(1024, 1024), 11);
        assert_eq!(mip_levels(1, 1), 1);
        assert_eq!(mip_levels(300, 513), 10);
    }

    #[test]
    fn test_mip_extent_never_reaches_zero() {
        let extent = vk::Extent2D { width: 512, height: 300 };
        assert_eq!(mip_extent(extent, 1), vk::Extent2D { width: 256, height: 150 });
        assert_eq!(mip_extent(extent, 9), vk::Extent2D { width: 1, height: 1 });
    }

    #[test]
    fn test_supported_transitions() {
        let upload = transition_masks(vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL).unwrap();
        assert_eq!(upload.src_access, vk::AccessFlags::empty());
        assert_eq!(upload.dst_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(upload.src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(upload.dst_stage, vk::PipelineStageFlags::TRANSFER);

        let sample = transition_masks(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )
        .unwrap();
        assert_eq!(sample.src_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(sample.dst_access, vk::AccessFlags::SHADER_READ);
        assert_eq!(sample.src_stage, vk::PipelineStageFlags::TRANSFER);
        assert_eq!(sample.dst_stage, vk::PipelineStageFlags::FRAGMENT_SHADER);

        let depth = transition_masks(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        )
        .unwrap();
        assert_eq!(
            depth.dst_access,
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE
        );
        assert_eq!(depth.dst_stage, vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS);
    }

    #[test]
    fn test_unlisted_transitions_are_rejected() {
        let pairs = [
            (vk::ImageLayout::UNDEFINED, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
            (vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, vk::ImageLayout::TRANSFER_DST_OPTIMAL),
            (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::PRESENT_SRC_KHR),
        ];

        for (old, new) in pairs {
            let err = transition_masks(old, new).unwrap_err();
            assert!(matches!(
                err,
                VulkanError::UnsupportedLayoutTransition { old: o, new: n } if o == old && n == new
            ));
        }
    }

    #[test]
    fn test_depth_format_probing_order() {
        let only_d24 = |format: vk::Format| {
            if format == vk::Format::D24_UNORM_S8_UINT {
                optimal(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
            } else {
                vk::FormatProperties::default()
            }
        };
        assert_eq!(find_depth_format(only_d24).unwrap(), vk::Format::D24_UNORM_S8_UINT);

        let all = |_: vk::Format| optimal(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT);
        assert_eq!(find_depth_format(all).unwrap(), vk::Format::D32_SFLOAT);

        let none = |_: vk::Format| vk::FormatProperties::default();
        assert!(matches!(find_depth_format(none), Err(VulkanError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_linear_tiling_is_checked_separately() {
        let linear_only = |_: vk::Format| vk::FormatProperties {
            linear_tiling_features: vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            ..Default::default()
        };
        assert!(find_depth_format(linear_only).is_err());
    }

    #[test]
    fn test_stencil_aspect() {
        assert!(!has_stencil_component(vk::Format::D32_SFLOAT));
        assert!(has_stencil_component(vk::Format::D24_UNORM_S8_UINT));
        assert_eq!(
            transition_aspect(vk::Format::D32_SFLOAT_S8_UINT, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
        assert_eq!(
            transition_aspect(vk::Format::R8G8B8A8_SRGB, vk::ImageLayout::TRANSFER_DST_OPTIMAL),
            vk::ImageAspectFlags::COLOR
        );
    }

    #[test]
    fn test_linear_blit_support() {
        let props = optimal(vk::FormatFeatureFlags::SAMPLED_IMAGE | vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR);
        assert!(check_linear_blit_support(vk::Format::R8G8B8A8_SRGB, &props).is_ok());

        let props = optimal(vk::FormatFeatureFlags::SAMPLED_IMAGE);
        assert!(check_linear_blit_support(vk::Format::R8G8B8A8_SRGB, &props).is_err());
    }
}
