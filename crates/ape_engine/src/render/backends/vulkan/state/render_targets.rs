//! Per-swapchain render targets
//!
//! Everything whose size follows the swapchain: the swapchain itself, the
//! shared multisampled color target, the shared depth target and one
//! framebuffer per swapchain image. Rebuilt as a unit on recreation.

use ash::{vk, Device};

use super::swapchain::Swapchain;
use crate::render::backends::vulkan::rendering::commands::CommandPool;
use crate::render::backends::vulkan::resources::image::{record_layout_transition, Image, ImageSpec};
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Framebuffer attachment views in render pass order
///
/// With a multisampled color target: `[color, depth, swapchain view]`, the
/// swapchain view being the resolve target. Without: `[swapchain view, depth]`.
pub fn framebuffer_attachments(
    msaa_color: Option<vk::ImageView>,
    depth: vk::ImageView,
    swapchain_view: vk::ImageView,
) -> Vec<vk::ImageView> {
    match msaa_color {
        Some(color) => vec![color, depth, swapchain_view],
        None => vec![swapchain_view, depth],
    }
}

/// Framebuffer wrapper with RAII cleanup
pub struct Framebuffer {
    device: Device,
    framebuffer: vk::Framebuffer,
}

impl Framebuffer {
    /// Create a new framebuffer
    pub fn new(
        device: Device,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe { device.create_framebuffer(&create_info, None).map_err(VulkanError::Api)? };
        Ok(Self { device, framebuffer })
    }

    /// Get the framebuffer handle
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}

/// Fixed inputs shared by every rebuild of the targets
#[derive(Debug, Clone, Copy)]
pub struct TargetSpec {
    /// Pass the framebuffers are compatible with
    pub render_pass: vk::RenderPass,
    /// Sample count of color and depth
    pub samples: vk::SampleCountFlags,
    /// Depth target format
    pub depth_format: vk::Format,
}

impl TargetSpec {
    fn multisampled(&self) -> bool {
        self.samples != vk::SampleCountFlags::TYPE_1
    }
}

/// Swapchain with its attachments and framebuffers
///
/// Fields drop top to bottom, so framebuffers go before the images they view.
pub struct SwapchainTargets {
    framebuffers: Vec<Framebuffer>,
    depth: Image,
    msaa_color: Option<Image>,
    swapchain: Swapchain,
}

impl SwapchainTargets {
    /// Build attachments and framebuffers for `swapchain`
    pub fn new(
        device: &Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        command_pool: &CommandPool,
        queue: vk::Queue,
        swapchain: Swapchain,
        spec: &TargetSpec,
    ) -> VulkanResult<Self> {
        let extent = swapchain.extent();

        let msaa_color = if spec.multisampled() {
            Some(Image::new(
                device.clone(),
                memory_properties,
                ImageSpec {
                    extent,
                    mip_levels: 1,
                    samples: spec.samples,
                    format: swapchain.format(),
                    usage: vk::ImageUsageFlags::TRANSIENT_ATTACHMENT | vk::ImageUsageFlags::COLOR_ATTACHMENT,
                    aspect: vk::ImageAspectFlags::COLOR,
                },
            )?)
        } else {
            None
        };

        let depth = Image::new(
            device.clone(),
            memory_properties,
            ImageSpec {
                extent,
                mip_levels: 1,
                samples: spec.samples,
                format: spec.depth_format,
                usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
                aspect: vk::ImageAspectFlags::DEPTH,
            },
        )?;

        let mut recorded = Ok(());
        command_pool.execute_one_shot(queue, |device, command_buffer| {
            recorded = record_layout_transition(
                device,
                command_buffer,
                depth.handle(),
                spec.depth_format,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
                1,
            );
        })?;
        recorded?;

        let framebuffers = swapchain
            .image_views()
            .iter()
            .map(|&view| {
                let attachments = framebuffer_attachments(msaa_color.as_ref().map(Image::view), depth.view(), view);
                Framebuffer::new(device.clone(), spec.render_pass, &attachments, extent)
            })
            .collect::<VulkanResult<Vec<_>>>()?;

        log::debug!(
            "Render targets built: {} framebuffers, msaa {}",
            framebuffers.len(),
            msaa_color.is_some()
        );

        Ok(Self {
            framebuffers,
            depth,
            msaa_color,
            swapchain,
        })
    }

    /// The swapchain the targets were built for
    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    /// Size of every target
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    /// Number of swapchain images, and so of framebuffers
    pub fn image_count(&self) -> usize {
        self.framebuffers.len()
    }

    /// Framebuffer rendering into swapchain image `image_index`
    pub fn framebuffer(&self, image_index: u32) -> VulkanResult<vk::Framebuffer> {
        self.framebuffers
            .get(image_index as usize)
            .map(Framebuffer::handle)
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!(
                    "Image index {} out of range for {} framebuffers",
                    image_index,
                    self.framebuffers.len()
                ),
            })
    }
}
