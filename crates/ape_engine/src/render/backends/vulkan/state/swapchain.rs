//! Vulkan swapchain planning and management
//!
//! Every choice made when (re)building the swapchain is a pure function of the
//! surface support, the drawable size and the queue families, collected into a
//! [`SwapchainPlan`]. [`Swapchain`] only turns a plan into handles.

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::vk;
use ash::Device;

use crate::render::backends::vulkan::initialization::{QueueFamilyIndices, SurfaceSupport};
use crate::render::backends::vulkan::resources::image::create_image_view;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Format and color space preferred for presentation
pub const PREFERRED_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// BGRA8 sRGB if offered, otherwise the first reported format
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> VulkanResult<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .copied()
        .find(|candidate| {
            candidate.format == PREFERRED_SURFACE_FORMAT.format
                && candidate.color_space == PREFERRED_SURFACE_FORMAT.color_space
        })
        .or_else(|| formats.first().copied())
        .ok_or_else(|| VulkanError::UnsupportedFormat("Surface reports no formats".to_string()))
}

/// Mailbox if offered, otherwise FIFO, which every implementation supports
pub fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// The surface's current extent, or the drawable size clamped to its limits
///
/// A current width of `u32::MAX` means the surface lets the swapchain decide.
pub fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, drawable: (u32, u32)) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    let min = capabilities.min_image_extent;
    let max = capabilities.max_image_extent;
    vk::Extent2D {
        width: drawable.0.clamp(min.width, max.width),
        height: drawable.1.clamp(min.height, max.height),
    }
}

/// One more than the minimum, capped by the maximum (0 means no maximum)
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        desired.min(capabilities.max_image_count)
    } else {
        desired
    }
}

/// Concurrent sharing across two distinct families, exclusive for one
pub fn choose_sharing(graphics_family: u32, present_family: u32) -> (vk::SharingMode, Vec<u32>) {
    if graphics_family == present_family {
        (vk::SharingMode::EXCLUSIVE, Vec::new())
    } else {
        (vk::SharingMode::CONCURRENT, vec![graphics_family, present_family])
    }
}

/// Everything needed to create a swapchain
#[derive(Debug, Clone, PartialEq)]
pub struct SwapchainPlan {
    /// Image format and color space
    pub surface_format: vk::SurfaceFormatKHR,
    /// Presentation mode
    pub present_mode: vk::PresentModeKHR,
    /// Image size
    pub extent: vk::Extent2D,
    /// Minimum number of images requested
    pub image_count: u32,
    /// Sharing mode between graphics and present queues
    pub sharing_mode: vk::SharingMode,
    /// Families sharing the images when concurrent
    pub queue_family_indices: Vec<u32>,
    /// Surface transform to apply
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

impl SwapchainPlan {
    /// Decide every swapchain parameter
    pub fn new(support: &SurfaceSupport, drawable: (u32, u32), families: &QueueFamilyIndices) -> VulkanResult<Self> {
        let (graphics, present) = families.resolved()?;
        let (sharing_mode, queue_family_indices) = choose_sharing(graphics, present);
        let capabilities = &support.capabilities;

        Ok(Self {
            surface_format: choose_surface_format(&support.formats)?,
            present_mode: choose_present_mode(&support.present_modes),
            extent: choose_extent(capabilities, drawable),
            image_count: choose_image_count(capabilities),
            sharing_mode,
            queue_family_indices,
            pre_transform: capabilities.current_transform,
        })
    }
}

/// Swapchain and its per-image views, destroyed on drop
pub struct Swapchain {
    device: Device,
    loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::Format,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Create the swapchain described by `plan` on `surface`
    pub fn new(
        device: Device,
        loader: SwapchainLoader,
        surface: vk::SurfaceKHR,
        plan: &SwapchainPlan,
    ) -> VulkanResult<Self> {
        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(plan.image_count)
            .image_format(plan.surface_format.format)
            .image_color_space(plan.surface_format.color_space)
            .image_extent(plan.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(plan.sharing_mode)
            .queue_family_indices(&plan.queue_family_indices)
            .pre_transform(plan.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(plan.present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        let swapchain = unsafe { loader.create_swapchain(&create_info, None).map_err(VulkanError::Api)? };

        let mut this = Self {
            device,
            loader,
            swapchain,
            images: Vec::new(),
            image_views: Vec::new(),
            format: plan.surface_format.format,
            extent: plan.extent,
        };

        // Partially built views are released by Drop on the error path
        this.images = unsafe {
            this.loader
                .get_swapchain_images(this.swapchain)
                .map_err(VulkanError::Api)?
        };
        for &image in &this.images {
            let view = create_image_view(&this.device, image, this.format, vk::ImageAspectFlags::COLOR, 1)?;
            this.image_views.push(view);
        }

        log::debug!(
            "Swapchain created: {} images, {}x{}, {:?}, {:?}",
            this.images.len(),
            plan.extent.width,
            plan.extent.height,
            plan.surface_format.format,
            plan.present_mode
        );
        Ok(this)
    }

    /// Get swapchain handle
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Presentable images
    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    /// One color view per image
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    /// Image format
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Image size
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Acquire the next image, signaling `semaphore` when it is ready
    ///
    /// Returns the image index and whether the swapchain is suboptimal.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore, timeout: u64) -> Result<(u32, bool), vk::Result> {
        unsafe {
            self.loader
                .acquire_next_image(self.swapchain, timeout, semaphore, vk::Fence::null())
        }
    }

    /// Queue `image_index` for presentation after `wait_semaphore`
    ///
    /// Returns whether the swapchain is suboptimal.
    pub fn present(&self, queue: vk::Queue, wait_semaphore: vk::Semaphore, image_index: u32) -> Result<bool, vk::Result> {
        let wait_semaphores = [wait_semaphore];
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        unsafe { self.loader.queue_present(queue, &present_info) }
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &view in &self.image_views {
                self.device.destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.swapchain, None);
        }
        log::debug!("Swapchain destroyed ({} views)", self.image_views.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR { format, color_space }
    }

    fn capabilities(min_count: u32, max_count: u32, current: vk::Extent2D) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min_count,
            max_image_count: max_count,
            current_extent: current,
            min_image_extent: vk::Extent2D { width: 100, height: 50 },
            max_image_extent: vk::Extent2D { width: 1920, height: 1080 },
            current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
            ..Default::default()
        }
    }

    const UNDEFINED_EXTENT: vk::Extent2D = vk::Extent2D {
        width: u32::MAX,
        height: u32::MAX,
    };

    #[test]
    fn test_preferred_format_wins_regardless_of_position() {
        let preferred = PREFERRED_SURFACE_FORMAT;
        let other_a = format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR);
        let other_b = format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR);

        for list in [
            vec![preferred, other_a, other_b],
            vec![other_a, preferred, other_b],
            vec![other_a, other_b, preferred],
        ] {
            assert_eq!(choose_surface_format(&list).unwrap(), preferred);
        }
    }

    #[test]
    fn test_first_format_when_preferred_missing() {
        // Right format, wrong color space does not count as preferred
        let first = format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT);
        let second = format(vk::Format::R8G8B8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR);

        assert_eq!(choose_surface_format(&[first, second]).unwrap(), first);
    }

    #[test]
    fn test_no_formats_is_an_error() {
        assert!(matches!(choose_surface_format(&[]), Err(VulkanError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_present_mode_is_mailbox_or_fifo() {
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX]),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO_RELAXED]),
            vk::PresentModeKHR::FIFO
        );
        assert_eq!(choose_present_mode(&[]), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_current_extent_used_when_defined() {
        let current = vk::Extent2D { width: 640, height: 480 };
        let caps = capabilities(2, 3, current);

        assert_eq!(choose_extent(&caps, (1234, 567)), current);
    }

    #[test]
    fn test_drawable_size_clamped_to_limits() {
        let caps = capabilities(2, 3, UNDEFINED_EXTENT);

        for (drawable, expected) in [
            ((800, 600), (800, 600)),
            ((10, 10), (100, 50)),
            ((4000, 3000), (1920, 1080)),
            ((100, 1080), (100, 1080)),
            ((50, 2000), (100, 1080)),
        ] {
            let extent = choose_extent(&caps, drawable);
            assert_eq!((extent.width, extent.height), expected, "drawable {:?}", drawable);
        }
    }

    #[test]
    fn test_image_count_is_min_plus_one_within_max() {
        assert_eq!(choose_image_count(&capabilities(2, 4, UNDEFINED_EXTENT)), 3);
        assert_eq!(choose_image_count(&capabilities(3, 3, UNDEFINED_EXTENT)), 3);
        // Zero maximum means unbounded
        assert_eq!(choose_image_count(&capabilities(4, 0, UNDEFINED_EXTENT)), 5);
    }

    #[test]
    fn test_sharing_mode_follows_queue_families() {
        assert_eq!(choose_sharing(0, 0), (vk::SharingMode::EXCLUSIVE, vec![]));
        assert_eq!(choose_sharing(0, 2), (vk::SharingMode::CONCURRENT, vec![0, 2]));
    }

    #[test]
    fn test_plan_for_typical_surface() {
        let support = SurfaceSupport {
            capabilities: capabilities(2, 4, UNDEFINED_EXTENT),
            formats: vec![
                format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
                format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
                format(vk::Format::A2B10G10R10_UNORM_PACK32, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            ],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
        };
        let families = QueueFamilyIndices {
            graphics: Some(0),
            present: Some(0),
        };

        let plan = SwapchainPlan::new(&support, (800, 600), &families).unwrap();

        assert_eq!(plan.surface_format, support.formats[0]);
        assert_eq!(plan.present_mode, vk::PresentModeKHR::MAILBOX);
        assert_eq!(plan.image_count, 3);
        assert_eq!(plan.extent, vk::Extent2D { width: 800, height: 600 });
        assert_eq!(plan.sharing_mode, vk::SharingMode::EXCLUSIVE);
        assert_eq!(plan.pre_transform, vk::SurfaceTransformFlagsKHR::IDENTITY);
    }

    #[test]
    fn test_plan_requires_both_queue_families() {
        let support = SurfaceSupport {
            capabilities: capabilities(2, 4, UNDEFINED_EXTENT),
            formats: vec![PREFERRED_SURFACE_FORMAT],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        let families = QueueFamilyIndices {
            graphics: Some(0),
            present: None,
        };

        assert!(SwapchainPlan::new(&support, (800, 600), &families).is_err());
    }
}
