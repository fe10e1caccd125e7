//! Vulkan surface management
//!
//! Owns the presentation surface and answers the capability questions that
//! device selection and swapchain planning ask about it.

use ash::extensions::khr;
use ash::{vk, Entry, Instance};

use super::context::{VulkanError, VulkanResult};
use crate::render::window::Window;

/// Surface capabilities, formats and present modes reported for one device
#[derive(Debug, Clone, Default)]
pub struct SurfaceSupport {
    /// Image count, extent and transform limits
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported format / color space pairs
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported presentation modes
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    /// Whether a swapchain can be built at all
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Vulkan surface wrapper, destroyed on drop
///
/// Must be dropped after any swapchain built on it and before the instance.
pub struct Surface {
    loader: khr::Surface,
    surface: vk::SurfaceKHR,
}

impl Surface {
    /// Create a surface for the window
    pub fn new(entry: &Entry, instance: &Instance, window: &mut Window) -> VulkanResult<Self> {
        let loader = khr::Surface::new(entry, instance);
        let surface = window
            .create_vulkan_surface(instance.handle())
            .map_err(|e| VulkanError::InitializationFailed(format!("Surface creation: {}", e)))?;
        log::debug!("Window surface created");

        Ok(Self { loader, surface })
    }

    /// Get the underlying surface handle
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Whether the queue family can present to this surface
    pub fn supports_present(&self, physical_device: vk::PhysicalDevice, family: u32) -> VulkanResult<bool> {
        unsafe {
            self.loader
                .get_physical_device_surface_support(physical_device, family, self.surface)
                .map_err(VulkanError::Api)
        }
    }

    /// Query everything the swapchain planner needs for this device
    pub fn query_support(&self, physical_device: vk::PhysicalDevice) -> VulkanResult<SurfaceSupport> {
        self.query_for(physical_device).query()
    }

    /// Support query for one device that can outlive this borrow
    ///
    /// The surface itself must still outlive every use of the query.
    pub fn query_for(&self, physical_device: vk::PhysicalDevice) -> SurfaceQuery {
        SurfaceQuery {
            loader: self.loader.clone(),
            surface: self.surface,
            physical_device,
        }
    }
}

/// Re-runnable surface support query for the selected device
#[derive(Clone)]
pub struct SurfaceQuery {
    loader: khr::Surface,
    surface: vk::SurfaceKHR,
    physical_device: vk::PhysicalDevice,
}

impl SurfaceQuery {
    /// Surface the query targets
    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Current capabilities, formats and present modes
    pub fn query(&self) -> VulkanResult<SurfaceSupport> {
        unsafe {
            Ok(SurfaceSupport {
                capabilities: self
                    .loader
                    .get_physical_device_surface_capabilities(self.physical_device, self.surface)
                    .map_err(VulkanError::Api)?,
                formats: self
                    .loader
                    .get_physical_device_surface_formats(self.physical_device, self.surface)
                    .map_err(VulkanError::Api)?,
                present_modes: self
                    .loader
                    .get_physical_device_surface_present_modes(self.physical_device, self.surface)
                    .map_err(VulkanError::Api)?,
            })
        }
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_surface(self.surface, None);
        }
        log::debug!("Window surface destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_support_needs_formats_and_present_modes() {
        let mut support = SurfaceSupport::default();
        assert!(!support.is_adequate());

        support.formats.push(vk::SurfaceFormatKHR::default());
        assert!(!support.is_adequate());

        support.present_modes.push(vk::PresentModeKHR::FIFO);
        assert!(support.is_adequate());
    }
}
