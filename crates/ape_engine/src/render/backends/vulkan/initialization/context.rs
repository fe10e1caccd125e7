//! Vulkan context management
//!
//! The context is created once at startup and owns the instance, the
//! presentation surface, the selected GPU and the logical device. Every other
//! GPU object borrows from it and must be dropped before it.

use ash::extensions::ext::DebugUtils;
use ash::{vk, Device, Entry, Instance};
use std::ffi::CString;
use std::os::raw::c_char;
use std::sync::Arc;
use thiserror::Error;

use super::debug::{self, DebugMessenger, DebugSink, SinkSlot};
use super::device::{LogicalDevice, PhysicalDeviceInfo};
use super::surface::{Surface, SurfaceQuery, SurfaceSupport};
use crate::render::window::Window;

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// No suitable memory type found for allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// No enumerated GPU meets the rendering requirements
    #[error("Failed to find a suitable GPU")]
    NoSuitableDevice,

    /// Image layout transition outside the supported table
    #[error("Unsupported layout transition: {old:?} -> {new:?}")]
    UnsupportedLayoutTransition {
        /// Layout the image is in
        old: vk::ImageLayout,
        /// Layout that was requested
        new: vk::ImageLayout,
    },

    /// No candidate format supports the required features
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Shader could not be loaded or was rejected by the device
    #[error("Shader error: {0}")]
    Shader(String),
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

/// Vulkan instance wrapper with RAII cleanup
pub struct VulkanInstance {
    /// Vulkan entry point
    pub entry: Entry,
    /// Vulkan instance handle
    pub instance: Instance,
    debug_messenger: Option<DebugMessenger>,
}

impl VulkanInstance {
    /// Create an instance with the extensions the window needs
    ///
    /// With `sink` present the validation layer is enabled and its messages are
    /// routed into the sink.
    pub fn new(window: &Window, app_name: &str, sink: Option<Arc<dyn DebugSink>>) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to load Vulkan: {:?}", e)))?;

        if sink.is_some() && !debug::validation_layer_available(&entry)? {
            return Err(VulkanError::InitializationFailed(
                "Validation layers requested, but not available (set enable_validation = false)".to_string(),
            ));
        }

        let app_name_cstr = CString::new(app_name)
            .map_err(|_| VulkanError::InitializationFailed("Application name contains a NUL byte".to_string()))?;
        let engine_name_cstr = CString::new("ApeEngine")
            .map_err(|_| VulkanError::InitializationFailed("Engine name contains a NUL byte".to_string()))?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name_cstr)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let required_extensions = window
            .required_instance_extensions()
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to get required extensions: {}", e)))?;
        let cstr_extensions = required_extensions
            .iter()
            .map(|ext| CString::new(ext.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| VulkanError::InitializationFailed("Extension name contains a NUL byte".to_string()))?;

        let mut extensions: Vec<*const c_char> = cstr_extensions.iter().map(|ext| ext.as_ptr()).collect();
        let mut layers: Vec<*const c_char> = Vec::new();
        if sink.is_some() {
            extensions.push(DebugUtils::name().as_ptr());
            layers.push(debug::VALIDATION_LAYER.as_ptr());
        }

        // Boxed before instance creation so the chained messenger info can point at it
        let sink_slot: Option<SinkSlot> = sink.map(Box::new);
        let mut instance_debug_info = sink_slot.as_ref().map(debug::messenger_create_info);

        let mut create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);
        if let Some(info) = instance_debug_info.as_mut() {
            create_info = create_info.push_next(info);
        }

        let instance = unsafe { entry.create_instance(&create_info, None).map_err(VulkanError::Api)? };
        log::info!("Vulkan instance created (validation: {})", sink_slot.is_some());

        let debug_messenger = match sink_slot {
            Some(slot) => match DebugMessenger::new(&entry, &instance, slot) {
                Ok(messenger) => Some(messenger),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            },
            None => None,
        };

        Ok(Self {
            entry,
            instance,
            debug_messenger,
        })
    }

    /// Whether a validation messenger is attached
    pub fn validation_enabled(&self) -> bool {
        self.debug_messenger.is_some()
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        // The messenger must go before the instance it was created from
        self.debug_messenger.take();
        unsafe {
            self.instance.destroy_instance(None);
        }
        log::debug!("Vulkan instance destroyed");
    }
}

/// Main Vulkan context that owns all core Vulkan resources
///
/// Fields drop in declaration order: device, then surface, then instance.
pub struct VulkanContext {
    device: LogicalDevice,
    physical_device: PhysicalDeviceInfo,
    surface: Surface,
    instance: VulkanInstance,
}

impl VulkanContext {
    /// Create instance, surface and device for the window
    pub fn new(window: &mut Window, app_name: &str, sink: Option<Arc<dyn DebugSink>>) -> VulkanResult<Self> {
        let instance = VulkanInstance::new(window, app_name, sink)?;
        let surface = Surface::new(&instance.entry, &instance.instance, window)?;
        let physical_device = PhysicalDeviceInfo::select(&instance.instance, &surface)?;
        let device = LogicalDevice::new(&instance.instance, &physical_device)?;

        Ok(Self {
            device,
            physical_device,
            surface,
            instance,
        })
    }

    /// Whether validation messages are being collected
    pub fn validation_enabled(&self) -> bool {
        self.instance.validation_enabled()
    }

    /// Get the physical device info
    pub fn physical_device(&self) -> &PhysicalDeviceInfo {
        &self.physical_device
    }

    /// Get the logical device
    pub fn device(&self) -> &LogicalDevice {
        &self.device
    }

    /// Get the raw Device handle
    pub fn raw_device(&self) -> &Device {
        &self.device.device
    }

    /// Get the swapchain loader
    pub fn swapchain_loader(&self) -> &ash::extensions::khr::Swapchain {
        &self.device.swapchain_loader
    }

    /// Get the surface handle
    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface.handle()
    }

    /// Get the graphics queue
    pub fn graphics_queue(&self) -> vk::Queue {
        self.device.graphics_queue
    }

    /// Get the present queue
    pub fn present_queue(&self) -> vk::Queue {
        self.device.present_queue
    }

    /// Get the graphics queue family index
    pub fn graphics_queue_family(&self) -> u32 {
        self.physical_device.graphics_family
    }

    /// Current surface capabilities, formats and present modes
    pub fn query_surface_support(&self) -> VulkanResult<SurfaceSupport> {
        self.surface.query_support(self.physical_device.device)
    }

    /// Support query for the selected device, detached from this borrow
    pub fn surface_query(&self) -> SurfaceQuery {
        self.surface.query_for(self.physical_device.device)
    }

    /// Format feature support for the selected device
    pub fn format_properties(&self, format: vk::Format) -> vk::FormatProperties {
        unsafe {
            self.instance
                .instance
                .get_physical_device_format_properties(self.physical_device.device, format)
        }
    }

    /// Block until every queue on the device is idle
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.device.device_wait_idle().map_err(VulkanError::Api) }
    }
}
