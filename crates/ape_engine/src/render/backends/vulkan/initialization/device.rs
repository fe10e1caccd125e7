//! Physical device selection and logical device creation
//!
//! Selection is split into a pure part (queue family discovery, suitability,
//! scoring) that works on plain property structs, and the part that asks the
//! driver for those structs.

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::{vk, Device, Instance};
use std::collections::BTreeSet;
use std::ffi::CStr;

use super::context::{VulkanError, VulkanResult};
use super::surface::Surface;

/// Queue families used for rendering and presentation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// Family with graphics support
    pub graphics: Option<u32>,
    /// Family that can present to the surface
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    /// Scan queue families for graphics and present support
    ///
    /// Takes the first family that supports each, which may be the same family.
    pub fn find(
        families: &[vk::QueueFamilyProperties],
        mut supports_present: impl FnMut(u32) -> VulkanResult<bool>,
    ) -> VulkanResult<Self> {
        let mut indices = Self::default();

        for (index, family) in families.iter().enumerate() {
            let index = index as u32;

            if indices.graphics.is_none()
                && family.queue_count > 0
                && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
            {
                indices.graphics = Some(index);
            }

            if indices.present.is_none() && supports_present(index)? {
                indices.present = Some(index);
            }

            if indices.is_complete() {
                break;
            }
        }

        Ok(indices)
    }

    /// Both families were found
    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }

    /// Resolved `(graphics, present)` pair
    pub fn resolved(&self) -> VulkanResult<(u32, u32)> {
        match (self.graphics, self.present) {
            (Some(graphics), Some(present)) => Ok((graphics, present)),
            (None, _) => Err(VulkanError::InitializationFailed("No graphics queue family found".to_string())),
            (_, None) => Err(VulkanError::InitializationFailed("No present queue family found".to_string())),
        }
    }

    /// Distinct family indices, one queue is created per entry
    pub fn unique(&self) -> Vec<u32> {
        self.graphics
            .into_iter()
            .chain(self.present)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Rank a device: discrete GPUs first, then larger maximum texture size
///
/// A device without geometry shader support scores 0. It stays eligible but
/// loses to any device with a positive score.
pub fn device_score(properties: &vk::PhysicalDeviceProperties, features: &vk::PhysicalDeviceFeatures) -> u32 {
    if features.geometry_shader == vk::FALSE {
        return 0;
    }

    let discrete_bonus = if properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
        1000
    } else {
        0
    };
    discrete_bonus + properties.limits.max_image_dimension2_d
}

/// Everything selection needs to know about one physical device
#[derive(Debug, Clone, Default)]
pub struct DeviceCandidate {
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Supported device features
    pub features: vk::PhysicalDeviceFeatures,
    /// Graphics and present family discovery result
    pub queue_families: QueueFamilyIndices,
    /// `VK_KHR_swapchain` is available
    pub has_swapchain_extension: bool,
    /// Number of surface formats reported for the target surface
    pub surface_format_count: usize,
    /// Number of present modes reported for the target surface
    pub present_mode_count: usize,
}

impl DeviceCandidate {
    /// Minimum requirements for rendering to the surface
    pub fn is_suitable(&self) -> bool {
        self.queue_families.is_complete()
            && self.has_swapchain_extension
            && self.surface_format_count > 0
            && self.present_mode_count > 0
            && self.features.sampler_anisotropy == vk::TRUE
    }

    /// Ranking score, see [`device_score`]
    pub fn score(&self) -> u32 {
        device_score(&self.properties, &self.features)
    }

    /// Human-readable device name
    pub fn name(&self) -> String {
        unsafe { CStr::from_ptr(self.properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned()
    }
}

/// Index of the highest-scoring suitable candidate; ties go to the earliest
pub fn pick_best_candidate(candidates: &[DeviceCandidate]) -> Option<usize> {
    let mut best: Option<(usize, u32)> = None;

    for (index, candidate) in candidates.iter().enumerate() {
        if !candidate.is_suitable() {
            continue;
        }
        let score = candidate.score();
        if best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((index, score));
        }
    }

    best.map(|(index, _)| index)
}

/// Highest sample count usable for both color and depth framebuffers
pub fn max_usable_sample_count(limits: &vk::PhysicalDeviceLimits) -> vk::SampleCountFlags {
    let counts = limits.framebuffer_color_sample_counts & limits.framebuffer_depth_sample_counts;

    [
        vk::SampleCountFlags::TYPE_64,
        vk::SampleCountFlags::TYPE_32,
        vk::SampleCountFlags::TYPE_16,
        vk::SampleCountFlags::TYPE_8,
        vk::SampleCountFlags::TYPE_4,
        vk::SampleCountFlags::TYPE_2,
    ]
    .into_iter()
    .find(|&count| counts.contains(count))
    .unwrap_or(vk::SampleCountFlags::TYPE_1)
}

/// The selected physical device
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle
    pub device: vk::PhysicalDevice,
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Supported device features
    pub features: vk::PhysicalDeviceFeatures,
    /// Memory heaps and types
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Index of the graphics queue family
    pub graphics_family: u32,
    /// Index of the presentation queue family
    pub present_family: u32,
}

impl PhysicalDeviceInfo {
    /// Enumerate devices and pick the best suitable one for the surface
    pub fn select(instance: &Instance, surface: &Surface) -> VulkanResult<Self> {
        let devices = unsafe { instance.enumerate_physical_devices().map_err(VulkanError::Api)? };
        if devices.is_empty() {
            return Err(VulkanError::InitializationFailed(
                "Failed to find GPUs with Vulkan support".to_string(),
            ));
        }

        let candidates = devices
            .iter()
            .map(|&device| Self::describe(instance, device, surface))
            .collect::<VulkanResult<Vec<_>>>()?;

        for candidate in &candidates {
            log::debug!(
                "GPU candidate '{}': suitable={}, score={}",
                candidate.name(),
                candidate.is_suitable(),
                candidate.score()
            );
        }

        let index = pick_best_candidate(&candidates).ok_or(VulkanError::NoSuitableDevice)?;
        let candidate = &candidates[index];
        let (graphics_family, present_family) = candidate.queue_families.resolved()?;
        let device = devices[index];

        log::info!("Selected GPU: {}", candidate.name());

        Ok(Self {
            device,
            properties: candidate.properties,
            features: candidate.features,
            memory_properties: unsafe { instance.get_physical_device_memory_properties(device) },
            graphics_family,
            present_family,
        })
    }

    fn describe(instance: &Instance, device: vk::PhysicalDevice, surface: &Surface) -> VulkanResult<DeviceCandidate> {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let features = unsafe { instance.get_physical_device_features(device) };
        let families = unsafe { instance.get_physical_device_queue_family_properties(device) };

        let queue_families =
            QueueFamilyIndices::find(&families, |index| surface.supports_present(device, index))?;

        let extensions = unsafe {
            instance
                .enumerate_device_extension_properties(device)
                .map_err(VulkanError::Api)?
        };
        let has_swapchain_extension = extensions.iter().any(|available| {
            let name = unsafe { CStr::from_ptr(available.extension_name.as_ptr()) };
            name == SwapchainLoader::name()
        });

        // Surface queries are only valid once the swapchain extension is known to exist
        let (surface_format_count, present_mode_count) = if has_swapchain_extension {
            let support = surface.query_support(device)?;
            (support.formats.len(), support.present_modes.len())
        } else {
            (0, 0)
        };

        Ok(DeviceCandidate {
            properties,
            features,
            queue_families,
            has_swapchain_extension,
            surface_format_count,
            present_mode_count,
        })
    }

    /// Highest MSAA sample count the device supports for color and depth together
    pub fn max_sample_count(&self) -> vk::SampleCountFlags {
        max_usable_sample_count(&self.properties.limits)
    }

    /// Queue family pair used for swapchain sharing decisions
    pub fn queue_families(&self) -> QueueFamilyIndices {
        QueueFamilyIndices {
            graphics: Some(self.graphics_family),
            present: Some(self.present_family),
        }
    }
}

/// Logical device wrapper with RAII cleanup
pub struct LogicalDevice {
    /// Vulkan logical device handle
    pub device: Device,
    /// Graphics operations queue
    pub graphics_queue: vk::Queue,
    /// Surface presentation queue
    pub present_queue: vk::Queue,
    /// Swapchain extension loader
    pub swapchain_loader: SwapchainLoader,
}

impl LogicalDevice {
    /// Create the logical device with one queue per distinct family
    pub fn new(instance: &Instance, physical: &PhysicalDeviceInfo) -> VulkanResult<Self> {
        let priorities = [1.0];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = physical
            .queue_families()
            .unique()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let required_extensions = [SwapchainLoader::name().as_ptr()];

        let device_features = vk::PhysicalDeviceFeatures::builder()
            .sampler_anisotropy(true)
            .sample_rate_shading(physical.features.sample_rate_shading == vk::TRUE)
            .build();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&required_extensions)
            .enabled_features(&device_features);

        let device = unsafe {
            instance
                .create_device(physical.device, &create_info, None)
                .map_err(VulkanError::Api)?
        };

        let graphics_queue = unsafe { device.get_device_queue(physical.graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(physical.present_family, 0) };
        let swapchain_loader = SwapchainLoader::new(instance, &device);

        log::debug!(
            "Logical device created (graphics family {}, present family {})",
            physical.graphics_family,
            physical.present_family
        );

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
            swapchain_loader,
        })
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
        log::debug!("Logical device destroyed");
    }
}
