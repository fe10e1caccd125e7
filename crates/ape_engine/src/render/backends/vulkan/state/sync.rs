//! Vulkan synchronization primitives for GPU/CPU coordination
//!
//! Each frame slot owns an "image available" semaphore, a "render finished"
//! semaphore and an in-flight fence. The fence starts signaled so the first
//! wait on a fresh slot returns immediately.

use ash::{vk, Device};

use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Fence wait timeout, effectively forever
pub const FENCE_TIMEOUT: u64 = u64::MAX;

/// Semaphore wrapper with RAII cleanup
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a new binary semaphore
    pub fn new(device: Device) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();
        let semaphore = unsafe { device.create_semaphore(&create_info, None).map_err(VulkanError::Api)? };
        Ok(Self { device, semaphore })
    }

    /// Get the semaphore handle
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Fence wrapper with RAII cleanup
pub struct Fence {
    device: Device,
    fence: vk::Fence,
}

impl Fence {
    /// Create a new fence
    pub fn new(device: Device, signaled: bool) -> VulkanResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::builder().flags(flags);
        let fence = unsafe { device.create_fence(&create_info, None).map_err(VulkanError::Api)? };
        Ok(Self { device, fence })
    }

    /// Block until the fence is signaled
    pub fn wait(&self, timeout: u64) -> VulkanResult<()> {
        unsafe {
            self.device
                .wait_for_fences(&[self.fence], true, timeout)
                .map_err(VulkanError::Api)
        }
    }

    /// Return the fence to the unsignaled state
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe { self.device.reset_fences(&[self.fence]).map_err(VulkanError::Api) }
    }

    /// Get the fence handle
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
        }
    }
}

/// Synchronization objects of one frame slot
pub struct FrameSync {
    /// Signaled when the acquired swapchain image may be rendered to
    pub image_available: Semaphore,
    /// Signaled when the slot's commands finish, waited on by present
    pub render_finished: Semaphore,
    /// Signaled when the slot's submission completes on the GPU
    pub in_flight: Fence,
}

impl FrameSync {
    /// Create the slot's semaphores and a signaled fence
    pub fn new(device: Device) -> VulkanResult<Self> {
        let image_available = Semaphore::new(device.clone())?;
        let render_finished = Semaphore::new(device.clone())?;
        let in_flight = Fence::new(device, true)?;

        Ok(Self {
            image_available,
            render_finished,
            in_flight,
        })
    }
}

/// A frame slot: its command buffer plus its synchronization
pub struct FrameSlot {
    /// Primary command buffer re-recorded every time the slot is used
    pub command_buffer: vk::CommandBuffer,
    /// Semaphores and fence of the slot
    pub sync: FrameSync,
}

impl FrameSlot {
    /// One slot per allocated command buffer
    pub fn create_all(device: &Device, command_buffers: Vec<vk::CommandBuffer>) -> VulkanResult<Vec<Self>> {
        command_buffers
            .into_iter()
            .map(|command_buffer| {
                Ok(Self {
                    command_buffer,
                    sync: FrameSync::new(device.clone())?,
                })
            })
            .collect()
    }
}
