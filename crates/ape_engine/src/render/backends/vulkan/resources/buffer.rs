//! Buffer management for vertex, index, uniform and staging data
//!
//! Host-visible buffers are written through a mapping. Device-local buffers are
//! never mapped; their contents arrive through a staging copy.

use ash::{vk, Device};
use std::ffi::c_void;

use crate::render::backends::vulkan::rendering::commands::CommandPool;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Memory properties for CPU-written buffers
pub const HOST_VISIBLE_COHERENT: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::from_raw(
    vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw() | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
);

/// Pick the first memory type allowed by `type_filter` that has all of `properties`
pub fn find_memory_type_index(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    memory_properties.memory_types[..memory_properties.memory_type_count as usize]
        .iter()
        .enumerate()
        .find(|(index, memory_type)| {
            type_filter & (1 << index) != 0 && memory_type.property_flags.contains(properties)
        })
        .map(|(index, _)| index as u32)
        .ok_or(VulkanError::NoSuitableMemoryType)
}

/// Allocate and bind memory satisfying `requirements` and `properties`
pub(crate) fn allocate_memory(
    device: &Device,
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    requirements: vk::MemoryRequirements,
    properties: vk::MemoryPropertyFlags,
) -> VulkanResult<vk::DeviceMemory> {
    let memory_type_index =
        find_memory_type_index(memory_properties, requirements.memory_type_bits, properties)?;

    let alloc_info = vk::MemoryAllocateInfo::builder()
        .allocation_size(requirements.size)
        .memory_type_index(memory_type_index);

    unsafe { device.allocate_memory(&alloc_info, None).map_err(VulkanError::Api) }
}

/// Buffer wrapper with memory management
pub struct Buffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
    properties: vk::MemoryPropertyFlags,
}

impl Buffer {
    /// Create a buffer and bind freshly allocated memory to it
    pub fn new(
        device: Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.create_buffer(&buffer_info, None).map_err(VulkanError::Api)? };
        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };

        let memory = match allocate_memory(&device, memory_properties, requirements, properties) {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        // From here on Drop releases both handles
        let buffer = Self {
            device,
            buffer,
            memory,
            size,
            properties,
        };
        unsafe {
            buffer
                .device
                .bind_buffer_memory(buffer.buffer, buffer.memory, 0)
                .map_err(VulkanError::Api)?;
        }

        log::debug!("Created buffer of {} bytes ({:?}, {:?})", size, usage, properties);
        Ok(buffer)
    }

    /// Create a device-local buffer filled with `data` through a staging copy
    pub fn device_local_with_data<T: bytemuck::Pod>(
        device: &Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        command_pool: &CommandPool,
        queue: vk::Queue,
        usage: vk::BufferUsageFlags,
        data: &[T],
    ) -> VulkanResult<Self> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        if bytes.is_empty() {
            return Err(VulkanError::InvalidOperation {
                reason: "Cannot create an empty device-local buffer".to_string(),
            });
        }
        let size = bytes.len() as vk::DeviceSize;

        let staging = Self::staging_with_bytes(device, memory_properties, bytes)?;
        let buffer = Self::new(
            device.clone(),
            memory_properties,
            size,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        command_pool.execute_one_shot(queue, |device, command_buffer| {
            let region = vk::BufferCopy { src_offset: 0, dst_offset: 0, size };
            unsafe {
                device.cmd_copy_buffer(command_buffer, staging.handle(), buffer.handle(), &[region]);
            }
        })?;

        Ok(buffer)
    }

    /// Host-visible transfer source holding `bytes`
    pub fn staging_with_bytes(
        device: &Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        bytes: &[u8],
    ) -> VulkanResult<Self> {
        let staging = Self::new(
            device.clone(),
            memory_properties,
            bytes.len() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_SRC,
            HOST_VISIBLE_COHERENT,
        )?;
        staging.write_bytes(bytes)?;
        Ok(staging)
    }

    /// Map the whole buffer
    ///
    /// Fails for memory that is not host-visible.
    pub fn map_memory(&self) -> VulkanResult<*mut c_void> {
        if !self.properties.contains(vk::MemoryPropertyFlags::HOST_VISIBLE) {
            return Err(VulkanError::InvalidOperation {
                reason: "Device-local buffers cannot be mapped".to_string(),
            });
        }

        unsafe {
            self.device
                .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::Api)
        }
    }

    /// Unmap memory
    pub fn unmap_memory(&self) {
        unsafe {
            self.device.unmap_memory(self.memory);
        }
    }

    /// Map, copy `bytes` to the start of the buffer, unmap
    pub fn write_bytes(&self, bytes: &[u8]) -> VulkanResult<()> {
        if bytes.len() as vk::DeviceSize > self.size {
            return Err(VulkanError::InvalidOperation {
                reason: format!("Write of {} bytes exceeds buffer size {}", bytes.len(), self.size),
            });
        }

        let data_ptr = self.map_memory()?;
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), data_ptr.cast::<u8>(), bytes.len());
        }
        self.unmap_memory();
        Ok(())
    }

    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Get size
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}
