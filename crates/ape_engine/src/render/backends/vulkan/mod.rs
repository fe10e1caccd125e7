//! Vulkan backend implementation
//!
//! Organized into initialization, resources, rendering and state modules, with
//! [`VulkanRenderer`] tying them together.

/// Instance, validation messages, surface and device
pub mod initialization;

/// Buffers, images, textures, uniforms, descriptors and drawables
pub mod resources;

/// Commands, render pass, shaders and pipeline
pub mod rendering;

/// Swapchain lifecycle, synchronization and frame pacing
pub mod state;

/// Main Vulkan renderer implementation
pub mod renderer;

pub use renderer::VulkanRenderer;

pub use initialization::{DebugSink, LogSink, MessageSeverity, PhysicalDeviceInfo, VulkanContext, VulkanError, VulkanResult};
pub use rendering::{CommandPool, GraphicsPipeline, RenderPass, ShaderModule};
pub use resources::{Buffer, Drawable, Texture, UniformBufferObject};
pub use state::{AcquireOutcome, FrameOutcome, FrameScheduler, PresentOutcome, SwapchainManager, SwapchainPlan};
