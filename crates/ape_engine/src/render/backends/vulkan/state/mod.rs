//! Vulkan state management: swapchain lifecycle, synchronization, frame pacing

/// Frame-in-flight scheduling
pub mod frame_scheduler;
/// Swapchain-sized attachments and framebuffers
pub mod render_targets;
/// Swapchain planning and the swapchain wrapper
pub mod swapchain;
/// Swapchain creation and recreation
pub mod swapchain_manager;
/// Fences, semaphores and frame slots
pub mod sync;

pub use frame_scheduler::{AcquireOutcome, FrameDevice, FrameOutcome, FrameScheduler, PresentOutcome};
pub use render_targets::{SwapchainTargets, TargetSpec};
pub use swapchain::{Swapchain, SwapchainPlan};
pub use swapchain_manager::{SwapchainBuilder, SwapchainManager, VulkanSwapchainBuilder};
pub use sync::{Fence, FrameSlot, FrameSync, Semaphore};
