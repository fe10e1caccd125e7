//! Vulkan initialization: instance, validation messages, surface and device

pub mod context;
pub mod debug;
pub mod device;
pub mod surface;

pub use context::*;
pub use debug::{DebugMessenger, DebugSink, LogSink, MessageSeverity};
pub use device::*;
pub use surface::*;
