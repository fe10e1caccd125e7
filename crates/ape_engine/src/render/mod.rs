//! # Rendering System
//!
//! A window adapter, backend-agnostic mesh data, and the Vulkan backend that
//! draws textured meshes with frames in flight.

/// Window creation, events and drawable size
pub mod window;

/// Vertices, meshes and structural deduplication
pub mod mesh;

/// Graphics backend implementations
pub mod backends;

pub use backends::vulkan::{FrameOutcome, VulkanError, VulkanRenderer, VulkanResult};
pub use mesh::{Mesh, MeshBuilder, Vertex};
pub use window::{DrawableSurface, SurfaceEvent, Window, WindowError};
