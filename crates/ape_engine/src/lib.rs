//! # Ape Engine
//!
//! Vulkan renderer core for the Ape Escape remake: a window adapter, GPU
//! device selection, a swapchain that rebuilds itself on resize, and a frame
//! scheduler keeping a fixed number of frames in flight while it draws a
//! scene of textured meshes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ape_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ApplicationConfig::default();
//!     let mut window = Window::new(&config.window.title, config.window.width, config.window.height)?;
//!     let mut renderer = VulkanRenderer::new(&mut window, &config.renderer)?;
//!
//!     let scene = Scene::load(&config.scene, &config.assets)?;
//!     for model in scene.models() {
//!         renderer.add_drawable(&model.mesh, &model.image, model.transform)?;
//!     }
//!
//!     while !window.should_close() {
//!         window.poll_events();
//!         renderer.draw_frame(&mut window, 0.0)?;
//!     }
//!     renderer.wait_idle()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

// Shared configuration
pub mod core;

pub mod foundation;
pub mod config;
pub mod assets;
pub mod scene;
pub mod render;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        assets::{ImageData, ObjLoader},
        core::config::{ApplicationConfig, AssetConfig, Config, SceneConfig, VulkanRendererConfig, WindowConfig},
        foundation::math::{Mat4, Vec3},
        render::{FrameOutcome, Mesh, SurfaceEvent, Vertex, VulkanRenderer, Window},
        scene::{Scene, SceneModel},
    };
}
