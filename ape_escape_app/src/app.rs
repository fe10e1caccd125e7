//! The Ape Escape display loop
//!
//! Owns the window and the renderer, uploads the scene once, then draws until
//! the window closes or Escape is pressed.

use std::time::Instant;

use ape_engine::config::ConfigError;
use ape_engine::core::config::ApplicationConfig;
use ape_engine::render::{FrameOutcome, SurfaceEvent, VulkanError, VulkanRenderer, Window, WindowError};
use ape_engine::scene::{Scene, SceneError};
use glfw::Key;
use thiserror::Error;

/// Application-level failures
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Window or GLFW failure
    #[error("Window error: {0}")]
    Window(#[from] WindowError),

    /// Vulkan failure; always fatal
    #[error("Renderer error: {0}")]
    Renderer(#[from] VulkanError),

    /// Scene assets could not be loaded
    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),
}

/// Window plus renderer; the renderer is dropped first
pub struct ApeEscapeApp {
    renderer: VulkanRenderer,
    window: Window,
    start_time: Instant,
    frames: u64,
    skipped_frames: u64,
}

impl ApeEscapeApp {
    /// Open the window, bring up the renderer and upload the scene
    pub fn new(config: &ApplicationConfig) -> Result<Self, AppError> {
        let mut window = Window::new(&config.window.title, config.window.width, config.window.height)?;
        log::info!("Window created: {}x{}", config.window.width, config.window.height);

        let mut renderer = VulkanRenderer::new(&mut window, &config.renderer)?;

        let scene = Scene::load(&config.scene, &config.assets)?;
        for model in scene.models() {
            renderer.add_drawable(&model.mesh, &model.image, model.transform)?;
        }

        Ok(Self {
            renderer,
            window,
            start_time: Instant::now(),
            frames: 0,
            skipped_frames: 0,
        })
    }

    /// Draw until asked to quit, then drain the GPU
    pub fn run(&mut self) -> Result<(), AppError> {
        log::info!("Entering frame loop with {} drawables", self.renderer.drawable_count());

        'frames: while !self.window.should_close() {
            for event in self.window.poll_events() {
                match event {
                    SurfaceEvent::Quit => break 'frames,
                    SurfaceEvent::Resized { width, height } => {
                        log::debug!("Framebuffer resized to {}x{}", width, height);
                        self.renderer.notify_resized();
                    }
                    SurfaceEvent::KeyPressed(Key::F1) => self.log_stats(),
                    SurfaceEvent::KeyPressed(_) => {}
                }
            }

            let elapsed = self.start_time.elapsed().as_secs_f32();
            match self.renderer.draw_frame(&mut self.window, elapsed)? {
                FrameOutcome::Presented { .. } => self.frames += 1,
                FrameOutcome::Skipped => self.skipped_frames += 1,
            }
        }

        self.renderer.wait_idle()?;
        self.log_stats();
        Ok(())
    }

    fn log_stats(&self) {
        let seconds = self.start_time.elapsed().as_secs_f64();
        log::info!(
            "{} frames presented, {} skipped, {:.1} fps average",
            self.frames,
            self.skipped_frames,
            self.frames as f64 / seconds.max(f64::EPSILON)
        );
    }

    /// Validation errors seen so far, when validation is enabled
    pub fn validation_error_count(&self) -> Option<usize> {
        self.renderer.validation_error_count()
    }
}
