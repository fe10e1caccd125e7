//! Window management using GLFW
//!
//! Owns the native window and turns GLFW events into the few signals the
//! renderer cares about: quit requests, key presses and drawable resizes.

use ash::vk;
use glfw::{Action, Key, WindowEvent};
use thiserror::Error;

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// GLFW could not be initialized
    #[error("GLFW initialization failed")]
    InitializationFailed,

    /// The native window could not be created
    #[error("Window creation failed")]
    CreationFailed,

    /// GLFW reported an error
    #[error("GLFW error: {0}")]
    GlfwError(String),
}

/// Result type for window operations
pub type WindowResult<T> = Result<T, WindowError>;

/// Signals produced by the window for the frame loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// The user asked to close the window
    Quit,
    /// A key was pressed
    KeyPressed(Key),
    /// The drawable area changed size (in pixels)
    Resized {
        /// New drawable width
        width: u32,
        /// New drawable height
        height: u32,
    },
}

/// Map a raw GLFW event to a [`SurfaceEvent`]
///
/// Escape is treated as a quit request. Events the renderer has no use for map to `None`.
pub fn translate_event(event: &WindowEvent) -> Option<SurfaceEvent> {
    match *event {
        WindowEvent::Close => Some(SurfaceEvent::Quit),
        WindowEvent::Key(Key::Escape, _, Action::Press, _) => Some(SurfaceEvent::Quit),
        WindowEvent::Key(key, _, Action::Press, _) => Some(SurfaceEvent::KeyPressed(key)),
        WindowEvent::FramebufferSize(width, height) => Some(SurfaceEvent::Resized {
            width: width.max(0) as u32,
            height: height.max(0) as u32,
        }),
        _ => None,
    }
}

/// Something with a drawable area that can block for window events
///
/// Swapchain recreation uses this to wait out a minimized window.
pub trait DrawableSurface {
    /// Current drawable size in pixels
    fn drawable_size(&self) -> (u32, u32);

    /// Block until at least one window event arrives
    fn wait_events(&mut self);

    /// Whether the user has asked for the surface to go away
    fn close_requested(&self) -> bool {
        false
    }
}

/// Block until the surface has a non-zero drawable area and return it
///
/// Returns `None` when a close is requested before the area becomes non-zero.
pub fn wait_for_drawable_area<S: DrawableSurface + ?Sized>(surface: &mut S) -> Option<(u32, u32)> {
    let mut size = surface.drawable_size();
    if size.0 == 0 || size.1 == 0 {
        log::info!("Window minimized, waiting for a drawable area");
    }
    while size.0 == 0 || size.1 == 0 {
        if surface.close_requested() {
            log::info!("Close requested while minimized");
            return None;
        }
        surface.wait_events();
        size = surface.drawable_size();
    }
    Some(size)
}

/// GLFW window wrapper with proper resource management
pub struct Window {
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, WindowEvent)>,
    glfw: glfw::Glfw,
}

impl Window {
    /// Create a resizable window with no client API, ready for a Vulkan surface
    pub fn new(title: &str, width: u32, height: u32) -> WindowResult<Self> {
        let mut glfw = glfw::init(glfw::fail_on_errors)
            .map_err(|_| WindowError::InitializationFailed)?;

        if !glfw.vulkan_supported() {
            return Err(WindowError::GlfwError("Vulkan loader not found".to_string()));
        }

        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(true));

        let (mut window, events) = glfw
            .create_window(width, height, title, glfw::WindowMode::Windowed)
            .ok_or(WindowError::CreationFailed)?;

        window.set_key_polling(true);
        window.set_close_polling(true);
        window.set_framebuffer_size_polling(true);

        log::info!("Created window '{}' ({}x{})", title, width, height);

        Ok(Self {
            window,
            events,
            glfw,
        })
    }

    /// Whether the window has been asked to close
    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    /// Poll pending window events without blocking
    pub fn poll_events(&mut self) -> Vec<SurfaceEvent> {
        self.glfw.poll_events();
        glfw::flush_messages(&self.events)
            .filter_map(|(_, event)| translate_event(&event))
            .collect()
    }

    /// Current framebuffer size in pixels
    pub fn framebuffer_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_framebuffer_size();
        (width.max(0) as u32, height.max(0) as u32)
    }

    /// Instance extensions GLFW needs to create a surface on this platform
    pub fn required_instance_extensions(&self) -> WindowResult<Vec<String>> {
        self.glfw
            .get_required_instance_extensions()
            .ok_or_else(|| WindowError::GlfwError("Failed to get required extensions".to_string()))
    }

    /// Create a Vulkan surface for this window
    pub fn create_vulkan_surface(&mut self, instance: vk::Instance) -> WindowResult<vk::SurfaceKHR> {
        let mut surface = vk::SurfaceKHR::null();
        let result = self.window.create_window_surface(instance, std::ptr::null(), &mut surface);

        if result == vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(WindowError::GlfwError(format!("Failed to create Vulkan surface: {:?}", result)))
        }
    }
}

impl DrawableSurface for Window {
    fn drawable_size(&self) -> (u32, u32) {
        self.framebuffer_size()
    }

    fn wait_events(&mut self) {
        self.glfw.wait_events();
    }

    fn close_requested(&self) -> bool {
        self.should_close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct MinimizedSurface {
        sizes: VecDeque<(u32, u32)>,
        waits: usize,
        close_after_waits: Option<usize>,
    }

    impl DrawableSurface for MinimizedSurface {
        fn drawable_size(&self) -> (u32, u32) {
            *self.sizes.front().unwrap_or(&(0, 0))
        }

        fn wait_events(&mut self) {
            self.waits += 1;
            self.sizes.pop_front();
        }

        fn close_requested(&self) -> bool {
            self.close_after_waits.is_some_and(|waits| self.waits >= waits)
        }
    }

    #[test]
    fn test_wait_blocks_until_area_is_nonzero() {
        let mut surface = MinimizedSurface {
            sizes: VecDeque::from([(0, 0), (0, 0), (640, 480)]),
            waits: 0,
            close_after_waits: None,
        };

        assert_eq!(wait_for_drawable_area(&mut surface), Some((640, 480)));
        assert_eq!(surface.waits, 2);
    }

    #[test]
    fn test_close_while_minimized_stops_waiting() {
        let mut surface = MinimizedSurface {
            sizes: VecDeque::from([(0, 0), (0, 0), (0, 0), (640, 480)]),
            waits: 0,
            close_after_waits: Some(1),
        };

        assert_eq!(wait_for_drawable_area(&mut surface), None);
        assert_eq!(surface.waits, 1);
    }

    #[test]
    fn test_close_request_does_not_hide_a_visible_surface() {
        let mut surface = MinimizedSurface {
            sizes: VecDeque::from([(800, 600)]),
            waits: 0,
            close_after_waits: Some(0),
        };

        assert_eq!(wait_for_drawable_area(&mut surface), Some((800, 600)));
    }

    #[test]
    fn test_wait_returns_immediately_when_visible() {
        let mut surface = MinimizedSurface {
            sizes: VecDeque::from([(800, 600)]),
            waits: 0,
            close_after_waits: None,
        };

        assert_eq!(wait_for_drawable_area(&mut surface), Some((800, 600)));
        assert_eq!(surface.waits, 0);
    }

    #[test]
    fn test_escape_and_close_request_quit() {
        let escape = WindowEvent::Key(Key::Escape, 0, Action::Press, glfw::Modifiers::empty());
        assert_eq!(translate_event(&escape), Some(SurfaceEvent::Quit));
        assert_eq!(translate_event(&WindowEvent::Close), Some(SurfaceEvent::Quit));
    }

    #[test]
    fn test_key_release_is_ignored() {
        let release = WindowEvent::Key(Key::A, 0, Action::Release, glfw::Modifiers::empty());
        assert_eq!(translate_event(&release), None);

        let press = WindowEvent::Key(Key::A, 0, Action::Press, glfw::Modifiers::empty());
        assert_eq!(translate_event(&press), Some(SurfaceEvent::KeyPressed(Key::A)));
    }

    #[test]
    fn test_framebuffer_resize_is_reported_in_pixels() {
        let event = WindowEvent::FramebufferSize(1280, 720);
        assert_eq!(
            translate_event(&event),
            Some(SurfaceEvent::Resized { width: 1280, height: 720 })
        );
    }
}
