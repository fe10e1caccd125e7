//! Swapchain lifecycle: initial build and recreation
//!
//! The manager owns whatever a [`SwapchainBuilder`] produces and rebuilds it
//! when the surface changes. Recreation always drains the device first, then
//! releases every derived object before building replacements. The surface
//! format must stay the one the render pass was built for.

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::{vk, Device};

use super::render_targets::{SwapchainTargets, TargetSpec};
use super::swapchain::{Swapchain, SwapchainPlan};
use crate::render::backends::vulkan::initialization::{QueueFamilyIndices, SurfaceQuery, SurfaceSupport};
use crate::render::backends::vulkan::rendering::commands::CommandPool;
use crate::render::backends::vulkan::{VulkanContext, VulkanError, VulkanResult};
use crate::render::window::{wait_for_drawable_area, DrawableSurface};

/// Source of surface information and builder of swapchain-sized objects
pub trait SwapchainBuilder {
    /// Objects rebuilt together on every recreation
    type Targets;

    /// Block until no submitted work can reference the current targets
    fn wait_idle(&mut self) -> VulkanResult<()>;

    /// Current surface capabilities, formats and present modes
    fn query_support(&mut self) -> VulkanResult<SurfaceSupport>;

    /// Graphics and present queue families
    fn queue_families(&self) -> QueueFamilyIndices;

    /// Create the targets described by `plan`
    fn build(&mut self, plan: &SwapchainPlan) -> VulkanResult<Self::Targets>;
}

/// Owns the current swapchain targets and rebuilds them on demand
pub struct SwapchainManager<B: SwapchainBuilder> {
    targets: Option<B::Targets>,
    plan: SwapchainPlan,
    builder: B,
    recreations: u32,
}

impl<B: SwapchainBuilder> SwapchainManager<B> {
    /// Build the first set of targets for the surface's drawable size
    pub fn new<S: DrawableSurface + ?Sized>(mut builder: B, surface: &mut S) -> VulkanResult<Self> {
        let drawable = wait_for_drawable_area(surface).ok_or_else(|| {
            VulkanError::InitializationFailed("Window closed before it had a drawable area".to_string())
        })?;
        let plan = Self::plan_for(&mut builder, drawable)?;
        let targets = builder.build(&plan)?;
        log::info!(
            "Swapchain built: {}x{}, {} images, {:?}",
            plan.extent.width,
            plan.extent.height,
            plan.image_count,
            plan.present_mode
        );

        Ok(Self {
            targets: Some(targets),
            plan,
            builder,
            recreations: 0,
        })
    }

    /// Rebuild the targets for the surface's current state
    ///
    /// Blocks while the drawable area is zero, then waits for the device to go
    /// idle before anything is released. Returns `false` without touching the
    /// current targets when the surface is closed while minimized.
    pub fn recreate<S: DrawableSurface + ?Sized>(&mut self, surface: &mut S) -> VulkanResult<bool> {
        let Some(drawable) = wait_for_drawable_area(surface) else {
            log::info!("Swapchain rebuild abandoned, surface is closing");
            return Ok(false);
        };
        self.builder.wait_idle()?;

        self.targets = None;

        let plan = Self::plan_for(&mut self.builder, drawable)?;
        if plan.surface_format.format != self.plan.surface_format.format {
            return Err(VulkanError::UnsupportedFormat(format!(
                "Surface format changed from {:?} to {:?}; the render pass cannot follow",
                self.plan.surface_format.format, plan.surface_format.format
            )));
        }
        self.targets = Some(self.builder.build(&plan)?);
        self.plan = plan;
        self.recreations += 1;

        log::info!(
            "Swapchain rebuilt: {}x{}, {} images",
            self.plan.extent.width,
            self.plan.extent.height,
            self.plan.image_count
        );
        Ok(true)
    }

    fn plan_for(builder: &mut B, drawable: (u32, u32)) -> VulkanResult<SwapchainPlan> {
        let support = builder.query_support()?;
        SwapchainPlan::new(&support, drawable, &builder.queue_families())
    }

    /// Current targets
    pub fn targets(&self) -> VulkanResult<&B::Targets> {
        self.targets.as_ref().ok_or_else(|| VulkanError::InvalidOperation {
            reason: "Swapchain targets are missing after a failed rebuild".to_string(),
        })
    }

    /// Plan the current targets were built from
    pub fn plan(&self) -> &SwapchainPlan {
        &self.plan
    }

    /// Number of completed recreations
    pub fn recreations(&self) -> u32 {
        self.recreations
    }
}

/// Builds [`SwapchainTargets`] on the real device
pub struct VulkanSwapchainBuilder {
    setup_pool: CommandPool,
    device: Device,
    loader: SwapchainLoader,
    surface: SurfaceQuery,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    families: QueueFamilyIndices,
    queue: vk::Queue,
    spec: TargetSpec,
}

impl VulkanSwapchainBuilder {
    /// Capture what rebuilding needs from the context
    pub fn new(context: &VulkanContext, spec: TargetSpec) -> VulkanResult<Self> {
        let device = context.raw_device().clone();
        Ok(Self {
            setup_pool: CommandPool::new(device.clone(), context.graphics_queue_family())?,
            device,
            loader: context.swapchain_loader().clone(),
            surface: context.surface_query(),
            memory_properties: context.physical_device().memory_properties,
            families: context.physical_device().queue_families(),
            queue: context.graphics_queue(),
            spec,
        })
    }
}

impl SwapchainBuilder for VulkanSwapchainBuilder {
    type Targets = SwapchainTargets;

    fn wait_idle(&mut self) -> VulkanResult<()> {
        unsafe { self.device.device_wait_idle().map_err(VulkanError::Api) }
    }

    fn query_support(&mut self) -> VulkanResult<SurfaceSupport> {
        self.surface.query()
    }

    fn queue_families(&self) -> QueueFamilyIndices {
        self.families
    }

    fn build(&mut self, plan: &SwapchainPlan) -> VulkanResult<SwapchainTargets> {
        let swapchain = Swapchain::new(self.device.clone(), self.loader.clone(), self.surface.surface(), plan)?;
        SwapchainTargets::new(
            &self.device,
            &self.memory_properties,
            &self.setup_pool,
            self.queue,
            swapchain,
            &self.spec,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Tracker {
        created: usize,
        destroyed: usize,
        events: Vec<&'static str>,
    }

    impl Tracker {
        fn live(&self) -> usize {
            self.created - self.destroyed
        }
    }

    struct Tracked(Rc<RefCell<Tracker>>);

    impl Tracked {
        fn new(tracker: &Rc<RefCell<Tracker>>) -> Self {
            tracker.borrow_mut().created += 1;
            Self(Rc::clone(tracker))
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            let mut tracker = self.0.borrow_mut();
            tracker.destroyed += 1;
            if tracker.events.last() != Some(&"destroy") {
                tracker.events.push("destroy");
            }
        }
    }

    struct MockTargets {
        extent: vk::Extent2D,
        images: Vec<Tracked>,
        views: Vec<Tracked>,
        framebuffers: Vec<Tracked>,
        swapchain: Tracked,
    }

    struct MockBuilder {
        tracker: Rc<RefCell<Tracker>>,
        support: SurfaceSupport,
    }

    impl SwapchainBuilder for MockBuilder {
        type Targets = MockTargets;

        fn wait_idle(&mut self) -> VulkanResult<()> {
            self.tracker.borrow_mut().events.push("wait_idle");
            Ok(())
        }

        fn query_support(&mut self) -> VulkanResult<SurfaceSupport> {
            self.tracker.borrow_mut().events.push("query");
            Ok(self.support.clone())
        }

        fn queue_families(&self) -> QueueFamilyIndices {
            QueueFamilyIndices {
                graphics: Some(0),
                present: Some(0),
            }
        }

        fn build(&mut self, plan: &SwapchainPlan) -> VulkanResult<MockTargets> {
            self.tracker.borrow_mut().events.push("build");
            let count = plan.image_count as usize;
            let make = |n: usize| (0..n).map(|_| Tracked::new(&self.tracker)).collect::<Vec<_>>();
            Ok(MockTargets {
                extent: plan.extent,
                swapchain: Tracked::new(&self.tracker),
                images: make(count),
                views: make(count),
                framebuffers: make(count),
            })
        }
    }

    struct MockSurface {
        sizes: Vec<(u32, u32)>,
        waits: usize,
        closing: bool,
    }

    impl MockSurface {
        fn visible() -> Self {
            Self {
                sizes: vec![(800, 600)],
                waits: 0,
                closing: false,
            }
        }
    }

    impl DrawableSurface for MockSurface {
        fn drawable_size(&self) -> (u32, u32) {
            self.sizes[self.waits.min(self.sizes.len() - 1)]
        }

        fn wait_events(&mut self) {
            self.waits += 1;
        }

        fn close_requested(&self) -> bool {
            self.closing
        }
    }

    fn support(min_images: u32, max_images: u32) -> SurfaceSupport {
        SurfaceSupport {
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: min_images,
                max_image_count: max_images,
                current_extent: vk::Extent2D {
                    width: u32::MAX,
                    height: u32::MAX,
                },
                min_image_extent: vk::Extent2D { width: 1, height: 1 },
                max_image_extent: vk::Extent2D {
                    width: 4096,
                    height: 4096,
                },
                ..Default::default()
            },
            formats: vec![
                vk::SurfaceFormatKHR {
                    format: vk::Format::R8G8B8A8_UNORM,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
                vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_UNORM,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
                vk::SurfaceFormatKHR {
                    format: vk::Format::R16G16B16A16_SFLOAT,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
            ],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
        }
    }

    fn manager(
        tracker: &Rc<RefCell<Tracker>>,
        surface: &mut MockSurface,
    ) -> SwapchainManager<MockBuilder> {
        let builder = MockBuilder {
            tracker: Rc::clone(tracker),
            support: support(2, 4),
        };
        SwapchainManager::new(builder, surface).unwrap()
    }

    #[test]
    fn test_initial_build_follows_plan() {
        let tracker = Rc::new(RefCell::new(Tracker::default()));
        let mut surface = MockSurface::visible();
        let manager = manager(&tracker, &mut surface);

        let plan = manager.plan();
        assert_eq!(plan.present_mode, vk::PresentModeKHR::MAILBOX);
        assert_eq!(plan.image_count, 3);
        assert_eq!(plan.surface_format.format, vk::Format::R8G8B8A8_UNORM);

        let targets = manager.targets().unwrap();
        assert_eq!(targets.images.len(), 3);
        assert_eq!(targets.views.len(), 3);
        assert_eq!(targets.framebuffers.len(), 3);
        assert_eq!(tracker.borrow().live(), 10);
    }

    #[test]
    fn test_recreate_releases_exactly_what_it_built() {
        let tracker = Rc::new(RefCell::new(Tracker::default()));
        let mut surface = MockSurface::visible();
        let mut manager = manager(&tracker, &mut surface);

        // The surface now allows more images
        manager.builder.support = support(4, 0);
        assert!(manager.recreate(&mut surface).unwrap());

        let targets = manager.targets().unwrap();
        assert_eq!(targets.images.len(), 5);
        assert_eq!(targets.views.len(), 5);
        assert_eq!(targets.framebuffers.len(), 5);
        assert_eq!(manager.recreations(), 1);

        {
            let tracker = tracker.borrow();
            assert_eq!(tracker.destroyed, 10);
            assert_eq!(tracker.live(), 16);
        }

        drop(manager);
        let tracker = tracker.borrow();
        assert_eq!(tracker.created, tracker.destroyed);
    }

    #[test]
    fn test_recreate_waits_for_idle_before_releasing() {
        let tracker = Rc::new(RefCell::new(Tracker::default()));
        let mut surface = MockSurface::visible();
        let mut manager = manager(&tracker, &mut surface);
        tracker.borrow_mut().events.clear();

        manager.recreate(&mut surface).unwrap();

        assert_eq!(
            tracker.borrow().events,
            vec!["wait_idle", "destroy", "query", "build"]
        );
    }

    #[test]
    fn test_recreate_blocks_while_minimized() {
        let tracker = Rc::new(RefCell::new(Tracker::default()));
        let mut surface = MockSurface::visible();
        let mut manager = manager(&tracker, &mut surface);

        let mut minimized = MockSurface {
            sizes: vec![(0, 0), (0, 0), (1024, 768)],
            waits: 0,
            closing: false,
        };
        manager.recreate(&mut minimized).unwrap();

        assert_eq!(minimized.waits, 2);
        assert_eq!(manager.targets().unwrap().extent, vk::Extent2D { width: 1024, height: 768 });
    }

    #[test]
    fn test_close_while_minimized_keeps_current_targets() {
        let tracker = Rc::new(RefCell::new(Tracker::default()));
        let mut surface = MockSurface::visible();
        let mut manager = manager(&tracker, &mut surface);
        tracker.borrow_mut().events.clear();

        let mut closing = MockSurface {
            sizes: vec![(0, 0)],
            waits: 0,
            closing: true,
        };
        let rebuilt = manager.recreate(&mut closing).unwrap();

        assert!(!rebuilt);
        assert_eq!(closing.waits, 0);
        assert!(tracker.borrow().events.is_empty());
        assert_eq!(tracker.borrow().live(), 10);
        assert_eq!(manager.recreations(), 0);
        assert!(manager.targets().is_ok());
    }

    #[test]
    fn test_initial_build_fails_when_closed_while_minimized() {
        let tracker = Rc::new(RefCell::new(Tracker::default()));
        let builder = MockBuilder {
            tracker: Rc::clone(&tracker),
            support: support(2, 4),
        };
        let mut closing = MockSurface {
            sizes: vec![(0, 0)],
            waits: 0,
            closing: true,
        };

        let result = SwapchainManager::new(builder, &mut closing);

        assert!(matches!(result, Err(VulkanError::InitializationFailed(_))));
        assert_eq!(tracker.borrow().created, 0);
    }

    #[test]
    fn test_changed_surface_format_is_rejected() {
        let tracker = Rc::new(RefCell::new(Tracker::default()));
        let mut surface = MockSurface::visible();
        let mut manager = manager(&tracker, &mut surface);

        let mut changed = support(2, 4);
        changed.formats.remove(0);
        manager.builder.support = changed;

        let result = manager.recreate(&mut surface);

        assert!(matches!(result, Err(VulkanError::UnsupportedFormat(_))));
        assert!(manager.targets().is_err());
        let tracker = tracker.borrow();
        assert_eq!(tracker.created, tracker.destroyed);
    }
}
