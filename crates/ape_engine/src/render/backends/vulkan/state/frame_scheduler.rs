//! Frame-in-flight scheduling
//!
//! Slots rotate modulo the frames-in-flight count. A slot is Idle once its
//! fence has been waited on, Recording while its command buffer is rebuilt,
//! and Submitted until a later wait on the same fence. Swapchain invalidation
//! is an outcome here, never an error.

use ash::vk;

use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Result of asking the swapchain for the next image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image can be rendered to
    Ready {
        /// Swapchain image index
        image_index: u32,
        /// The swapchain still works but no longer matches the surface
        suboptimal: bool,
    },
    /// The swapchain can no longer be used
    OutOfDate,
}

/// Result of queueing an image for presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// Presented normally
    Presented,
    /// Presented, but the swapchain should be rebuilt
    Suboptimal,
    /// Not presentable; the swapchain must be rebuilt
    OutOfDate,
}

/// What one call to [`FrameScheduler::draw_frame`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame was submitted and presented
    Presented {
        /// The swapchain was rebuilt after presenting
        swapchain_rebuilt: bool,
    },
    /// Acquire found the swapchain out of date; it was rebuilt and nothing was submitted
    Skipped,
}

/// Map the raw acquire result onto an outcome, keeping real failures as errors
pub fn classify_acquire(result: Result<(u32, bool), vk::Result>) -> VulkanResult<AcquireOutcome> {
    match result {
        Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Ready { image_index, suboptimal }),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
        Err(e) => Err(VulkanError::Api(e)),
    }
}

/// Map the raw present result onto an outcome, keeping real failures as errors
pub fn classify_present(result: Result<bool, vk::Result>) -> VulkanResult<PresentOutcome> {
    match result {
        Ok(false) => Ok(PresentOutcome::Presented),
        Ok(true) | Err(vk::Result::SUBOPTIMAL_KHR) => Ok(PresentOutcome::Suboptimal),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
        Err(e) => Err(VulkanError::Api(e)),
    }
}

/// GPU operations one frame is made of, addressed by frame slot
pub trait FrameDevice {
    /// Block until the slot's previous submission has completed
    fn wait_for_slot(&mut self, slot: usize) -> VulkanResult<()>;

    /// Acquire the next swapchain image, signaling the slot's image semaphore
    fn acquire_image(&mut self, slot: usize) -> VulkanResult<AcquireOutcome>;

    /// Unsignal the slot's fence before it is submitted again
    fn reset_slot_fence(&mut self, slot: usize) -> VulkanResult<()>;

    /// Reset and re-record the slot's command buffer for `image_index`
    fn record_commands(&mut self, slot: usize, image_index: u32) -> VulkanResult<()>;

    /// Write this frame's uniforms into the slot's buffers
    fn update_uniforms(&mut self, slot: usize) -> VulkanResult<()>;

    /// Submit the slot's command buffer, signaling its fence
    fn submit(&mut self, slot: usize) -> VulkanResult<()>;

    /// Present `image_index` once the slot's rendering is finished
    fn present(&mut self, slot: usize, image_index: u32) -> VulkanResult<PresentOutcome>;

    /// Rebuild the swapchain and everything sized by it
    fn recreate_swapchain(&mut self) -> VulkanResult<()>;
}

/// Rotates frame slots and decides when the swapchain is rebuilt
#[derive(Debug)]
pub struct FrameScheduler {
    frames_in_flight: usize,
    current_frame: usize,
    framebuffer_resized: bool,
}

impl FrameScheduler {
    /// Scheduler for `frames_in_flight` slots
    pub fn new(frames_in_flight: usize) -> VulkanResult<Self> {
        if frames_in_flight == 0 {
            return Err(VulkanError::InvalidOperation {
                reason: "At least one frame in flight is required".to_string(),
            });
        }
        Ok(Self {
            frames_in_flight,
            current_frame: 0,
            framebuffer_resized: false,
        })
    }

    /// Request a rebuild after the next present
    pub fn notify_resized(&mut self) {
        self.framebuffer_resized = true;
    }

    /// Slot the next frame will use
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Number of slots
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    /// Run one frame on `device`
    pub fn draw_frame<D: FrameDevice + ?Sized>(&mut self, device: &mut D) -> VulkanResult<FrameOutcome> {
        let slot = self.current_frame;

        device.wait_for_slot(slot)?;

        let (image_index, acquire_suboptimal) = match device.acquire_image(slot)? {
            AcquireOutcome::Ready { image_index, suboptimal } => (image_index, suboptimal),
            AcquireOutcome::OutOfDate => {
                log::debug!("Swapchain out of date on acquire, rebuilding");
                // The rebuild already covers any pending resize
                self.framebuffer_resized = false;
                device.recreate_swapchain()?;
                return Ok(FrameOutcome::Skipped);
            }
        };

        // Only reset once work is certain to be submitted
        device.reset_slot_fence(slot)?;
        device.record_commands(slot, image_index)?;
        device.update_uniforms(slot)?;
        device.submit(slot)?;

        let presented = device.present(slot, image_index)?;
        let rebuild = match presented {
            PresentOutcome::OutOfDate | PresentOutcome::Suboptimal => true,
            PresentOutcome::Presented => self.framebuffer_resized || acquire_suboptimal,
        };
        if rebuild {
            log::debug!(
                "Rebuilding swapchain after present ({:?}, resized {}, acquire suboptimal {})",
                presented,
                self.framebuffer_resized,
                acquire_suboptimal
            );
            self.framebuffer_resized = false;
            device.recreate_swapchain()?;
        }

        self.current_frame = (self.current_frame + 1) % self.frames_in_flight;
        Ok(FrameOutcome::Presented {
            swapchain_rebuilt: rebuild,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum SlotState {
        Idle,
        Recording,
        Submitted,
    }

    /// Simulated GPU that finishes a slot's work when its fence is waited on
    struct MockGpu {
        slots: Vec<SlotState>,
        acquires: VecDeque<AcquireOutcome>,
        presents: VecDeque<PresentOutcome>,
        next_image: u32,
        image_count: u32,
        max_submitted: usize,
        fence_resets: usize,
        submissions: usize,
        presented_slots: Vec<usize>,
        recreations: usize,
        violations: Vec<String>,
    }

    impl MockGpu {
        fn new(frames_in_flight: usize) -> Self {
            Self {
                slots: vec![SlotState::Idle; frames_in_flight],
                acquires: VecDeque::new(),
                presents: VecDeque::new(),
                next_image: 0,
                image_count: 3,
                max_submitted: 0,
                fence_resets: 0,
                submissions: 0,
                presented_slots: Vec::new(),
                recreations: 0,
                violations: Vec::new(),
            }
        }

        fn submitted(&self) -> usize {
            self.slots.iter().filter(|&&state| state == SlotState::Submitted).count()
        }
    }

    impl FrameDevice for MockGpu {
        fn wait_for_slot(&mut self, slot: usize) -> VulkanResult<()> {
            if self.slots[slot] == SlotState::Submitted {
                self.slots[slot] = SlotState::Idle;
            }
            Ok(())
        }

        fn acquire_image(&mut self, _slot: usize) -> VulkanResult<AcquireOutcome> {
            if let Some(outcome) = self.acquires.pop_front() {
                return Ok(outcome);
            }
            let image_index = self.next_image;
            self.next_image = (self.next_image + 1) % self.image_count;
            Ok(AcquireOutcome::Ready {
                image_index,
                suboptimal: false,
            })
        }

        fn reset_slot_fence(&mut self, slot: usize) -> VulkanResult<()> {
            if self.slots[slot] != SlotState::Idle {
                self.violations.push(format!("fence of busy slot {} reset", slot));
            }
            self.fence_resets += 1;
            Ok(())
        }

        fn record_commands(&mut self, slot: usize, _image_index: u32) -> VulkanResult<()> {
            if self.slots[slot] != SlotState::Idle {
                self.violations.push(format!("slot {} recorded while {:?}", slot, self.slots[slot]));
            }
            self.slots[slot] = SlotState::Recording;
            Ok(())
        }

        fn update_uniforms(&mut self, slot: usize) -> VulkanResult<()> {
            if self.slots[slot] != SlotState::Recording {
                self.violations.push(format!("uniforms of slot {} written while {:?}", slot, self.slots[slot]));
            }
            Ok(())
        }

        fn submit(&mut self, slot: usize) -> VulkanResult<()> {
            self.slots[slot] = SlotState::Submitted;
            self.submissions += 1;
            self.max_submitted = self.max_submitted.max(self.submitted());
            Ok(())
        }

        fn present(&mut self, slot: usize, _image_index: u32) -> VulkanResult<PresentOutcome> {
            self.presented_slots.push(slot);
            Ok(self.presents.pop_front().unwrap_or(PresentOutcome::Presented))
        }

        fn recreate_swapchain(&mut self) -> VulkanResult<()> {
            self.recreations += 1;
            Ok(())
        }
    }

    #[test]
    fn test_zero_frames_in_flight_is_rejected() {
        assert!(FrameScheduler::new(0).is_err());
    }

    #[test]
    fn test_at_most_n_frames_in_flight() {
        for frames_in_flight in [1, 2, 3] {
            let mut scheduler = FrameScheduler::new(frames_in_flight).unwrap();
            let mut gpu = MockGpu::new(frames_in_flight);

            for _ in 0..20 {
                scheduler.draw_frame(&mut gpu).unwrap();
            }

            assert!(gpu.violations.is_empty(), "{:?}", gpu.violations);
            assert_eq!(gpu.max_submitted, frames_in_flight);
            assert_eq!(gpu.submissions, 20);
        }
    }

    #[test]
    fn test_slots_rotate_modulo_frames_in_flight() {
        let mut scheduler = FrameScheduler::new(2).unwrap();
        let mut gpu = MockGpu::new(2);

        for _ in 0..5 {
            scheduler.draw_frame(&mut gpu).unwrap();
        }

        assert_eq!(gpu.presented_slots, vec![0, 1, 0, 1, 0]);
        assert_eq!(scheduler.current_frame(), 1);
    }

    #[test]
    fn test_out_of_date_acquire_abandons_frame() {
        let mut scheduler = FrameScheduler::new(2).unwrap();
        let mut gpu = MockGpu::new(2);
        gpu.acquires.push_back(AcquireOutcome::OutOfDate);

        let outcome = scheduler.draw_frame(&mut gpu).unwrap();

        assert_eq!(outcome, FrameOutcome::Skipped);
        assert_eq!(gpu.recreations, 1);
        assert_eq!(gpu.fence_resets, 0);
        assert_eq!(gpu.submissions, 0);
        assert_eq!(scheduler.current_frame(), 0);

        // Next iteration retries the same slot
        scheduler.draw_frame(&mut gpu).unwrap();
        assert_eq!(gpu.presented_slots, vec![0]);
    }

    #[test]
    fn test_suboptimal_or_out_of_date_present_rebuilds() {
        for presented in [PresentOutcome::Suboptimal, PresentOutcome::OutOfDate] {
            let mut scheduler = FrameScheduler::new(2).unwrap();
            let mut gpu = MockGpu::new(2);
            gpu.presents.push_back(presented);

            let outcome = scheduler.draw_frame(&mut gpu).unwrap();

            assert_eq!(outcome, FrameOutcome::Presented { swapchain_rebuilt: true });
            assert_eq!(gpu.recreations, 1);
            assert_eq!(scheduler.current_frame(), 1);
        }
    }

    #[test]
    fn test_resize_flag_rebuilds_once() {
        let mut scheduler = FrameScheduler::new(2).unwrap();
        let mut gpu = MockGpu::new(2);

        scheduler.notify_resized();
        scheduler.draw_frame(&mut gpu).unwrap();
        scheduler.draw_frame(&mut gpu).unwrap();

        assert_eq!(gpu.recreations, 1);
    }

    #[test]
    fn test_out_of_date_acquire_consumes_pending_resize() {
        let mut scheduler = FrameScheduler::new(2).unwrap();
        let mut gpu = MockGpu::new(2);
        gpu.acquires.push_back(AcquireOutcome::OutOfDate);

        scheduler.notify_resized();
        assert_eq!(scheduler.draw_frame(&mut gpu).unwrap(), FrameOutcome::Skipped);
        let outcome = scheduler.draw_frame(&mut gpu).unwrap();

        assert_eq!(outcome, FrameOutcome::Presented { swapchain_rebuilt: false });
        assert_eq!(gpu.recreations, 1);
    }

    #[test]
    fn test_suboptimal_acquire_still_draws_then_rebuilds() {
        let mut scheduler = FrameScheduler::new(2).unwrap();
        let mut gpu = MockGpu::new(2);
        gpu.acquires.push_back(AcquireOutcome::Ready {
            image_index: 0,
            suboptimal: true,
        });

        let outcome = scheduler.draw_frame(&mut gpu).unwrap();

        assert_eq!(outcome, FrameOutcome::Presented { swapchain_rebuilt: true });
        assert_eq!(gpu.submissions, 1);
        assert_eq!(gpu.recreations, 1);
    }

    #[test]
    fn test_plain_frame_does_not_rebuild() {
        let mut scheduler = FrameScheduler::new(2).unwrap();
        let mut gpu = MockGpu::new(2);

        let outcome = scheduler.draw_frame(&mut gpu).unwrap();

        assert_eq!(outcome, FrameOutcome::Presented { swapchain_rebuilt: false });
        assert_eq!(gpu.recreations, 0);
    }

    #[test]
    fn test_acquire_results_are_classified() {
        assert_eq!(
            classify_acquire(Ok((2, false))).unwrap(),
            AcquireOutcome::Ready {
                image_index: 2,
                suboptimal: false
            }
        );
        assert_eq!(
            classify_acquire(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap(),
            AcquireOutcome::OutOfDate
        );
        assert!(matches!(
            classify_acquire(Err(vk::Result::ERROR_DEVICE_LOST)),
            Err(VulkanError::Api(vk::Result::ERROR_DEVICE_LOST))
        ));
    }

    #[test]
    fn test_present_results_are_classified() {
        assert_eq!(classify_present(Ok(false)).unwrap(), PresentOutcome::Presented);
        assert_eq!(classify_present(Ok(true)).unwrap(), PresentOutcome::Suboptimal);
        assert_eq!(
            classify_present(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap(),
            PresentOutcome::OutOfDate
        );
        assert!(classify_present(Err(vk::Result::ERROR_SURFACE_LOST_KHR)).is_err());
    }
}
