//! Vulkan renderer
//!
//! Owns every GPU object of the application and drives one frame at a time
//! through the [`FrameScheduler`]. Construction order is context, render pass,
//! pipeline, swapchain, frame slots, descriptor pool; teardown is the exact
//! reverse and always starts with a device-idle wait.

use ash::vk;
use std::path::Path;
use std::sync::Arc;

use super::initialization::{DebugSink, LogSink, VulkanContext};
use super::rendering::commands::{frame_clear_values, full_scissor, full_viewport, CommandPool, CommandRecorder};
use super::rendering::{GraphicsPipeline, RenderPass};
use super::resources::image::find_depth_format;
use super::resources::texture::TEXTURE_FORMAT;
use super::resources::{DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder, Drawable, UploadContext};
use super::state::frame_scheduler::{classify_acquire, classify_present};
use super::state::swapchain::choose_surface_format;
use super::state::sync::FENCE_TIMEOUT;
use super::state::{
    AcquireOutcome, FrameDevice, FrameOutcome, FrameScheduler, FrameSlot, PresentOutcome, SwapchainManager,
    TargetSpec, VulkanSwapchainBuilder,
};
use super::{VulkanError, VulkanResult};
use crate::assets::ImageData;
use crate::core::config::VulkanRendererConfig;
use crate::foundation::math::Mat4;
use crate::render::mesh::Mesh;
use crate::render::window::Window;

/// Every GPU object, in drop order
struct RenderResources {
    drawables: Vec<Drawable>,
    descriptor_pool: DescriptorPool,
    frame_slots: Vec<FrameSlot>,
    command_pool: CommandPool,
    swapchain: SwapchainManager<VulkanSwapchainBuilder>,
    pipeline: GraphicsPipeline,
    descriptor_set_layout: DescriptorSetLayout,
    render_pass: RenderPass,
    context: VulkanContext,
    clear_color: [f32; 4],
}

impl Drop for RenderResources {
    fn drop(&mut self) {
        // Nothing may be destroyed while queued work can still reference it
        if let Err(e) = self.context.wait_idle() {
            log::error!("Device wait before teardown failed: {}", e);
        }
        log::info!("Releasing {} drawables and renderer resources", self.drawables.len());
    }
}

/// One frame's view of the renderer, handed to the scheduler
struct FrameSurface<'a> {
    resources: &'a mut RenderResources,
    window: &'a mut Window,
    elapsed_seconds: f32,
}

impl FrameDevice for FrameSurface<'_> {
    fn wait_for_slot(&mut self, slot: usize) -> VulkanResult<()> {
        self.resources.frame_slots[slot].sync.in_flight.wait(FENCE_TIMEOUT)
    }

    fn acquire_image(&mut self, slot: usize) -> VulkanResult<AcquireOutcome> {
        let semaphore = self.resources.frame_slots[slot].sync.image_available.handle();
        let targets = self.resources.swapchain.targets()?;
        classify_acquire(targets.swapchain().acquire_next_image(semaphore, u64::MAX))
    }

    fn reset_slot_fence(&mut self, slot: usize) -> VulkanResult<()> {
        self.resources.frame_slots[slot].sync.in_flight.reset()
    }

    fn record_commands(&mut self, slot: usize, image_index: u32) -> VulkanResult<()> {
        let resources = &*self.resources;
        let targets = resources.swapchain.targets()?;
        let extent = targets.extent();
        let framebuffer = targets.framebuffer(image_index)?;
        let clear_values = frame_clear_values(resources.clear_color);
        let pipeline_layout = resources.pipeline.layout();

        let mut recorder = CommandRecorder::begin(
            resources.context.raw_device(),
            resources.frame_slots[slot].command_buffer,
        )?;
        {
            let mut pass = recorder.begin_render_pass(
                resources.render_pass.handle(),
                framebuffer,
                full_scissor(extent),
                &clear_values,
            );
            pass.bind_pipeline(resources.pipeline.handle());
            pass.set_viewport(full_viewport(extent));
            pass.set_scissor(full_scissor(extent));
            for drawable in &resources.drawables {
                drawable.record(&mut pass, pipeline_layout, slot);
            }
        }
        recorder.end()?;
        Ok(())
    }

    fn update_uniforms(&mut self, slot: usize) -> VulkanResult<()> {
        let extent = self.resources.swapchain.targets()?.extent();
        for drawable in &mut self.resources.drawables {
            drawable.update_uniform(slot, self.elapsed_seconds, extent);
        }
        Ok(())
    }

    fn submit(&mut self, slot: usize) -> VulkanResult<()> {
        let frame = &self.resources.frame_slots[slot];
        let wait_semaphores = [frame.sync.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [frame.command_buffer];
        let signal_semaphores = [frame.sync.render_finished.handle()];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.resources
                .context
                .raw_device()
                .queue_submit(
                    self.resources.context.graphics_queue(),
                    &[submit_info.build()],
                    frame.sync.in_flight.handle(),
                )
                .map_err(VulkanError::Api)
        }
    }

    fn present(&mut self, slot: usize, image_index: u32) -> VulkanResult<PresentOutcome> {
        let render_finished = self.resources.frame_slots[slot].sync.render_finished.handle();
        let targets = self.resources.swapchain.targets()?;
        classify_present(targets.swapchain().present(
            self.resources.context.present_queue(),
            render_finished,
            image_index,
        ))
    }

    fn recreate_swapchain(&mut self) -> VulkanResult<()> {
        // A close request while minimized leaves the old targets; the caller sees it on the window
        self.resources.swapchain.recreate(&mut *self.window).map(|_rebuilt| ())
    }
}

/// Forward renderer for a fixed set of textured drawables
pub struct VulkanRenderer {
    scheduler: FrameScheduler,
    resources: RenderResources,
    debug_sink: Option<Arc<LogSink>>,
    max_drawables: u32,
}

impl VulkanRenderer {
    /// Bring up the device, pipeline and swapchain for `window`
    pub fn new(window: &mut Window, config: &VulkanRendererConfig) -> VulkanResult<Self> {
        config
            .validate()
            .map_err(|e| VulkanError::InitializationFailed(format!("Invalid renderer config: {}", e)))?;
        config
            .shaders
            .validate()
            .map_err(|e| VulkanError::Shader(e.to_string()))?;
        log::debug!("Creating VulkanRenderer...");

        let debug_sink = config.validation_enabled().then(|| Arc::new(LogSink::new()));
        let context = VulkanContext::new(
            window,
            &config.application_name,
            debug_sink.clone().map(|sink| sink as Arc<dyn DebugSink>),
        )?;
        let device = context.raw_device().clone();
        let frames_in_flight = config.max_frames_in_flight;

        let samples = if config.enable_msaa {
            context.physical_device().max_sample_count()
        } else {
            vk::SampleCountFlags::TYPE_1
        };
        let sample_shading = context.physical_device().features.sample_rate_shading == vk::TRUE;
        let depth_format = find_depth_format(|format| context.format_properties(format))?;
        let color_format = choose_surface_format(&context.query_surface_support()?.formats)?.format;
        log::info!(
            "Render setup: color {:?}, depth {:?}, {:?} samples, {} frames in flight",
            color_format,
            depth_format,
            samples,
            frames_in_flight
        );

        let render_pass = RenderPass::new(device.clone(), color_format, depth_format, samples)?;
        let descriptor_set_layout = DescriptorSetLayoutBuilder::textured().build(&device)?;
        let pipeline = GraphicsPipeline::from_shader_files(
            &device,
            Path::new(&config.shaders.vertex_shader_path),
            Path::new(&config.shaders.fragment_shader_path),
            render_pass.handle(),
            descriptor_set_layout.handle(),
            samples,
            sample_shading,
        )?;

        let builder = VulkanSwapchainBuilder::new(
            &context,
            TargetSpec {
                render_pass: render_pass.handle(),
                samples,
                depth_format,
            },
        )?;
        let swapchain = SwapchainManager::new(builder, window)?;

        let command_pool = CommandPool::new(device.clone(), context.graphics_queue_family())?;
        let command_buffers = command_pool.allocate_command_buffers(frames_in_flight as u32)?;
        let frame_slots = FrameSlot::create_all(&device, command_buffers)?;
        let descriptor_pool = DescriptorPool::new(device, config.max_drawables, frames_in_flight as u32)?;

        log::debug!("VulkanRenderer created successfully");
        Ok(Self {
            scheduler: FrameScheduler::new(frames_in_flight)?,
            resources: RenderResources {
                drawables: Vec::new(),
                descriptor_pool,
                frame_slots,
                command_pool,
                swapchain,
                pipeline,
                descriptor_set_layout,
                render_pass,
                context,
                clear_color: config.clear_color,
            },
            debug_sink,
            max_drawables: config.max_drawables,
        })
    }

    /// Upload a textured mesh; returns its index in draw order
    pub fn add_drawable(&mut self, mesh: &Mesh, image: &ImageData, placement: Mat4) -> VulkanResult<usize> {
        let resources = &mut self.resources;
        if resources.drawables.len() >= self.max_drawables as usize {
            return Err(VulkanError::InvalidOperation {
                reason: format!("Descriptor pool holds at most {} drawables", self.max_drawables),
            });
        }

        let drawable = {
            let context = &resources.context;
            let upload = UploadContext {
                device: context.raw_device(),
                memory_properties: &context.physical_device().memory_properties,
                format_properties: context.format_properties(TEXTURE_FORMAT),
                max_anisotropy: context.physical_device().properties.limits.max_sampler_anisotropy,
                command_pool: &resources.command_pool,
                queue: context.graphics_queue(),
            };
            Drawable::new(
                &upload,
                &resources.descriptor_pool,
                resources.descriptor_set_layout.handle(),
                self.scheduler.frames_in_flight(),
                mesh,
                image,
                placement,
            )?
        };

        resources.drawables.push(drawable);
        log::info!("Drawable {} added", resources.drawables.len() - 1);
        Ok(resources.drawables.len() - 1)
    }

    /// Draw one frame, `elapsed_seconds` after startup
    pub fn draw_frame(&mut self, window: &mut Window, elapsed_seconds: f32) -> VulkanResult<FrameOutcome> {
        let mut surface = FrameSurface {
            resources: &mut self.resources,
            window,
            elapsed_seconds,
        };
        self.scheduler.draw_frame(&mut surface)
    }

    /// Rebuild the swapchain after the next present
    pub fn notify_resized(&mut self) {
        self.scheduler.notify_resized();
    }

    /// Block until the device has finished all submitted work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        self.resources.context.wait_idle()
    }

    /// Validation errors reported so far, if validation is on
    pub fn validation_error_count(&self) -> Option<usize> {
        self.debug_sink.as_ref().map(|sink| sink.error_count())
    }

    /// Number of uploaded drawables
    pub fn drawable_count(&self) -> usize {
        self.resources.drawables.len()
    }
}
