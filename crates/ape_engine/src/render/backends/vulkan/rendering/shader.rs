//! Shader modules and the textured graphics pipeline
//!
//! SPIR-V is read from disk at startup. The pipeline is fixed apart from the
//! viewport and scissor, which are dynamic so a resize never rebuilds it.

use ash::{vk, Device};
use std::ffi::CStr;
use std::fs::File;
use std::path::Path;

use super::vertex_layout::VulkanVertexLayout;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

const ENTRY_POINT: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"main\0") };

/// Fraction of samples shaded per pixel when sample shading is on
pub const MIN_SAMPLE_SHADING: f32 = 0.2;

/// SPIR-V shader module wrapper with automatic resource management
pub struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Create shader module from SPIR-V words
    pub fn from_words(device: Device, words: &[u32]) -> VulkanResult<Self> {
        let create_info = vk::ShaderModuleCreateInfo::builder().code(words);
        let module = unsafe {
            device.create_shader_module(&create_info, None).map_err(|e| {
                log::error!("vkCreateShaderModule failed: {:?}", e);
                VulkanError::Shader(format!("Shader module creation failed: {e:?}"))
            })?
        };
        Ok(Self { device, module })
    }

    /// Load shader from SPIR-V file
    pub fn from_file<P: AsRef<Path>>(device: Device, path: P) -> VulkanResult<Self> {
        let path = path.as_ref();
        log::debug!("Loading shader from {}", path.display());

        let mut file = File::open(path).map_err(|e| {
            VulkanError::Shader(format!("Failed to open shader file {}: {}", path.display(), e))
        })?;
        let words = ash::util::read_spv(&mut file).map_err(|e| {
            VulkanError::Shader(format!("Invalid SPIR-V in {}: {}", path.display(), e))
        })?;

        Self::from_words(device, &words)
    }

    /// Get shader module handle
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    /// Stage description using the `main` entry point
    pub fn stage_info(&self, stage: vk::ShaderStageFlags) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(stage)
            .module(self.module)
            .name(ENTRY_POINT)
            .build()
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}

/// Filled triangles, counter-clockwise front faces, back faces culled
pub fn rasterization_state() -> vk::PipelineRasterizationStateCreateInfo {
    vk::PipelineRasterizationStateCreateInfo::builder()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(vk::PolygonMode::FILL)
        .line_width(1.0)
        .cull_mode(vk::CullModeFlags::BACK)
        .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
        .depth_bias_enable(false)
        .build()
}

/// Multisample state at `samples`; sample shading needs the device feature
pub fn multisample_state(samples: vk::SampleCountFlags, sample_shading: bool) -> vk::PipelineMultisampleStateCreateInfo {
    let shade_per_sample = sample_shading && samples != vk::SampleCountFlags::TYPE_1;
    vk::PipelineMultisampleStateCreateInfo::builder()
        .rasterization_samples(samples)
        .sample_shading_enable(shade_per_sample)
        .min_sample_shading(if shade_per_sample { MIN_SAMPLE_SHADING } else { 0.0 })
        .build()
}

/// Depth test and write with LESS, no stencil
pub fn depth_stencil_state() -> vk::PipelineDepthStencilStateCreateInfo {
    vk::PipelineDepthStencilStateCreateInfo::builder()
        .depth_test_enable(true)
        .depth_write_enable(true)
        .depth_compare_op(vk::CompareOp::LESS)
        .depth_bounds_test_enable(false)
        .stencil_test_enable(false)
        .build()
}

/// Graphics pipeline wrapper with RAII cleanup
pub struct GraphicsPipeline {
    device: Device,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
}

/// Inputs the textured pipeline is built from
pub struct PipelineSpec<'a> {
    /// Vertex stage
    pub vertex_shader: &'a ShaderModule,
    /// Fragment stage
    pub fragment_shader: &'a ShaderModule,
    /// Pass the pipeline renders in (subpass 0)
    pub render_pass: vk::RenderPass,
    /// Layout of the only descriptor set
    pub set_layout: vk::DescriptorSetLayout,
    /// Rasterization sample count, equal to the pass's
    pub samples: vk::SampleCountFlags,
    /// Whether the device enabled sample rate shading
    pub sample_shading: bool,
}

impl GraphicsPipeline {
    /// Create the textured pipeline and its layout
    pub fn new(device: Device, spec: &PipelineSpec<'_>) -> VulkanResult<Self> {
        let shader_stages = [
            spec.vertex_shader.stage_info(vk::ShaderStageFlags::VERTEX),
            spec.fragment_shader.stage_info(vk::ShaderStageFlags::FRAGMENT),
        ];

        let bindings = [VulkanVertexLayout::binding_description()];
        let attributes = VulkanVertexLayout::attribute_descriptions();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // Counts only; the rectangles are set per frame
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let rasterizer = rasterization_state();
        let multisampling = multisample_state(spec.samples, spec.sample_shading);
        let depth_stencil = depth_stencil_state();

        let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)
            .build()];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let set_layouts = [spec.set_layout];
        let layout_info = vk::PipelineLayoutCreateInfo::builder().set_layouts(&set_layouts);
        let layout = unsafe {
            device
                .create_pipeline_layout(&layout_info, None)
                .map_err(VulkanError::Api)?
        };

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(spec.render_pass)
            .subpass(0);

        let pipelines = unsafe {
            device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info.build()], None)
        };
        let pipeline = match pipelines {
            Ok(pipelines) => pipelines[0],
            Err((_, err)) => {
                unsafe {
                    device.destroy_pipeline_layout(layout, None);
                }
                return Err(VulkanError::Api(err));
            }
        };
        log::debug!("Graphics pipeline created ({:?} samples)", spec.samples);

        Ok(Self {
            device,
            pipeline,
            layout,
        })
    }

    /// Load both shader stages from disk and build the pipeline
    pub fn from_shader_files(
        device: &Device,
        vertex_path: &Path,
        fragment_path: &Path,
        render_pass: vk::RenderPass,
        set_layout: vk::DescriptorSetLayout,
        samples: vk::SampleCountFlags,
        sample_shading: bool,
    ) -> VulkanResult<Self> {
        // Modules are only needed until the pipeline exists
        let vertex_shader = ShaderModule::from_file(device.clone(), vertex_path)?;
        let fragment_shader = ShaderModule::from_file(device.clone(), fragment_path)?;

        Self::new(
            device.clone(),
            &PipelineSpec {
                vertex_shader: &vertex_shader,
                fragment_shader: &fragment_shader,
                render_pass,
                set_layout,
                samples,
                sample_shading,
            },
        )
    }

    /// Get pipeline handle
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Get pipeline layout
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rasterizer_culls_back_faces_of_ccw_geometry() {
        let state = rasterization_state();

        assert_eq!(state.cull_mode, vk::CullModeFlags::BACK);
        assert_eq!(state.front_face, vk::FrontFace::COUNTER_CLOCKWISE);
        assert_eq!(state.polygon_mode, vk::PolygonMode::FILL);
        assert_relative_eq!(state.line_width, 1.0);
    }

    #[test]
    fn test_sample_shading_only_when_multisampled_and_supported() {
        let shaded = multisample_state(vk::SampleCountFlags::TYPE_8, true);
        assert_eq!(shaded.sample_shading_enable, vk::TRUE);
        assert_relative_eq!(shaded.min_sample_shading, MIN_SAMPLE_SHADING);
        assert_eq!(shaded.rasterization_samples, vk::SampleCountFlags::TYPE_8);

        let unsupported = multisample_state(vk::SampleCountFlags::TYPE_8, false);
        assert_eq!(unsupported.sample_shading_enable, vk::FALSE);

        let single = multisample_state(vk::SampleCountFlags::TYPE_1, true);
        assert_eq!(single.sample_shading_enable, vk::FALSE);
    }

    #[test]
    fn test_depth_uses_less_with_writes() {
        let state = depth_stencil_state();

        assert_eq!(state.depth_test_enable, vk::TRUE);
        assert_eq!(state.depth_write_enable, vk::TRUE);
        assert_eq!(state.depth_compare_op, vk::CompareOp::LESS);
        assert_eq!(state.stencil_test_enable, vk::FALSE);
    }

    #[test]
    fn test_spirv_parse_rejects_misaligned_bytes() {
        let mut bytes = std::io::Cursor::new(vec![0x03u8, 0x02, 0x23]);
        assert!(ash::util::read_spv(&mut bytes).is_err());
    }
}
