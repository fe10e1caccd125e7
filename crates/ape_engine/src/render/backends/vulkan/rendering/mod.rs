//! Vulkan rendering components: commands, render pass, pipeline

/// Command pools and recording
pub mod commands;
/// Forward render pass
pub mod render_pass;
/// Shader modules and the graphics pipeline
pub mod shader;
/// Vertex input layout
pub mod vertex_layout;

pub use commands::{ActiveRenderPass, CommandPool, CommandRecorder};
pub use render_pass::RenderPass;
pub use shader::{GraphicsPipeline, ShaderModule};
pub use vertex_layout::VulkanVertexLayout;
