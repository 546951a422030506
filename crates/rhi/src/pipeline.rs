//! Graphics pipeline management.
//!
//! - [`PipelineLayout`] wraps VkPipelineLayout
//! - [`Pipeline`] wraps an immutable graphics VkPipeline
//! - [`GraphicsPipelineBuilder`] assembles fixed-function state for a
//!   render-pass based pipeline with a static viewport
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::path::Path;
//! use triangle_rhi::device::Device;
//! use triangle_rhi::render_pass::RenderPass;
//! use triangle_rhi::shader::{Shader, ShaderStage};
//! use triangle_rhi::pipeline::{GraphicsPipelineBuilder, PipelineLayout};
//! use ash::vk;
//!
//! # fn example(device: Arc<Device>, render_pass: &RenderPass) -> Result<(), triangle_rhi::RhiError> {
//! let vert = Shader::from_spirv_file(device.clone(), Path::new("res/shaders/vert.spv"), ShaderStage::Vertex)?;
//! let frag = Shader::from_spirv_file(device.clone(), Path::new("res/shaders/frag.spv"), ShaderStage::Fragment)?;
//!
//! let layout = PipelineLayout::empty(device.clone())?;
//! let pipeline = GraphicsPipelineBuilder::new()
//!     .vertex_shader(&vert)
//!     .fragment_shader(&frag)
//!     .render_pass(render_pass.handle(), 0)
//!     .extent(vk::Extent2D { width: 800, height: 600 })
//!     .build(device, &layout)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::shader::Shader;

/// Vulkan pipeline layout wrapper.
pub struct PipelineLayout {
    device: Arc<Device>,
    layout: vk::PipelineLayout,
}

impl PipelineLayout {
    /// Creates a layout with no descriptor sets and no push constants.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::PipelineLayoutFailed`] if creation fails.
    pub fn empty(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = vk::PipelineLayoutCreateInfo::default();

        let layout = unsafe {
            device
                .handle()
                .create_pipeline_layout(&create_info, None)
                .map_err(RhiError::PipelineLayoutFailed)?
        };

        debug!("Created empty pipeline layout");

        Ok(Self { device, layout })
    }

    /// Returns the Vulkan pipeline layout handle.
    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_pipeline_layout(self.layout, None);
        }
        debug!("Pipeline layout destroyed");
    }
}

/// Vulkan graphics pipeline wrapper.
pub struct Pipeline {
    device: Arc<Device>,
    pipeline: vk::Pipeline,
}

impl Pipeline {
    fn create_graphics_internal(
        device: Arc<Device>,
        create_info: &vk::GraphicsPipelineCreateInfo,
    ) -> RhiResult<Self> {
        let pipelines = unsafe {
            device
                .handle()
                .create_graphics_pipelines(vk::PipelineCache::null(), &[*create_info], None)
                .map_err(|(_, result)| RhiError::PipelineCreationFailed(result))?
        };

        let pipeline = pipelines
            .into_iter()
            .next()
            .ok_or(RhiError::PipelineCreationFailed(vk::Result::ERROR_UNKNOWN))?;

        info!("Graphics pipeline created");

        Ok(Self { device, pipeline })
    }

    /// Returns the Vulkan pipeline handle.
    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_pipeline(self.pipeline, None);
        }
        info!("Graphics pipeline destroyed");
    }
}

/// Triangle list input assembly without primitive restart.
pub fn triangle_list_input_assembly() -> vk::PipelineInputAssemblyStateCreateInfo<'static> {
    vk::PipelineInputAssemblyStateCreateInfo::default()
        .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
        .primitive_restart_enable(false)
}

/// Filled polygons, back faces culled, clockwise winding as front, no depth
/// clamp or bias.
pub fn back_face_culled_rasterization() -> vk::PipelineRasterizationStateCreateInfo<'static> {
    vk::PipelineRasterizationStateCreateInfo::default()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(vk::PolygonMode::FILL)
        .line_width(1.0)
        .cull_mode(vk::CullModeFlags::BACK)
        .front_face(vk::FrontFace::CLOCKWISE)
        .depth_bias_enable(false)
}

/// Opaque color write: blending disabled, all four channels written.
pub fn opaque_color_blend_attachment() -> vk::PipelineColorBlendAttachmentState {
    vk::PipelineColorBlendAttachmentState::default()
        .blend_enable(false)
        .src_color_blend_factor(vk::BlendFactor::ONE)
        .dst_color_blend_factor(vk::BlendFactor::ZERO)
        .color_blend_op(vk::BlendOp::ADD)
        .src_alpha_blend_factor(vk::BlendFactor::ONE)
        .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
        .alpha_blend_op(vk::BlendOp::ADD)
        .color_write_mask(vk::ColorComponentFlags::RGBA)
}

/// Viewport covering `extent` with depth range [0, 1].
pub fn full_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

/// Scissor rectangle covering `extent`.
pub fn full_scissor(extent: vk::Extent2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    }
}

/// Builder for the graphics pipeline.
///
/// Fixed state: triangle list, fill, back-face culling, clockwise front face,
/// one sample, opaque color write, no vertex input, viewport and scissor
/// baked in from [`extent`](Self::extent).
pub struct GraphicsPipelineBuilder<'a> {
    vertex_shader: Option<&'a Shader>,
    fragment_shader: Option<&'a Shader>,

    render_pass: vk::RenderPass,
    subpass: u32,
    extent: vk::Extent2D,
}

impl Default for GraphicsPipelineBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> GraphicsPipelineBuilder<'a> {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self {
            vertex_shader: None,
            fragment_shader: None,

            render_pass: vk::RenderPass::null(),
            subpass: 0,
            extent: vk::Extent2D::default(),
        }
    }

    /// Sets the vertex shader.
    pub fn vertex_shader(mut self, shader: &'a Shader) -> Self {
        self.vertex_shader = Some(shader);
        self
    }

    /// Sets the fragment shader.
    pub fn fragment_shader(mut self, shader: &'a Shader) -> Self {
        self.fragment_shader = Some(shader);
        self
    }

    /// Sets the render pass and subpass the pipeline is used in.
    pub fn render_pass(mut self, render_pass: vk::RenderPass, subpass: u32) -> Self {
        self.render_pass = render_pass;
        self.subpass = subpass;
        self
    }

    /// Sets the static viewport and scissor extent.
    pub fn extent(mut self, extent: vk::Extent2D) -> Self {
        self.extent = extent;
        self
    }

    fn validate(&self) -> RhiResult<(&'a Shader, &'a Shader)> {
        let vertex_shader = self
            .vertex_shader
            .ok_or_else(|| RhiError::InvalidConfig("Vertex shader is required".to_string()))?;

        let fragment_shader = self
            .fragment_shader
            .ok_or_else(|| RhiError::InvalidConfig("Fragment shader is required".to_string()))?;

        if self.render_pass == vk::RenderPass::null() {
            return Err(RhiError::InvalidConfig(
                "A render pass is required".to_string(),
            ));
        }

        if self.extent.width == 0 || self.extent.height == 0 {
            return Err(RhiError::InvalidConfig(format!(
                "Pipeline extent must be non-zero, got {}x{}",
                self.extent.width, self.extent.height
            )));
        }

        Ok((vertex_shader, fragment_shader))
    }

    /// Builds the graphics pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidConfig`] if a shader, the render pass or
    /// the extent is missing, and [`RhiError::PipelineCreationFailed`] if the
    /// driver rejects the pipeline.
    pub fn build(self, device: Arc<Device>, layout: &PipelineLayout) -> RhiResult<Pipeline> {
        let (vertex_shader, fragment_shader) = self.validate()?;

        let shader_stages = [
            vertex_shader.stage_create_info(),
            fragment_shader.stage_create_info(),
        ];

        // Vertices are generated in the vertex shader.
        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default();

        let input_assembly_state = triangle_list_input_assembly();

        let viewports = [full_viewport(self.extent)];
        let scissors = [full_scissor(self.extent)];
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewports(&viewports)
            .scissors(&scissors);

        let rasterization_state = back_face_culled_rasterization();

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let color_blend_attachments = [opaque_color_blend_attachment()];
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(&color_blend_attachments)
            .blend_constants([0.0, 0.0, 0.0, 0.0]);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .color_blend_state(&color_blend_state)
            .layout(layout.handle())
            .render_pass(self.render_pass)
            .subpass(self.subpass);

        debug!(
            "Building graphics pipeline: {}x{}, subpass {}",
            self.extent.width, self.extent.height, self.subpass
        );

        Pipeline::create_graphics_internal(device, &pipeline_info)
    }
}
