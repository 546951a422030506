//! Prerecorded triangle command buffers.
//!
//! Each presentable image gets one command buffer, recorded once at startup
//! and resubmitted every time that image is acquired. The recorded sequence
//! is described by [`RecordStep`] so it can be inspected without a device.

use ash::vk;
use tracing::debug;

use triangle_rhi::command::CommandBuffer;
use triangle_rhi::framebuffer::Framebuffer;
use triangle_rhi::{RhiError, RhiResult};

/// Vertices drawn per frame; positions come from the vertex shader.
pub const TRIANGLE_VERTEX_COUNT: u32 = 3;

/// One command recorded into a per-image buffer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RecordStep {
    Begin,
    BeginRenderPass { clear_color: [f32; 4] },
    BindPipeline,
    Draw {
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    },
    EndRenderPass,
    End,
}

/// Records the triangle draw for every framebuffer.
#[derive(Clone, Copy, Debug)]
pub struct CommandRecorder {
    render_pass: vk::RenderPass,
    pipeline: vk::Pipeline,
    extent: vk::Extent2D,
    clear_color: [f32; 4],
}

impl CommandRecorder {
    pub fn new(
        render_pass: vk::RenderPass,
        pipeline: vk::Pipeline,
        extent: vk::Extent2D,
        clear_color: [f32; 4],
    ) -> Self {
        Self {
            render_pass,
            pipeline,
            extent,
            clear_color,
        }
    }

    /// Commands recorded into each buffer, in order.
    pub fn steps(&self) -> [RecordStep; 6] {
        [
            RecordStep::Begin,
            RecordStep::BeginRenderPass {
                clear_color: self.clear_color,
            },
            RecordStep::BindPipeline,
            RecordStep::Draw {
                vertex_count: TRIANGLE_VERTEX_COUNT,
                instance_count: 1,
                first_vertex: 0,
                first_instance: 0,
            },
            RecordStep::EndRenderPass,
            RecordStep::End,
        ]
    }

    /// Records `command_buffers[i]` against `framebuffers[i]`.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidConfig`] if the slices differ in length, or
    /// the first recording failure.
    pub fn record_all(
        &self,
        command_buffers: &[CommandBuffer],
        framebuffers: &[Framebuffer],
    ) -> RhiResult<()> {
        if command_buffers.len() != framebuffers.len() {
            return Err(RhiError::InvalidConfig(format!(
                "{} command buffers for {} framebuffers",
                command_buffers.len(),
                framebuffers.len()
            )));
        }

        for (command_buffer, framebuffer) in command_buffers.iter().zip(framebuffers) {
            self.record(command_buffer, framebuffer.handle())?;
        }

        debug!("Recorded {} triangle command buffers", command_buffers.len());
        Ok(())
    }

    /// Records the step sequence into a single buffer.
    pub fn record(
        &self,
        command_buffer: &CommandBuffer,
        framebuffer: vk::Framebuffer,
    ) -> RhiResult<()> {
        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: self.extent,
        };

        for step in self.steps() {
            match step {
                RecordStep::Begin => command_buffer.begin()?,
                RecordStep::BeginRenderPass { clear_color } => {
                    let clear_values = [vk::ClearValue {
                        color: vk::ClearColorValue {
                            float32: clear_color,
                        },
                    }];
                    let begin_info = vk::RenderPassBeginInfo::default()
                        .render_pass(self.render_pass)
                        .framebuffer(framebuffer)
                        .render_area(render_area)
                        .clear_values(&clear_values);
                    command_buffer.begin_render_pass(&begin_info);
                }
                RecordStep::BindPipeline => command_buffer.bind_graphics_pipeline(self.pipeline),
                RecordStep::Draw {
                    vertex_count,
                    instance_count,
                    first_vertex,
                    first_instance,
                } => command_buffer.draw(vertex_count, instance_count, first_vertex, first_instance),
                RecordStep::EndRenderPass => command_buffer.end_render_pass(),
                RecordStep::End => command_buffer.end()?,
            }
        }

        Ok(())
    }
}
