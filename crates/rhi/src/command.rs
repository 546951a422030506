//! Command pool and command buffer management.
//!
//! - [`CommandPool`] owns a VkCommandPool bound to one queue family
//! - [`CommandBuffer`] wraps a primary VkCommandBuffer with recording methods
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use triangle_rhi::device::Device;
//! use triangle_rhi::command::CommandPool;
//!
//! # fn example(device: Arc<Device>, family: u32) -> Result<(), triangle_rhi::RhiError> {
//! let pool = CommandPool::new(device.clone(), family)?;
//! let buffers = pool.allocate_command_buffers(3)?;
//!
//! for cmd in &buffers {
//!     cmd.begin()?;
//!     // ... record rendering commands ...
//!     cmd.end()?;
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::info;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Vulkan command pool wrapper.
///
/// Buffers allocated from the pool are freed together with it.
pub struct CommandPool {
    device: Arc<Device>,
    pool: vk::CommandPool,
    queue_family_index: u32,
}

impl CommandPool {
    /// Creates a command pool for `queue_family_index`.
    ///
    /// No creation flags are set: buffers are recorded once and never reset
    /// individually.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::CommandPoolCreationFailed`] if creation fails.
    pub fn new(device: Arc<Device>, queue_family_index: u32) -> RhiResult<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family_index)
            .flags(vk::CommandPoolCreateFlags::empty());

        let pool = unsafe {
            device
                .handle()
                .create_command_pool(&create_info, None)
                .map_err(RhiError::CommandPoolCreationFailed)?
        };

        info!(
            "Command pool created for queue family {}",
            queue_family_index
        );

        Ok(Self {
            device,
            pool,
            queue_family_index,
        })
    }

    /// Returns the Vulkan command pool handle.
    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    /// Allocates `count` primary command buffers.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::CommandBufferAllocationFailed`] if allocation fails.
    pub fn allocate_command_buffers(&self, count: u32) -> RhiResult<Vec<CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        let buffers = unsafe {
            self.device
                .handle()
                .allocate_command_buffers(&alloc_info)
                .map_err(RhiError::CommandBufferAllocationFailed)?
        };

        Ok(buffers
            .into_iter()
            .map(|buffer| CommandBuffer {
                device: self.device.clone(),
                buffer,
            })
            .collect())
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_command_pool(self.pool, None);
        }
        info!(
            "Command pool destroyed for queue family {}",
            self.queue_family_index
        );
    }
}

/// Primary command buffer.
///
/// Does not own the underlying handle; it is freed with its [`CommandPool`].
#[derive(Clone)]
pub struct CommandBuffer {
    device: Arc<Device>,
    buffer: vk::CommandBuffer,
}

impl CommandBuffer {
    /// Returns the raw Vulkan command buffer handle.
    #[inline]
    pub fn handle(&self) -> vk::CommandBuffer {
        self.buffer
    }

    // =========================================================================
    // Recording Control
    // =========================================================================

    /// Begins recording a buffer that may be submitted many times.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::BeginRecordingFailed`] if beginning fails.
    pub fn begin(&self) -> RhiResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::default();

        unsafe {
            self.device
                .handle()
                .begin_command_buffer(self.buffer, &begin_info)
                .map_err(RhiError::BeginRecordingFailed)?;
        }

        Ok(())
    }

    /// Ends recording; the buffer is then executable.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::EndRecordingFailed`] if ending fails.
    pub fn end(&self) -> RhiResult<()> {
        unsafe {
            self.device
                .handle()
                .end_command_buffer(self.buffer)
                .map_err(RhiError::EndRecordingFailed)?;
        }

        Ok(())
    }

    // =========================================================================
    // Render Pass
    // =========================================================================

    /// Begins a render pass with inline subpass contents.
    pub fn begin_render_pass(&self, begin_info: &vk::RenderPassBeginInfo) {
        unsafe {
            self.device.handle().cmd_begin_render_pass(
                self.buffer,
                begin_info,
                vk::SubpassContents::INLINE,
            );
        }
    }

    /// Ends the current render pass.
    pub fn end_render_pass(&self) {
        unsafe {
            self.device.handle().cmd_end_render_pass(self.buffer);
        }
    }

    // =========================================================================
    // Pipeline & Draw
    // =========================================================================

    /// Binds a graphics pipeline.
    pub fn bind_graphics_pipeline(&self, pipeline: vk::Pipeline) {
        unsafe {
            self.device.handle().cmd_bind_pipeline(
                self.buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline,
            );
        }
    }

    /// Records a non-indexed draw.
    pub fn draw(
        &self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        unsafe {
            self.device.handle().cmd_draw(
                self.buffer,
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_command_types_are_send_sync() {
        assert_send_sync::<CommandPool>();
        assert_send_sync::<CommandBuffer>();
    }
}
