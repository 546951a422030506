//! Vulkan frame synchronization.
//!
//! [`FrameManager`] owns one [`FrameSync`] set per in-flight slot and drives
//! the [`FrameScheduler`] protocol against the real device, swapchain and
//! prerecorded command buffers.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use triangle_core::Config;
//! use triangle_rhi::command::CommandBuffer;
//! use triangle_rhi::device::Device;
//! use triangle_rhi::swapchain::Swapchain;
//! use triangle_renderer::frame_manager::FrameManager;
//!
//! # fn example(
//! #     device: Arc<Device>,
//! #     swapchain: &Swapchain,
//! #     command_buffers: &[CommandBuffer],
//! # ) -> Result<(), triangle_rhi::RhiError> {
//! let config = Config::default();
//! let mut frame_manager = FrameManager::new(device, &config, swapchain.image_count())?;
//!
//! loop {
//!     let report = frame_manager.draw_frame(swapchain, command_buffers)?;
//!     tracing::trace!("presented image {}", report.image_index);
//!     # break;
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::info;

use triangle_core::Config;
use triangle_rhi::command::CommandBuffer;
use triangle_rhi::device::Device;
use triangle_rhi::swapchain::Swapchain;
use triangle_rhi::sync::FrameSync;
use triangle_rhi::{RhiError, RhiResult};

use crate::frame_scheduler::{FrameBackend, FrameReport, FrameScheduler};

/// Per-slot semaphores and fences plus the frames-in-flight state.
pub struct FrameManager {
    device: Arc<Device>,
    frames: Vec<FrameSync>,
    scheduler: FrameScheduler,
    fence_timeout_ns: u64,
}

impl FrameManager {
    /// Creates `config.max_frames_in_flight` synchronization sets for a chain
    /// of `image_count` images.
    ///
    /// Fences start signaled so the first wait on each slot returns at once.
    pub fn new(device: Arc<Device>, config: &Config, image_count: usize) -> RhiResult<Self> {
        let scheduler = FrameScheduler::new(config.max_frames_in_flight, image_count)?;

        let frames = (0..config.max_frames_in_flight)
            .map(|_| FrameSync::new(device.clone()))
            .collect::<RhiResult<Vec<_>>>()?;

        info!(
            "Frame manager created with {} frames in flight over {} images",
            frames.len(),
            image_count
        );

        Ok(Self {
            device,
            frames,
            scheduler,
            fence_timeout_ns: config.fence_timeout_ns,
        })
    }

    /// Renders and presents one frame.
    ///
    /// `command_buffers[i]` must hold the recorded commands for swapchain
    /// image `i`.
    pub fn draw_frame(
        &mut self,
        swapchain: &Swapchain,
        command_buffers: &[CommandBuffer],
    ) -> RhiResult<FrameReport> {
        let mut backend = VulkanFrameBackend {
            device: &self.device,
            frames: &mut self.frames,
            swapchain,
            command_buffers,
            fence_timeout_ns: self.fence_timeout_ns,
        };
        self.scheduler.draw_frame(&mut backend)
    }

    /// The frames-in-flight state.
    #[inline]
    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    /// Number of in-flight slots.
    #[inline]
    pub fn frames_in_flight(&self) -> usize {
        self.frames.len()
    }
}

/// Borrows the Vulkan objects needed for one frame.
struct VulkanFrameBackend<'a> {
    device: &'a Arc<Device>,
    frames: &'a mut [FrameSync],
    swapchain: &'a Swapchain,
    command_buffers: &'a [CommandBuffer],
    fence_timeout_ns: u64,
}

impl FrameBackend for VulkanFrameBackend<'_> {
    fn wait_for_slot(&mut self, slot: usize) -> RhiResult<()> {
        self.frames[slot].in_flight_fence().wait(self.fence_timeout_ns)
    }

    fn reset_slot(&mut self, slot: usize) -> RhiResult<()> {
        self.frames[slot].in_flight_fence().reset()
    }

    fn restore_slot(&mut self, slot: usize) -> RhiResult<()> {
        self.frames[slot].restore_after_failed_submit(self.device.clone())
    }

    fn acquire_image(&mut self, slot: usize) -> RhiResult<u32> {
        self.swapchain.acquire_next_image(
            self.frames[slot].image_available_semaphore().handle(),
            self.fence_timeout_ns,
        )
    }

    fn submit(&mut self, slot: usize, image_index: u32) -> RhiResult<()> {
        let frame = &self.frames[slot];
        let command_buffer = self
            .command_buffers
            .get(image_index as usize)
            .ok_or_else(|| {
                RhiError::InvalidConfig(format!(
                    "no command buffer recorded for image {}",
                    image_index
                ))
            })?;

        let wait_semaphores = [frame.image_available_semaphore().handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [command_buffer.handle()];
        let signal_semaphores = [frame.render_finished_semaphore().handle()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        // SAFETY: the slot's fence was waited on and reset, so neither it nor
        // the slot's semaphores belong to a pending submission. The image
        // guard ensured no other slot is still rendering with this buffer.
        unsafe {
            self.device
                .submit_graphics(&[submit_info], frame.in_flight_fence().handle())
        }
    }

    fn present(&mut self, slot: usize, image_index: u32) -> RhiResult<()> {
        self.swapchain.present(
            self.device.present_queue(),
            image_index,
            self.frames[slot].render_finished_semaphore().handle(),
        )
    }
}
