//! Synchronization primitives for Vulkan.
//!
//! - [`Semaphore`] orders GPU operations relative to each other
//! - [`Fence`] lets the host block until submitted GPU work completes
//! - [`FrameSync`] groups the objects owned by one in-flight frame slot
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use triangle_rhi::device::Device;
//! use triangle_rhi::sync::{Fence, Semaphore};
//!
//! # fn example(device: Arc<Device>) -> Result<(), triangle_rhi::RhiError> {
//! let image_available = Semaphore::new(device.clone())?;
//!
//! // Starts signaled so the first wait returns immediately.
//! let in_flight_fence = Fence::new(device.clone(), true)?;
//!
//! in_flight_fence.wait(u64::MAX)?;
//! in_flight_fence.reset()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Vulkan semaphore wrapper, created unsignaled.
pub struct Semaphore {
    device: Arc<Device>,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Creates a new binary semaphore.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::SyncObjectCreationFailed`] if creation fails.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();

        let semaphore = unsafe {
            device
                .handle()
                .create_semaphore(&create_info, None)
                .map_err(RhiError::SyncObjectCreationFailed)?
        };

        Ok(Self { device, semaphore })
    }

    /// Returns the Vulkan semaphore handle.
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Vulkan fence wrapper.
pub struct Fence {
    device: Arc<Device>,
    fence: vk::Fence,
}

impl Fence {
    /// Creates a new fence.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `signaled` - Create the fence already signaled, for fences that are
    ///   waited on before any submission has signaled them
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::SyncObjectCreationFailed`] if creation fails.
    pub fn new(device: Arc<Device>, signaled: bool) -> RhiResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::default().flags(flags);

        let fence = unsafe {
            device
                .handle()
                .create_fence(&create_info, None)
                .map_err(RhiError::SyncObjectCreationFailed)?
        };

        Ok(Self { device, fence })
    }

    /// Returns the Vulkan fence handle.
    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Blocks until the fence is signaled or `timeout` nanoseconds pass.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::Timeout`] when the timeout expires and
    /// [`RhiError::DeviceLost`] when the device is lost.
    pub fn wait(&self, timeout: u64) -> RhiResult<()> {
        let fences = [self.fence];
        unsafe {
            self.device
                .handle()
                .wait_for_fences(&fences, true, timeout)
                .map_err(|e| RhiError::from_frame_result(e, RhiError::VulkanError))?
        };
        Ok(())
    }

    /// Resets the fence to the unsignaled state.
    ///
    /// The fence must not be referenced by a pending submission.
    pub fn reset(&self) -> RhiResult<()> {
        let fences = [self.fence];
        unsafe {
            self.device
                .handle()
                .reset_fences(&fences)
                .map_err(|e| RhiError::from_frame_result(e, RhiError::VulkanError))?
        };
        Ok(())
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_fence(self.fence, None);
        }
    }
}

/// Synchronization objects owned by one in-flight frame slot.
///
/// ```text
/// acquire  --signals-->  image_available
/// submit   --waits----> image_available, --signals--> render_finished + in_flight_fence
/// present  --waits----> render_finished
/// ```
pub struct FrameSync {
    image_available_semaphore: Semaphore,
    render_finished_semaphore: Semaphore,
    in_flight_fence: Fence,
}

impl FrameSync {
    /// Creates the two semaphores and the frame fence. The fence starts
    /// signaled so the slot's first throttle wait returns immediately.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let image_available_semaphore = Semaphore::new(device.clone())?;
        let render_finished_semaphore = Semaphore::new(device.clone())?;
        let in_flight_fence = Fence::new(device, true)?;

        debug!("Created frame synchronization primitives");

        Ok(Self {
            image_available_semaphore,
            render_finished_semaphore,
            in_flight_fence,
        })
    }

    /// Semaphore signaled by image acquisition.
    #[inline]
    pub fn image_available_semaphore(&self) -> &Semaphore {
        &self.image_available_semaphore
    }

    /// Semaphore signaled when the slot's submission finishes.
    #[inline]
    pub fn render_finished_semaphore(&self) -> &Semaphore {
        &self.render_finished_semaphore
    }

    /// Fence signaled when the slot's submission finishes.
    #[inline]
    pub fn in_flight_fence(&self) -> &Fence {
        &self.in_flight_fence
    }

    /// Replaces the fence, signaled, and the image-available semaphore after
    /// a submission that never reached the queue.
    ///
    /// The reset fence has no work left to signal it and the acquire signal
    /// has no wait left to consume it.
    pub fn restore_after_failed_submit(&mut self, device: Arc<Device>) -> RhiResult<()> {
        self.image_available_semaphore = Semaphore::new(device.clone())?;
        self.in_flight_fence = Fence::new(device, true)?;
        debug!("Frame synchronization primitives recreated after failed submit");
        Ok(())
    }
}
