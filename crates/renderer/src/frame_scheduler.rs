//! Frames-in-flight protocol.
//!
//! [`FrameScheduler`] owns the bookkeeping that keeps the CPU at most
//! `frames_in_flight` submissions ahead of the GPU and keeps two submissions
//! from rendering into the same presentable image concurrently. The GPU side
//! is reached through [`FrameBackend`], so the protocol runs unchanged
//! against Vulkan or a simulated device.
//!
//! One call to [`FrameScheduler::draw_frame`] performs, for the current slot:
//!
//! ```text
//! 1. throttle  wait on the slot's fence
//! 2. acquire   next image, signaling the slot's image-available semaphore
//! 3. guard     if another slot last rendered this image, wait on its fence
//! 4. submit    reset the slot's fence, submit the image's command buffer,
//!              then record this slot as the image's owner
//! 5. present   queue the image once render-finished signals
//! 6. advance   current_frame = (current_frame + 1) % frames_in_flight
//! ```
//!
//! Any failure returns immediately without advancing. A failed submit first
//! asks the backend to restore the slot, since its fence was already reset
//! and nothing queued will signal it.

use tracing::{error, trace, warn};

use triangle_rhi::{RhiError, RhiResult};

/// GPU operations the scheduler drives for a frame slot.
///
/// `slot` is always below the scheduler's `frames_in_flight` and
/// `image_index` is always an index returned by [`acquire_image`](Self::acquire_image).
pub trait FrameBackend {
    /// Block until the slot's fence is signaled.
    fn wait_for_slot(&mut self, slot: usize) -> RhiResult<()>;

    /// Return the slot's fence to the unsignaled state.
    fn reset_slot(&mut self, slot: usize) -> RhiResult<()>;

    /// Acquire the next presentable image, signaling the slot's
    /// image-available semaphore.
    fn acquire_image(&mut self, slot: usize) -> RhiResult<u32>;

    /// Put the slot back in a waitable state after [`submit`](Self::submit)
    /// failed: the fence signaled and the image-available semaphore unused.
    fn restore_slot(&mut self, slot: usize) -> RhiResult<()>;

    /// Submit the image's command buffer, waiting on the slot's
    /// image-available semaphore and signaling its render-finished semaphore
    /// and fence.
    fn submit(&mut self, slot: usize, image_index: u32) -> RhiResult<()>;

    /// Present the image once the slot's render-finished semaphore signals.
    fn present(&mut self, slot: usize, image_index: u32) -> RhiResult<()>;
}

/// Host-side view of a slot's fence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    /// Never submitted; the fence was created signaled.
    Idle,
    /// Work was submitted and its fence has not been observed signaled.
    Submitted,
    /// The host has observed the fence of the last submission signaled.
    Complete,
}

/// Outcome of one [`FrameScheduler::draw_frame`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameReport {
    /// Slot used for this frame.
    pub slot: usize,
    /// Image rendered and presented.
    pub image_index: u32,
    /// Slot the image-reuse guard had to wait for, if any.
    pub waited_on_slot: Option<usize>,
}

/// Frames-in-flight state machine.
#[derive(Debug)]
pub struct FrameScheduler {
    frames_in_flight: usize,
    current_frame: usize,
    images_in_flight: Vec<Option<usize>>,
    slot_states: Vec<SlotState>,
    frames_rendered: u64,
}

impl FrameScheduler {
    /// Creates a scheduler for `frames_in_flight` slots over a chain of
    /// `image_count` images.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidConfig`] if either count is zero.
    pub fn new(frames_in_flight: usize, image_count: usize) -> RhiResult<Self> {
        if frames_in_flight == 0 {
            return Err(RhiError::InvalidConfig(
                "frames_in_flight must be at least 1".to_string(),
            ));
        }
        if image_count == 0 {
            return Err(RhiError::InvalidConfig(
                "image chain must contain at least one image".to_string(),
            ));
        }

        Ok(Self {
            frames_in_flight,
            current_frame: 0,
            images_in_flight: vec![None; image_count],
            slot_states: vec![SlotState::Idle; frames_in_flight],
            frames_rendered: 0,
        })
    }

    /// Number of in-flight slots.
    #[inline]
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    /// Slot the next frame will use.
    #[inline]
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Number of images in the chain.
    #[inline]
    pub fn image_count(&self) -> usize {
        self.images_in_flight.len()
    }

    /// Slot whose fence last covered `image_index`, if any.
    pub fn image_owner(&self, image_index: usize) -> Option<usize> {
        self.images_in_flight.get(image_index).copied().flatten()
    }

    /// Host-side state of `slot`.
    pub fn slot_state(&self, slot: usize) -> Option<SlotState> {
        self.slot_states.get(slot).copied()
    }

    /// Frames successfully submitted and presented.
    #[inline]
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Runs one iteration of the protocol against `backend`.
    ///
    /// # Errors
    ///
    /// Propagates the first backend failure, and returns
    /// [`RhiError::InvalidConfig`] if the backend acquires an image index
    /// outside the chain. `current_frame` is left unchanged on error.
    pub fn draw_frame<B: FrameBackend>(&mut self, backend: &mut B) -> RhiResult<FrameReport> {
        let slot = self.current_frame;

        backend.wait_for_slot(slot)?;
        self.observe_complete(slot);

        let image_index = backend.acquire_image(slot)?;
        let image = image_index as usize;
        if image >= self.images_in_flight.len() {
            return Err(RhiError::InvalidConfig(format!(
                "acquired image index {} outside chain of {} images",
                image_index,
                self.images_in_flight.len()
            )));
        }

        let waited_on_slot = match self.images_in_flight[image] {
            Some(owner) if owner != slot => {
                trace!(
                    "Image {} still owned by slot {}, waiting before reuse",
                    image_index, owner
                );
                backend.wait_for_slot(owner)?;
                self.observe_complete(owner);
                Some(owner)
            }
            _ => None,
        };

        backend.reset_slot(slot)?;
        if let Err(err) = backend.submit(slot, image_index) {
            warn!("Submit failed on slot {}, restoring its fence: {}", slot, err);
            if let Err(restore_err) = backend.restore_slot(slot) {
                error!("Failed to restore slot {}: {}", slot, restore_err);
            }
            return Err(err);
        }
        self.images_in_flight[image] = Some(slot);
        self.slot_states[slot] = SlotState::Submitted;

        backend.present(slot, image_index)?;

        self.current_frame = (slot + 1) % self.frames_in_flight;
        self.frames_rendered += 1;

        trace!(
            "Frame {} submitted: slot {}, image {}",
            self.frames_rendered, slot, image_index
        );

        Ok(FrameReport {
            slot,
            image_index,
            waited_on_slot,
        })
    }

    fn observe_complete(&mut self, slot: usize) {
        if self.slot_states[slot] == SlotState::Submitted {
            self.slot_states[slot] = SlotState::Complete;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use triangle_rhi::vk;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        Wait(usize),
        Reset(usize),
        Restore(usize),
        Acquire(usize),
        Submit(usize, u32),
        Present(usize, u32),
    }

    /// Records calls and hands out images from a fixed sequence.
    struct ScriptedBackend {
        images: Vec<u32>,
        next_image: usize,
        calls: Vec<Call>,
        fail_submit: bool,
        fail_present: bool,
    }

    impl ScriptedBackend {
        fn new(images: &[u32]) -> Self {
            Self {
                images: images.to_vec(),
                next_image: 0,
                calls: Vec::new(),
                fail_submit: false,
                fail_present: false,
            }
        }
    }

    impl FrameBackend for ScriptedBackend {
        fn wait_for_slot(&mut self, slot: usize) -> RhiResult<()> {
            self.calls.push(Call::Wait(slot));
            Ok(())
        }

        fn reset_slot(&mut self, slot: usize) -> RhiResult<()> {
            self.calls.push(Call::Reset(slot));
            Ok(())
        }

        fn restore_slot(&mut self, slot: usize) -> RhiResult<()> {
            self.calls.push(Call::Restore(slot));
            Ok(())
        }

        fn acquire_image(&mut self, slot: usize) -> RhiResult<u32> {
            self.calls.push(Call::Acquire(slot));
            let image = self.images[self.next_image % self.images.len()];
            self.next_image += 1;
            Ok(image)
        }

        fn submit(&mut self, slot: usize, image_index: u32) -> RhiResult<()> {
            self.calls.push(Call::Submit(slot, image_index));
            if self.fail_submit {
                return Err(RhiError::SubmitFailed(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
            }
            Ok(())
        }

        fn present(&mut self, slot: usize, image_index: u32) -> RhiResult<()> {
            self.calls.push(Call::Present(slot, image_index));
            if self.fail_present {
                return Err(RhiError::SurfaceOutOfDate);
            }
            Ok(())
        }
    }

    #[test]
    fn test_rejects_zero_counts() {
        assert!(matches!(
            FrameScheduler::new(0, 3),
            Err(RhiError::InvalidConfig(_))
        ));
        assert!(matches!(
            FrameScheduler::new(2, 0),
            Err(RhiError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_first_frame_call_order() {
        let mut scheduler = FrameScheduler::new(2, 3).unwrap();
        let mut backend = ScriptedBackend::new(&[0]);

        let report = scheduler.draw_frame(&mut backend).unwrap();

        assert_eq!(
            report,
            FrameReport {
                slot: 0,
                image_index: 0,
                waited_on_slot: None
            }
        );
        assert_eq!(
            backend.calls,
            vec![
                Call::Wait(0),
                Call::Acquire(0),
                Call::Reset(0),
                Call::Submit(0, 0),
                Call::Present(0, 0),
            ]
        );
        assert_eq!(scheduler.current_frame(), 1);
        assert_eq!(scheduler.image_owner(0), Some(0));
        assert_eq!(scheduler.slot_state(0), Some(SlotState::Submitted));
        assert_eq!(scheduler.slot_state(1), Some(SlotState::Idle));
    }

    #[test]
    fn test_current_frame_cycles_independently_of_images() {
        let mut scheduler = FrameScheduler::new(2, 3).unwrap();
        let mut backend = ScriptedBackend::new(&[0, 1, 2]);

        let mut slots = Vec::new();
        let mut images = Vec::new();
        for _ in 0..6 {
            let report = scheduler.draw_frame(&mut backend).unwrap();
            slots.push(report.slot);
            images.push(report.image_index);
        }

        assert_eq!(slots, vec![0, 1, 0, 1, 0, 1]);
        assert_eq!(images, vec![0, 1, 2, 0, 1, 2]);
        assert_eq!(scheduler.frames_rendered(), 6);
    }

    #[test]
    fn test_guard_waits_on_previous_owner() {
        let mut scheduler = FrameScheduler::new(2, 3).unwrap();
        let mut backend = ScriptedBackend::new(&[0, 1, 2, 0]);

        for _ in 0..3 {
            scheduler.draw_frame(&mut backend).unwrap();
        }
        // Image 0 was last rendered by slot 0; frame 3 runs on slot 1.
        backend.calls.clear();
        let report = scheduler.draw_frame(&mut backend).unwrap();

        assert_eq!(report.slot, 1);
        assert_eq!(report.image_index, 0);
        assert_eq!(report.waited_on_slot, Some(0));
        assert_eq!(
            backend.calls,
            vec![
                Call::Wait(1),
                Call::Acquire(1),
                Call::Wait(0),
                Call::Reset(1),
                Call::Submit(1, 0),
                Call::Present(1, 0),
            ]
        );
        assert_eq!(scheduler.image_owner(0), Some(1));
    }

    #[test]
    fn test_guard_skips_wait_for_own_slot() {
        let mut scheduler = FrameScheduler::new(2, 2).unwrap();
        let mut backend = ScriptedBackend::new(&[0, 1]);

        for _ in 0..4 {
            let report = scheduler.draw_frame(&mut backend).unwrap();
            assert_eq!(report.waited_on_slot, None);
        }
    }

    #[test]
    fn test_error_does_not_advance() {
        let mut scheduler = FrameScheduler::new(2, 3).unwrap();
        let mut backend = ScriptedBackend::new(&[0]);
        backend.fail_present = true;

        let err = scheduler.draw_frame(&mut backend).unwrap_err();
        assert!(matches!(err, RhiError::SurfaceOutOfDate));
        assert_eq!(scheduler.current_frame(), 0);
        assert_eq!(scheduler.frames_rendered(), 0);
    }

    #[test]
    fn test_failed_submit_restores_slot() {
        let mut scheduler = FrameScheduler::new(2, 3).unwrap();
        let mut backend = ScriptedBackend::new(&[1]);
        backend.fail_submit = true;

        let err = scheduler.draw_frame(&mut backend).unwrap_err();

        assert!(matches!(err, RhiError::SubmitFailed(_)));
        assert_eq!(
            backend.calls,
            vec![
                Call::Wait(0),
                Call::Acquire(0),
                Call::Reset(0),
                Call::Submit(0, 1),
                Call::Restore(0),
            ]
        );
        assert_eq!(scheduler.current_frame(), 0);
        assert_eq!(scheduler.image_owner(1), None);
        assert_eq!(scheduler.slot_state(0), Some(SlotState::Idle));
    }

    #[test]
    fn test_out_of_range_image_rejected() {
        let mut scheduler = FrameScheduler::new(2, 2).unwrap();
        let mut backend = ScriptedBackend::new(&[5]);

        assert!(matches!(
            scheduler.draw_frame(&mut backend),
            Err(RhiError::InvalidConfig(_))
        ));
        assert!(!backend.calls.iter().any(|c| matches!(c, Call::Submit(..))));
    }

    #[test]
    fn test_slot_state_transitions() {
        let mut scheduler = FrameScheduler::new(2, 3).unwrap();
        let mut backend = ScriptedBackend::new(&[0, 1, 2]);

        scheduler.draw_frame(&mut backend).unwrap();
        scheduler.draw_frame(&mut backend).unwrap();
        assert_eq!(scheduler.slot_state(0), Some(SlotState::Submitted));
        assert_eq!(scheduler.slot_state(1), Some(SlotState::Submitted));

        // Slot 0 is throttled (observed complete), then resubmitted.
        scheduler.draw_frame(&mut backend).unwrap();
        assert_eq!(scheduler.slot_state(0), Some(SlotState::Submitted));
        assert_eq!(scheduler.slot_state(5), None);
    }
}
