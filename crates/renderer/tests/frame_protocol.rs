//! Frames-in-flight protocol against a simulated GPU.
//!
//! The simulated GPU only completes a submission when the host waits on its
//! fence, which is the slowest GPU the protocol must tolerate. Hazards the
//! protocol exists to prevent fail the test from inside the backend.

use triangle_renderer::{FrameBackend, FrameReport, FrameScheduler, SlotState};
use triangle_rhi::{RhiError, RhiResult, vk};

#[derive(Debug, Clone, Copy)]
struct SimFence {
    signaled: bool,
    pending: Option<usize>,
}

#[derive(Debug)]
struct SimGpu {
    fences: Vec<SimFence>,
    image_count: u32,
    acquire_script: Vec<u32>,
    next_acquire: usize,
    /// Submission currently rendering into each image.
    image_busy: Vec<Option<usize>>,
    submissions: usize,
    max_outstanding: usize,
    fail_acquire_at: Option<usize>,
    fail_submit_at: Option<usize>,
    submit_calls: usize,
    fail_wait_with_device_lost: bool,
}

impl SimGpu {
    fn new(frames_in_flight: usize, image_count: u32) -> Self {
        Self {
            fences: vec![
                SimFence {
                    signaled: true,
                    pending: None,
                };
                frames_in_flight
            ],
            image_count,
            acquire_script: Vec::new(),
            next_acquire: 0,
            image_busy: vec![None; image_count as usize],
            submissions: 0,
            max_outstanding: 0,
            fail_acquire_at: None,
            fail_submit_at: None,
            submit_calls: 0,
            fail_wait_with_device_lost: false,
        }
    }

    fn with_acquire_script(mut self, script: &[u32]) -> Self {
        self.acquire_script = script.to_vec();
        self
    }

    fn outstanding(&self) -> usize {
        self.fences.iter().filter(|f| f.pending.is_some()).count()
    }

    fn unsignaled(&self) -> usize {
        self.fences.iter().filter(|f| !f.signaled).count()
    }
}

impl FrameBackend for SimGpu {
    fn wait_for_slot(&mut self, slot: usize) -> RhiResult<()> {
        if self.fail_wait_with_device_lost {
            return Err(RhiError::DeviceLost);
        }
        let fence = &mut self.fences[slot];
        assert!(
            fence.signaled || fence.pending.is_some(),
            "waiting on slot {} would deadlock: fence reset without submission",
            slot
        );
        if let Some(id) = fence.pending.take() {
            for busy in &mut self.image_busy {
                if *busy == Some(id) {
                    *busy = None;
                }
            }
        }
        fence.signaled = true;
        Ok(())
    }

    fn reset_slot(&mut self, slot: usize) -> RhiResult<()> {
        let fence = &mut self.fences[slot];
        assert!(fence.signaled, "slot {} reset while still pending", slot);
        fence.signaled = false;
        Ok(())
    }

    fn restore_slot(&mut self, slot: usize) -> RhiResult<()> {
        let fence = &mut self.fences[slot];
        assert!(fence.pending.is_none(), "slot {} restored while pending", slot);
        fence.signaled = true;
        Ok(())
    }

    fn acquire_image(&mut self, _slot: usize) -> RhiResult<u32> {
        let call = self.next_acquire;
        self.next_acquire += 1;
        if self.fail_acquire_at == Some(call) {
            return Err(RhiError::SurfaceOutOfDate);
        }
        if self.acquire_script.is_empty() {
            Ok(call as u32 % self.image_count)
        } else {
            Ok(self.acquire_script[call % self.acquire_script.len()])
        }
    }

    fn submit(&mut self, slot: usize, image_index: u32) -> RhiResult<()> {
        let call = self.submit_calls;
        self.submit_calls += 1;
        if self.fail_submit_at == Some(call) {
            return Err(RhiError::SubmitFailed(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
        }

        let image = image_index as usize;
        assert!(
            self.image_busy[image].is_none(),
            "image {} submitted while submission {:?} still renders into it",
            image,
            self.image_busy[image]
        );
        let fence = &mut self.fences[slot];
        assert!(!fence.signaled, "slot {} submitted without reset", slot);
        assert!(fence.pending.is_none(), "slot {} already pending", slot);

        let id = self.submissions;
        self.submissions += 1;
        fence.pending = Some(id);
        self.image_busy[image] = Some(id);

        self.max_outstanding = self.max_outstanding.max(self.outstanding());
        Ok(())
    }

    fn present(&mut self, _slot: usize, image_index: u32) -> RhiResult<()> {
        assert!(image_index < self.image_count);
        Ok(())
    }
}

fn run(scheduler: &mut FrameScheduler, gpu: &mut SimGpu, frames: usize) -> Vec<FrameReport> {
    (0..frames)
        .map(|_| scheduler.draw_frame(gpu).unwrap())
        .collect()
}

#[test]
fn test_three_images_two_slots() {
    let mut scheduler = FrameScheduler::new(2, 3).unwrap();
    let mut gpu = SimGpu::new(2, 3);

    let reports = run(&mut scheduler, &mut gpu, 12);

    let slots: Vec<_> = reports.iter().map(|r| r.slot).collect();
    assert_eq!(slots, vec![0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1]);
    assert!(gpu.max_outstanding <= 2);
    assert_eq!(scheduler.frames_rendered(), 12);
}

#[test]
fn test_more_slots_than_images_waits_on_owner() {
    let mut scheduler = FrameScheduler::new(3, 2).unwrap();
    let mut gpu = SimGpu::new(3, 2);

    let reports = run(&mut scheduler, &mut gpu, 3);

    // Frame 2 runs on slot 2 but gets image 0, still owned by slot 0.
    assert_eq!(reports[2].slot, 2);
    assert_eq!(reports[2].image_index, 0);
    assert_eq!(reports[2].waited_on_slot, Some(0));
    assert_eq!(scheduler.image_owner(0), Some(2));
    assert_eq!(scheduler.slot_state(0), Some(SlotState::Complete));
}

#[test]
fn test_single_image_serializes_slots() {
    let mut scheduler = FrameScheduler::new(2, 1).unwrap();
    let mut gpu = SimGpu::new(2, 1);

    let reports = run(&mut scheduler, &mut gpu, 6);

    assert_eq!(reports[0].waited_on_slot, None);
    for report in &reports[1..] {
        assert_eq!(report.waited_on_slot, Some(1 - report.slot));
    }
    assert_eq!(gpu.max_outstanding, 1);
}

#[test]
fn test_outstanding_work_bounded_by_slots() {
    for frames_in_flight in 1..=3 {
        for image_count in 1..=4u32 {
            let mut scheduler = FrameScheduler::new(frames_in_flight, image_count as usize).unwrap();
            let mut gpu = SimGpu::new(frames_in_flight, image_count);

            run(&mut scheduler, &mut gpu, 20);

            assert!(
                gpu.max_outstanding <= frames_in_flight,
                "{} slots over {} images reached {} outstanding submissions",
                frames_in_flight,
                image_count,
                gpu.max_outstanding
            );
            assert!(gpu.unsignaled() <= frames_in_flight);
        }
    }
}

#[test]
fn test_out_of_order_acquisition() {
    let mut scheduler = FrameScheduler::new(2, 3).unwrap();
    let mut gpu = SimGpu::new(2, 3).with_acquire_script(&[2, 0, 0, 1, 2, 2]);

    let reports = run(&mut scheduler, &mut gpu, 6);

    let images: Vec<_> = reports.iter().map(|r| r.image_index).collect();
    assert_eq!(images, vec![2, 0, 0, 1, 2, 2]);
    // Image 0 goes from slot 1 to slot 0; image 2 from slot 0 to slot 1.
    assert_eq!(reports[2].waited_on_slot, Some(1));
    assert_eq!(reports[5].waited_on_slot, Some(0));
}

#[test]
fn test_failed_acquire_keeps_current_frame() {
    let mut scheduler = FrameScheduler::new(2, 3).unwrap();
    let mut gpu = SimGpu::new(2, 3);
    gpu.fail_acquire_at = Some(1);

    scheduler.draw_frame(&mut gpu).unwrap();
    let err = scheduler.draw_frame(&mut gpu).unwrap_err();

    assert!(matches!(err, RhiError::SurfaceOutOfDate));
    assert_eq!(scheduler.current_frame(), 1);
    assert_eq!(scheduler.frames_rendered(), 1);

    // The slot's fence was not reset, so retrying does not deadlock.
    let report = scheduler.draw_frame(&mut gpu).unwrap();
    assert_eq!(report.slot, 1);
}

#[test]
fn test_failed_submit_then_retry_does_not_block() {
    let mut scheduler = FrameScheduler::new(2, 3).unwrap();
    let mut gpu = SimGpu::new(2, 3);
    gpu.fail_submit_at = Some(0);

    let err = scheduler.draw_frame(&mut gpu).unwrap_err();
    assert!(matches!(err, RhiError::SubmitFailed(_)));
    assert_eq!(scheduler.current_frame(), 0);
    assert!(gpu.fences[0].signaled);
    assert_eq!(scheduler.image_owner(0), None);

    // The retry throttles on slot 0 again; the simulated GPU would fail the
    // wait if the fence had been left reset with nothing queued.
    let reports = run(&mut scheduler, &mut gpu, 4);
    let slots: Vec<_> = reports.iter().map(|r| r.slot).collect();
    assert_eq!(slots, vec![0, 1, 0, 1]);
    assert_eq!(scheduler.frames_rendered(), 4);
}

#[test]
fn test_device_lost_propagates() {
    let mut scheduler = FrameScheduler::new(2, 3).unwrap();
    let mut gpu = SimGpu::new(2, 3);
    gpu.fail_wait_with_device_lost = true;

    let err = scheduler.draw_frame(&mut gpu).unwrap_err();
    assert!(matches!(err, RhiError::DeviceLost));
    assert_eq!(scheduler.current_frame(), 0);
    assert_eq!(gpu.submissions, 0);
}
