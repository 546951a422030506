//! Frame pacing statistics.

use std::time::{Duration, Instant};

/// Frame rate measured over one reporting window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRateSample {
    /// Frames presented during the window.
    pub frames: u32,
    /// Length of the window.
    pub window: Duration,
    /// Total frames presented since the timer was created.
    pub total_frames: u64,
}

impl FrameRateSample {
    /// Frames per second over the window.
    pub fn fps(&self) -> f64 {
        let secs = self.window.as_secs_f64();
        if secs > 0.0 {
            f64::from(self.frames) / secs
        } else {
            0.0
        }
    }

    /// Average frame time in milliseconds.
    pub fn frame_time_ms(&self) -> f64 {
        if self.frames == 0 {
            return 0.0;
        }
        self.window.as_secs_f64() * 1000.0 / f64::from(self.frames)
    }
}

/// Counts presented frames and yields a [`FrameRateSample`] once per
/// reporting interval.
#[derive(Debug)]
pub struct FrameTimer {
    start: Instant,
    window_start: Instant,
    report_interval: Duration,
    frames_in_window: u32,
    total_frames: u64,
}

impl FrameTimer {
    /// Create a timer reporting every `report_interval`, starting from now.
    pub fn new(report_interval: Duration) -> Self {
        Self::starting_at(Instant::now(), report_interval)
    }

    fn starting_at(now: Instant, report_interval: Duration) -> Self {
        Self {
            start: now,
            window_start: now,
            report_interval,
            frames_in_window: 0,
            total_frames: 0,
        }
    }

    /// Total time since the timer was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Total frames recorded so far.
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Record one presented frame.
    ///
    /// Returns a sample when the current reporting window has elapsed and
    /// starts a new window.
    pub fn record_frame(&mut self) -> Option<FrameRateSample> {
        self.record_frame_at(Instant::now())
    }

    fn record_frame_at(&mut self, now: Instant) -> Option<FrameRateSample> {
        self.frames_in_window += 1;
        self.total_frames += 1;

        let window = now.saturating_duration_since(self.window_start);
        if window < self.report_interval {
            return None;
        }

        let sample = FrameRateSample {
            frames: self.frames_in_window,
            window,
            total_frames: self.total_frames,
        };
        self.window_start = now;
        self.frames_in_window = 0;
        Some(sample)
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_sample_before_interval() {
        let t0 = Instant::now();
        let mut timer = FrameTimer::starting_at(t0, Duration::from_secs(1));

        for i in 1..10 {
            assert!(timer.record_frame_at(t0 + Duration::from_millis(i * 50)).is_none());
        }
        assert_eq!(timer.total_frames(), 9);
    }

    #[test]
    fn test_sample_after_interval_resets_window() {
        let t0 = Instant::now();
        let mut timer = FrameTimer::starting_at(t0, Duration::from_secs(1));

        for i in 1..60 {
            timer.record_frame_at(t0 + Duration::from_millis(i * 10));
        }
        let sample = timer
            .record_frame_at(t0 + Duration::from_secs(1))
            .expect("interval elapsed");
        assert_eq!(sample.frames, 60);
        assert_eq!(sample.total_frames, 60);
        assert!((sample.fps() - 60.0).abs() < 1e-9);

        // A fresh window begins after the sample.
        assert!(timer.record_frame_at(t0 + Duration::from_millis(1100)).is_none());
        assert_eq!(timer.total_frames(), 61);
    }

    #[test]
    fn test_frame_time_of_empty_sample() {
        let sample = FrameRateSample {
            frames: 0,
            window: Duration::ZERO,
            total_frames: 0,
        };
        assert_eq!(sample.fps(), 0.0);
        assert_eq!(sample.frame_time_ms(), 0.0);
    }
}
