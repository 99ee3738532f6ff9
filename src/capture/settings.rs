use std::time::Duration;

pub const DEFAULT_LIVENESS_FRAMES: usize = 3;
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(400);
pub const DEFAULT_START_DELAY: Duration = Duration::from_millis(800);

/// Timings of the capture sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureSettings {
    /// Frames taken for a liveness check.
    pub liveness_frames: usize,
    /// Delay between two liveness frames.
    pub frame_interval: Duration,
    /// Wait before the first liveness frame.
    pub start_delay: Duration,
    /// Wait before the single enrollment frame.
    pub enrollment_settle: Duration,
    /// Hold after the enrollment frame, before verification.
    pub enrollment_hold: Duration,
    /// Wait before a retry starts scanning again.
    pub restart_delay: Duration,
    /// Wait after success before the flow reports completion.
    pub exit_delay: Duration,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            liveness_frames: DEFAULT_LIVENESS_FRAMES,
            frame_interval: DEFAULT_FRAME_INTERVAL,
            start_delay: DEFAULT_START_DELAY,
            enrollment_settle: Duration::from_millis(200),
            enrollment_hold: Duration::from_millis(400),
            restart_delay: Duration::from_millis(1500),
            exit_delay: Duration::from_millis(1200),
        }
    }
}

impl CaptureSettings {
    /// No pauses at all; for scripted runs.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            liveness_frames: DEFAULT_LIVENESS_FRAMES,
            frame_interval: Duration::ZERO,
            start_delay: Duration::ZERO,
            enrollment_settle: Duration::ZERO,
            enrollment_hold: Duration::ZERO,
            restart_delay: Duration::ZERO,
            exit_delay: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn with_liveness_frames(mut self, frames: usize) -> Self {
        self.liveness_frames = frames;
        self
    }

    #[must_use]
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    #[must_use]
    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }
}
