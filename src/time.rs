//! Frame delta measurement for the caller's loop.

use instant::{Duration, Instant};

/// Measures the time between consecutive frames.
#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    last: Instant,
    /// Deltas are clamped to this so a stalled frame does not fling the scene.
    max_delta: Duration,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(Duration::from_millis(250))
    }
}

impl FrameClock {
    pub fn new(max_delta: Duration) -> Self {
        Self {
            last: Instant::now(),
            max_delta,
        }
    }

    /// Seconds since the previous tick (or since construction).
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let dt = now.duration_since(self.last).min(self.max_delta);
        self.last = now;
        dt.as_secs_f32()
    }

    /// Forgets the time spent since the last tick, e.g. after regaining focus.
    pub fn reset(&mut self) {
        self.last = Instant::now();
    }
}
