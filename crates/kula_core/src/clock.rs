//! Game clock and frame time
//!
//! [`GameClock`] samples a monotonic clock; [`GameTime`] is the value the
//! rest of the engine reads. Headless runs and tests drive `GameTime`
//! directly with [`GameTime::advance`].

use std::time::{Duration, Instant};

/// Time snapshot for the current frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GameTime {
    total: Duration,
    elapsed: Duration,
}

impl GameTime {
    /// Create a time snapshot at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a snapshot at an absolute total time
    pub fn at(total: Duration) -> Self {
        Self {
            total,
            elapsed: Duration::ZERO,
        }
    }

    /// Advance by a frame step
    pub fn advance(&mut self, step: Duration) {
        self.elapsed = step;
        self.total += step;
    }

    /// Total time since the clock started
    pub fn total(&self) -> Duration {
        self.total
    }

    /// Time since the previous frame
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Total time in milliseconds
    pub fn total_ms(&self) -> u64 {
        self.total.as_millis() as u64
    }

    /// Frame time in milliseconds
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed.as_millis() as u64
    }

    /// Total time in seconds
    pub fn total_seconds(&self) -> f32 {
        self.total.as_secs_f32()
    }

    /// Frame time in seconds
    pub fn elapsed_seconds(&self) -> f32 {
        self.elapsed.as_secs_f32()
    }
}

/// Monotonic clock feeding [`GameTime`]
#[derive(Debug, Clone, Copy)]
pub struct GameClock {
    start: Instant,
    last: Instant,
}

impl GameClock {
    /// Start a clock now
    pub fn new() -> Self {
        let now = Instant::now();
        Self { start: now, last: now }
    }

    /// Restart from now and zero the given time
    pub fn reset(&mut self, time: &mut GameTime) {
        *self = Self::new();
        *time = GameTime::new();
    }

    /// Sample the clock into `time`
    pub fn update(&mut self, time: &mut GameTime) {
        let now = Instant::now();
        time.elapsed = now - self.last;
        time.total = now - self.start;
        self.last = now;
    }
}

impl Default for GameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance() {
        let mut time = GameTime::new();
        time.advance(Duration::from_millis(16));
        time.advance(Duration::from_millis(16));

        assert_eq!(time.total_ms(), 32);
        assert_eq!(time.elapsed_ms(), 16);
        assert!((time.total_seconds() - 0.032).abs() < 1e-6);
    }

    #[test]
    fn test_clock_is_monotonic() {
        let mut clock = GameClock::new();
        let mut time = GameTime::new();
        clock.update(&mut time);
        let first = time.total();
        clock.update(&mut time);
        assert!(time.total() >= first);
    }
}
