//! Capture timestamps
//!
//! Simple monotonic clock shared by a source's capture context.

use std::sync::Arc;
use std::time::Instant;

/// Monotonic clock for frame timestamps.
///
/// Clones share the same time zero.
#[derive(Debug, Clone)]
pub struct CaptureClock {
    start: Arc<Instant>,
}

impl CaptureClock {
    pub fn new() -> Self {
        Self {
            start: Arc::new(Instant::now()),
        }
    }

    /// Microseconds since the clock was created
    #[inline]
    pub fn micros(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    /// Seconds since the clock was created
    #[inline]
    pub fn secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for CaptureClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_clock_is_monotonic_and_shared() {
        let clock = CaptureClock::new();
        let shared = clock.clone();
        let a = clock.micros();
        std::thread::sleep(Duration::from_millis(2));
        let b = shared.micros();
        assert!(b > a);
        assert!(shared.secs() >= 0.002);
    }
}
