//! Frame time sources
//!
//! The frame driver reads the current time from a `Clock` and passes it
//! down explicitly, so every state machine below it is deterministic under
//! test.

use std::cell::Cell;
use std::time::{Duration, Instant};

/// Nominal duration of one display frame at 60 Hz
pub const FRAME: Duration = Duration::from_nanos(1_000_000_000 / 60);

/// Source of frame timestamps
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for simulations and tests
#[derive(Debug)]
pub struct ManualClock {
    now: Cell<Instant>,
}

impl ManualClock {
    pub fn new(start: Instant) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    /// Move time forward by `by`
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    /// Move time forward by `n` frames
    pub fn advance_frames(&self, n: u32) {
        self.advance(FRAME * n);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Instant::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let start = Instant::now();
        let clock = ManualClock::new(start);
        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.now() - start, Duration::from_millis(250));

        clock.advance_frames(60);
        let elapsed = clock.now() - start;
        assert!(elapsed > Duration::from_millis(1249));
        assert!(elapsed < Duration::from_millis(1251));
    }
}
