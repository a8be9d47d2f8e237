use parking_lot::Mutex;
use std::time::{Duration, Instant};

use crate::Clock;

/// Clock that only moves when explicitly advanced
///
/// Starts at the instant it was created and stays frozen there. Cloning is
/// not supported; share it behind an `Arc` so every component sees the same
/// offset.
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Jump forward by `by`
    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }

    /// Total time advanced since creation
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock()
    }

    fn name(&self) -> &str {
        "ManualClock"
    }
}
