use std::time::Instant;

use crate::Clock;

/// Real monotonic clock for production use
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn name(&self) -> &str {
        "SystemClock"
    }
}

/// Clock backed by the tokio timer
///
/// Outside of tests this is the OS clock. Under a paused runtime it reports
/// the virtual time that `tokio::time::sleep` advances, which keeps quota
/// windows consistent with the sleeps an actor performs while waiting.
pub struct TokioClock;

impl TokioClock {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn name(&self) -> &str {
        "TokioClock"
    }
}
