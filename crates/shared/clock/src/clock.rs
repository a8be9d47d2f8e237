use std::time::Instant;

/// Port for monotonic time
///
/// Quota windows only ever compare instants against each other, so the
/// clock hands out `Instant`s rather than wall-clock timestamps:
/// - Real OS time for production
/// - Tokio time so paused tests drive the windows
/// - Manually advanced time for deterministic tests
pub trait Clock: Send + Sync {
    /// Get the current instant according to this clock
    fn now(&self) -> Instant;

    /// Get the clock's name/identifier for debugging
    fn name(&self) -> &str {
        "Clock"
    }
}
