//! Invoker Clock
//!
//! Monotonic time sources for rate-limit bookkeeping:
//!
//! - [`SystemClock`]: `std::time::Instant` straight from the OS
//! - [`TokioClock`]: follows tokio's clock, so paused test time
//!   (`#[tokio::test(start_paused = true)]`) also moves quota windows
//! - [`ManualClock`]: only advances when told to, for deterministic tests
//!
//! ## Usage
//!
//! ```ignore
//! use invoker_clock::{Clock, ManualClock};
//! use std::time::Duration;
//!
//! let clock = ManualClock::new();
//! let start = clock.now();
//! clock.advance(Duration::from_secs(10));
//! assert_eq!(clock.now() - start, Duration::from_secs(10));
//! ```

mod clock;
mod manual;
mod system;

pub use clock::Clock;
pub use manual::ManualClock;
pub use system::{SystemClock, TokioClock};
