use tracing::{debug, error, warn};

use super::frame_decoder::{FrameDecodeError, FrameDecoder, FrameError};
use crate::domain::{InboundMessage, RawFrame};

pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 16;

/// Counters for one connection's frames
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub frames: u64,
    pub messages: u64,
    pub decode_failures: u64,
    pub unsupported: u64,
    pub unregistered: u64,
}

#[derive(Debug)]
pub enum Dispatch<M> {
    Message(InboundMessage<M>),
    /// Frame dropped; the connection is still usable
    Dropped(FrameError),
    /// Too many corrupt frames in a row, the stream can no longer be trusted
    Desync {
        consecutive_failures: u32,
        last_error: FrameDecodeError,
    },
}

/// Sequential frame dispatch for a single connection
///
/// Owns the failure streak, so each connection gets its own dispatcher and
/// frames must be fed in arrival order.
pub struct Dispatcher<M> {
    decoder: FrameDecoder<M>,
    max_consecutive_failures: u32,
    consecutive_failures: u32,
    stats: DispatchStats,
}

impl<M> Dispatcher<M> {
    pub fn new(decoder: FrameDecoder<M>) -> Self {
        Dispatcher {
            decoder,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
            consecutive_failures: 0,
            stats: DispatchStats::default(),
        }
    }

    /// 0 disables desync detection
    pub fn with_max_consecutive_failures(mut self, max: u32) -> Self {
        self.max_consecutive_failures = max;
        self
    }

    pub fn decoder(&self) -> &FrameDecoder<M> {
        &self.decoder
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    pub fn dispatch(&mut self, frame: &RawFrame) -> Dispatch<M> {
        self.stats.frames += 1;

        match self.decoder.decode(frame) {
            Ok(message) => {
                self.stats.messages += 1;
                self.consecutive_failures = 0;
                Dispatch::Message(message)
            }
            Err(FrameError::Decode(err)) => {
                self.stats.decode_failures += 1;
                self.consecutive_failures += 1;

                if self.max_consecutive_failures > 0
                    && self.consecutive_failures >= self.max_consecutive_failures
                {
                    error!(
                        consecutive_failures = self.consecutive_failures,
                        error = %err,
                        "Stream desynchronized"
                    );
                    return Dispatch::Desync {
                        consecutive_failures: self.consecutive_failures,
                        last_error: err,
                    };
                }

                warn!(
                    error = %err,
                    consecutive_failures = self.consecutive_failures,
                    "Dropping undecodable frame"
                );
                Dispatch::Dropped(FrameError::Decode(err))
            }
            Err(err @ FrameError::UnregisteredTopic(_)) => {
                self.stats.unregistered += 1;
                warn!(error = %err, "Dropping frame");
                Dispatch::Dropped(err)
            }
            Err(err @ FrameError::UnsupportedOperation(_)) => {
                self.stats.unsupported += 1;
                debug!(error = %err, "Ignoring frame");
                Dispatch::Dropped(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ChannelRegistry;
    use serde::Deserialize;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct Tick {
        px: u64,
    }

    fn dispatcher(max: u32) -> Dispatcher<Tick> {
        let registry = Arc::new(ChannelRegistry::new());
        registry.register::<Tick>("ticks").unwrap();
        Dispatcher::new(FrameDecoder::new(registry)).with_max_consecutive_failures(max)
    }

    #[test]
    fn test_counts_outcomes() {
        let mut dispatcher = dispatcher(4);

        let frames = [
            r#"{"op":"notify","topic":"ticks","px":1}"#,
            r#"{"op":"notify","topic":"other","px":1}"#,
            r#"{"op":"hello"}"#,
            "garbage",
            r#"{"op":"ping"}"#,
        ];
        for frame in frames {
            dispatcher.dispatch(&RawFrame::from(frame));
        }

        assert_eq!(
            dispatcher.stats(),
            DispatchStats {
                frames: 5,
                messages: 2,
                decode_failures: 1,
                unsupported: 1,
                unregistered: 1,
            }
        );
    }

    #[test]
    fn test_desync_after_consecutive_failures() {
        let mut dispatcher = dispatcher(3);

        assert!(matches!(
            dispatcher.dispatch(&RawFrame::from("x")),
            Dispatch::Dropped(_)
        ));
        assert!(matches!(
            dispatcher.dispatch(&RawFrame::from("x")),
            Dispatch::Dropped(_)
        ));
        match dispatcher.dispatch(&RawFrame::from("x")) {
            Dispatch::Desync {
                consecutive_failures,
                last_error,
            } => {
                assert_eq!(consecutive_failures, 3);
                assert!(matches!(last_error, FrameDecodeError::Json(_)));
            }
            other => panic!("expected desync, got {other:?}"),
        }
    }

    #[test]
    fn test_success_resets_streak() {
        let mut dispatcher = dispatcher(2);

        dispatcher.dispatch(&RawFrame::from("x"));
        assert!(matches!(
            dispatcher.dispatch(&RawFrame::from(r#"{"op":"ping"}"#)),
            Dispatch::Message(InboundMessage::Ping(_))
        ));
        assert!(matches!(
            dispatcher.dispatch(&RawFrame::from("x")),
            Dispatch::Dropped(_)
        ));
    }

    #[test]
    fn test_recoverable_errors_never_desync() {
        let mut dispatcher = dispatcher(1);

        for _ in 0..10 {
            assert!(matches!(
                dispatcher.dispatch(&RawFrame::from(r#"{"op":"notify","topic":"gone","px":1}"#)),
                Dispatch::Dropped(FrameError::UnregisteredTopic(_))
            ));
        }
        assert!(matches!(
            dispatcher.dispatch(&RawFrame::from(r#"{"op":"auth"}"#)),
            Dispatch::Dropped(FrameError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_zero_disables_desync() {
        let mut dispatcher = dispatcher(0);
        for _ in 0..100 {
            assert!(matches!(
                dispatcher.dispatch(&RawFrame::from("x")),
                Dispatch::Dropped(_)
            ));
        }
    }
}
