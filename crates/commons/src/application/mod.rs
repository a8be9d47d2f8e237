pub mod actor;
pub mod channel_registry;
pub mod dispatcher;
pub mod frame_decoder;
pub mod observer;
pub mod quota_registry;

pub use actor::{Actor, ActorError, ActorPolicy, RetryPolicy};
pub use channel_registry::{ChannelBinding, ChannelRegistry, RegistryError};
pub use dispatcher::{DEFAULT_MAX_CONSECUTIVE_FAILURES, Dispatch, DispatchStats, Dispatcher};
pub use frame_decoder::{
    DEFAULT_MAX_FRAME_BYTES, FrameCompression, FrameDecodeError, FrameDecoder, FrameError,
};
pub use observer::{ExecutionObserver, ExecutionOutcome, ExecutionRecord, TracingObserver};
pub use quota_registry::{Acquisition, QuotaError, QuotaRegistry, QuotaUsage, RateLimitRule};
