//! Invoker Commons
//!
//! Connectivity core shared by exchange API clients.
//!
//! # Architecture
//!
//! Request path: an [`Endpoint`] yields a [`RequestDescriptor`]; an [`Actor`]
//! takes the declared permits from the shared [`QuotaRegistry`], sends the
//! request through a [`RestTransport`], backs off when the server rate
//! limits and decodes the typed response.
//!
//! Push path: a [`WsSession`] feeds raw frames to a per-connection
//! [`Dispatcher`]; its [`FrameDecoder`] decompresses, classifies on `op` and
//! routes `notify` frames through the topic table in [`ChannelRegistry`].
//!
//! ```text
//!  Endpoint ──► RequestDescriptor ──► Actor ──► RestTransport ──► venue
//!                                       │
//!                                       ▼
//!                                QuotaRegistry (shared, per resource locks)
//!
//!  venue ──► WsSession ──► Dispatcher ──► FrameDecoder ──► WsEvent<M>
//!                 ▲                            │
//!                 └──── WsSubscriber ────► ChannelRegistry (topic → decoder)
//! ```

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export key types
pub use domain::{
    Close, Confirmation, Endpoint, Escaper, InboundMessage, NoEscaper, ParamError, ParamValue,
    PermitRequest, Ping, RawFrame, RequestDescriptor, RestMethod, RestParams, RestParamsBuilder,
    RestRequest, RestResponse, RestTransport, TransportError, UrlEscaper, WsRequest,
};

pub use application::{
    Acquisition, Actor, ActorError, ActorPolicy, ChannelBinding, ChannelRegistry, Dispatch,
    DispatchStats, Dispatcher, ExecutionObserver, ExecutionOutcome, ExecutionRecord,
    FrameCompression, FrameDecodeError, FrameDecoder, FrameError, QuotaError, QuotaRegistry,
    QuotaUsage, RateLimitRule, RegistryError, RetryPolicy, TracingObserver,
};

pub use infrastructure::{
    QueryEscaping, ReqwestTransport, RestClientConfig, RestClientError, WsError, WsEvent,
    WsSession, WsSubscriber,
};

pub use config::{
    ConfigError, InvokerConfigFile, VenueConfig, load_config, load_config_from_str,
    load_default_config,
};

pub use invoker_clock::{Clock, ManualClock, SystemClock, TokioClock};
