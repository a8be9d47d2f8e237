//! Infrastructure Layer - adapters to the network
//!
//! - ReqwestTransport: HTTP implementation of `RestTransport`
//! - WsSession: WebSocket push session feeding the dispatcher

pub mod rest_client;
pub mod ws_client;

pub use rest_client::{QueryEscaping, ReqwestTransport, RestClientConfig, RestClientError};
pub use ws_client::{WsError, WsEvent, WsSession, WsSubscriber};
