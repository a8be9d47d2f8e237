use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use super::descriptor::{RequestDescriptor, RestMethod};
use super::params::RestParams;

/// Network-level failure, independent of the HTTP client in use
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Timeout waiting for response")]
    Timeout,

    #[error("IO error: {0}")]
    Io(String),
}

/// What an actor hands to the transport for one attempt
#[derive(Debug, Clone)]
pub struct RestRequest {
    pub method: RestMethod,
    pub path: String,
    pub params: RestParams,
}

impl<R> From<&RequestDescriptor<R>> for RestRequest {
    fn from(descriptor: &RequestDescriptor<R>) -> Self {
        RestRequest {
            method: descriptor.method(),
            path: descriptor.path().to_string(),
            params: descriptor.params().clone(),
        }
    }
}

/// Raw HTTP outcome; the actor classifies it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestResponse {
    pub status: u16,
    /// Parsed `Retry-After` header, when the venue sends one
    pub retry_after: Option<Duration>,
    pub body: String,
}

impl RestResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        RestResponse {
            status,
            retry_after: None,
            body: body.into(),
        }
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 429 Too Many Requests, or 418 which Binance-style venues send once an
    /// IP has been banned for ignoring 429s
    pub fn is_rate_limited(&self) -> bool {
        matches!(self.status, 429 | 418)
    }
}

/// Port for executing HTTP calls
///
/// Implemented by [`crate::infrastructure::ReqwestTransport`]; tests plug in
/// scripted transports.
#[async_trait]
pub trait RestTransport: Send + Sync {
    async fn send(&self, request: RestRequest) -> Result<RestResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(RestResponse::new(200, "{}").is_success());
        assert!(RestResponse::new(204, "").is_success());
        assert!(!RestResponse::new(429, "").is_success());
        assert!(RestResponse::new(429, "").is_rate_limited());
        assert!(RestResponse::new(418, "").is_rate_limited());
        assert!(!RestResponse::new(400, "").is_rate_limited());
    }
}
