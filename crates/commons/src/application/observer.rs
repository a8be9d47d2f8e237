//! Execution Observer
//!
//! Every `Actor::execute` call is timed and reported here, successful or
//! not. Metrics backends implement [`ExecutionObserver`]; the default
//! [`TracingObserver`] just logs.

use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::RestMethod;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Success,
    QuotaExceeded,
    RateLimitExhausted,
    TransportError,
    ApiError,
    DecodeError,
    /// Misconfigured permits or a malformed descriptor
    Fault,
}

impl ExecutionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionOutcome::Success => "success",
            ExecutionOutcome::QuotaExceeded => "quota_exceeded",
            ExecutionOutcome::RateLimitExhausted => "rate_limit_exhausted",
            ExecutionOutcome::TransportError => "transport_error",
            ExecutionOutcome::ApiError => "api_error",
            ExecutionOutcome::DecodeError => "decode_error",
            ExecutionOutcome::Fault => "fault",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionRecord<'a> {
    pub actor: &'a str,
    pub method: RestMethod,
    pub path: &'a str,
    /// Transport attempts made (0 if permits were never obtained)
    pub attempts: u32,
    pub elapsed: Duration,
    pub outcome: ExecutionOutcome,
}

pub trait ExecutionObserver: Send + Sync {
    fn on_execution(&self, record: &ExecutionRecord<'_>);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ExecutionObserver for TracingObserver {
    fn on_execution(&self, record: &ExecutionRecord<'_>) {
        if record.outcome == ExecutionOutcome::Success {
            debug!(
                actor = record.actor,
                method = %record.method,
                path = record.path,
                attempts = record.attempts,
                elapsed_ms = record.elapsed.as_millis() as u64,
                "Request executed"
            );
        } else {
            warn!(
                actor = record.actor,
                method = %record.method,
                path = record.path,
                attempts = record.attempts,
                elapsed_ms = record.elapsed.as_millis() as u64,
                outcome = record.outcome.as_str(),
                "Request failed"
            );
        }
    }
}
