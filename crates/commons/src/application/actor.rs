use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use super::observer::{ExecutionObserver, ExecutionOutcome, ExecutionRecord, TracingObserver};
use super::quota_registry::{Acquisition, QuotaError, QuotaRegistry};
use crate::domain::{
    Endpoint, PermitRequest, RequestDescriptor, RestRequest, RestResponse, RestTransport,
    TransportError,
};

#[derive(Error, Debug)]
pub enum ActorError {
    #[error("Local quota exhausted, next permit in {retry_after:?}")]
    QuotaExceeded { retry_after: Duration },

    #[error("Server still rate limiting after {attempts} attempts (HTTP {code})")]
    RateLimitExhausted { attempts: u32, code: u16 },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("API error: HTTP {code} - {body}")]
    Api { code: u16, body: String },

    #[error("Failed to decode {response_type}: {source}")]
    Decode {
        response_type: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Quota(#[from] QuotaError),

    #[error("Malformed request descriptor: {0}")]
    MalformedDescriptor(String),
}

impl ActorError {
    fn outcome(&self) -> ExecutionOutcome {
        match self {
            ActorError::QuotaExceeded { .. } => ExecutionOutcome::QuotaExceeded,
            ActorError::RateLimitExhausted { .. } => ExecutionOutcome::RateLimitExhausted,
            ActorError::Transport(_) => ExecutionOutcome::TransportError,
            ActorError::Api { .. } => ExecutionOutcome::ApiError,
            ActorError::Decode { .. } => ExecutionOutcome::DecodeError,
            ActorError::Quota(_) | ActorError::MalformedDescriptor(_) => ExecutionOutcome::Fault,
        }
    }
}

/// Result of one transport attempt
enum Attempt {
    Delivered(RestResponse),
    /// The venue refused the call for exceeding its own rate limit
    ServerRejected {
        code: u16,
        retry_after: Option<Duration>,
    },
    Failed(TransportError),
}

impl Attempt {
    fn classify(result: Result<RestResponse, TransportError>) -> Self {
        match result {
            Ok(response) if response.is_rate_limited() => Attempt::ServerRejected {
                code: response.status,
                retry_after: response.retry_after,
            },
            Ok(response) => Attempt::Delivered(response),
            Err(err) => Attempt::Failed(err),
        }
    }
}

/// Exponential backoff between transport attempts
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total transport attempts, including the first
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl RetryPolicy {
    /// Delay after the `attempt`-th failed attempt (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let secs = self.initial_backoff.as_secs_f64() * self.multiplier.max(1.0).powi(exponent);
        Duration::from_secs_f64(secs.min(self.max_backoff.as_secs_f64()))
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActorPolicy {
    /// Longest cumulative wait for local permits before failing fast
    pub max_permit_wait: Duration,
    pub retry: RetryPolicy,
}

impl Default for ActorPolicy {
    fn default() -> Self {
        ActorPolicy {
            max_permit_wait: Duration::from_secs(5),
            retry: RetryPolicy::default(),
        }
    }
}

/// Execution context for one credential set / connection
///
/// Gates each attempt through the shared [`QuotaRegistry`], sends it through
/// the transport, backs off on server-side rate limiting and decodes the
/// typed response.
///
/// Dropping an `execute` future cancels the call. Permits already granted
/// for the cancelled attempt are not refunded: the venue may have seen the
/// request, so the budget stays consumed for the rest of its window.
pub struct Actor {
    name: String,
    quota: Arc<QuotaRegistry>,
    transport: Arc<dyn RestTransport>,
    policy: ActorPolicy,
    observer: Arc<dyn ExecutionObserver>,
}

impl Actor {
    pub fn new(
        name: impl Into<String>,
        quota: Arc<QuotaRegistry>,
        transport: Arc<dyn RestTransport>,
        policy: ActorPolicy,
    ) -> Self {
        Actor {
            name: name.into(),
            quota,
            transport,
            policy,
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> &ActorPolicy {
        &self.policy
    }

    /// Build the endpoint's descriptor and execute it
    pub async fn submit<E: Endpoint>(&self, endpoint: &E) -> Result<E::Response, ActorError> {
        self.execute(&endpoint.descriptor()).await
    }

    pub async fn execute<R: DeserializeOwned>(
        &self,
        descriptor: &RequestDescriptor<R>,
    ) -> Result<R, ActorError> {
        let started = Instant::now();
        let mut attempts = 0;
        let result = self.run(descriptor, &mut attempts).await;

        let outcome = match &result {
            Ok(_) => ExecutionOutcome::Success,
            Err(err) => err.outcome(),
        };
        self.observer.on_execution(&ExecutionRecord {
            actor: &self.name,
            method: descriptor.method(),
            path: descriptor.path(),
            attempts,
            elapsed: started.elapsed(),
            outcome,
        });

        result
    }

    async fn run<R: DeserializeOwned>(
        &self,
        descriptor: &RequestDescriptor<R>,
        attempts: &mut u32,
    ) -> Result<R, ActorError> {
        descriptor
            .validate()
            .map_err(ActorError::MalformedDescriptor)?;
        let retry = &self.policy.retry;

        loop {
            self.acquire_permits(descriptor.required_permits()).await?;
            *attempts += 1;

            let sent = self.transport.send(RestRequest::from(descriptor)).await;
            let backoff = match Attempt::classify(sent) {
                Attempt::Delivered(response) if response.is_success() => {
                    return serde_json::from_str(&response.body).map_err(|source| {
                        ActorError::Decode {
                            response_type: descriptor.response_type(),
                            source,
                        }
                    });
                }
                Attempt::Delivered(response) => {
                    return Err(ActorError::Api {
                        code: response.status,
                        body: response.body,
                    });
                }
                Attempt::ServerRejected { code, retry_after } => {
                    let backoff = retry
                        .backoff(*attempts)
                        .max(retry_after.unwrap_or_default());
                    if *attempts >= retry.attempts() || backoff > retry.max_backoff {
                        return Err(ActorError::RateLimitExhausted {
                            attempts: *attempts,
                            code,
                        });
                    }
                    warn!(
                        actor = %self.name,
                        path = descriptor.path(),
                        status = code,
                        attempt = *attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        "Server rate limit hit, backing off"
                    );
                    backoff
                }
                Attempt::Failed(err) => {
                    if *attempts >= retry.attempts() {
                        return Err(ActorError::Transport(err));
                    }
                    let backoff = retry.backoff(*attempts);
                    warn!(
                        actor = %self.name,
                        path = descriptor.path(),
                        error = %err,
                        attempt = *attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        "Transport failed, retrying"
                    );
                    backoff
                }
            };

            sleep(backoff).await;
        }
    }

    async fn acquire_permits(&self, permits: &[PermitRequest]) -> Result<(), ActorError> {
        let mut waited = Duration::ZERO;
        loop {
            match self.quota.try_acquire(permits)? {
                Acquisition::Granted => return Ok(()),
                Acquisition::Denied { retry_after } => {
                    if waited + retry_after > self.policy.max_permit_wait {
                        return Err(ActorError::QuotaExceeded { retry_after });
                    }
                    debug!(
                        actor = %self.name,
                        wait_ms = retry_after.as_millis() as u64,
                        "Waiting for permits"
                    );
                    sleep(retry_after).await;
                    waited += retry_after;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(1000),
            multiplier: 2.0,
        };

        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(4), Duration::from_millis(800));
        assert_eq!(policy.backoff(5), Duration::from_millis(1000));
        assert_eq!(policy.backoff(500), Duration::from_millis(1000));
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        let policy = RetryPolicy {
            max_attempts: 0,
            ..Default::default()
        };
        assert_eq!(policy.attempts(), 1);
    }

    #[test]
    fn test_error_outcomes() {
        assert_eq!(
            ActorError::QuotaExceeded {
                retry_after: Duration::from_secs(1)
            }
            .outcome(),
            ExecutionOutcome::QuotaExceeded
        );
        assert_eq!(
            ActorError::Quota(QuotaError::UnknownResource("x".into())).outcome(),
            ExecutionOutcome::Fault
        );
        assert_eq!(
            ActorError::Transport(TransportError::Timeout).outcome(),
            ExecutionOutcome::TransportError
        );
    }
}
