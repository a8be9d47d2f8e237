use invoker_clock::Clock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::application::{
    ActorPolicy, DEFAULT_MAX_CONSECUTIVE_FAILURES, DEFAULT_MAX_FRAME_BYTES, FrameCompression,
    QuotaRegistry, RateLimitRule, RetryPolicy,
};
use crate::infrastructure::{QueryEscaping, RestClientConfig};

/// Root configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokerConfigFile {
    pub venues: Vec<VenueConfig>,
}

/// Configuration for a single venue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    /// Unique identifier (e.g., "ftx", "hbdm")
    pub id: String,
    /// Display name
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// REST API base URL
    pub rest_base_url: String,
    /// Push stream URL
    #[serde(default)]
    pub ws_url: Option<String>,
    /// One entry per rate-limited resource
    #[serde(default)]
    pub rate_limits: Vec<RateLimitConfig>,
    #[serde(default)]
    pub actor: ActorConfig,
    #[serde(default)]
    pub rest: RestConfig,
    #[serde(default)]
    pub websocket: WebSocketConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub resource: String,
    pub capacity: u32,
    pub window_ms: u64,
}

impl RateLimitConfig {
    pub fn to_rule(&self) -> RateLimitRule {
        RateLimitRule::new(
            self.resource.clone(),
            self.capacity,
            Duration::from_millis(self.window_ms),
        )
    }
}

/// Permit wait and server-side retry settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorConfig {
    #[serde(default = "default_max_permit_wait")]
    pub max_permit_wait_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for ActorConfig {
    fn default() -> Self {
        ActorConfig {
            max_permit_wait_ms: default_max_permit_wait(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl ActorConfig {
    pub fn to_policy(&self) -> ActorPolicy {
        ActorPolicy {
            max_permit_wait: Duration::from_millis(self.max_permit_wait_ms),
            retry: RetryPolicy {
                max_attempts: self.max_attempts,
                initial_backoff: Duration::from_millis(self.initial_backoff_ms),
                max_backoff: Duration::from_millis(self.max_backoff_ms),
                multiplier: self.backoff_multiplier,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestConfig {
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub query_escaping: QueryEscaping,
    /// Static headers sent with every request
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl Default for RestConfig {
    fn default() -> Self {
        RestConfig {
            request_timeout_ms: default_request_timeout(),
            query_escaping: QueryEscaping::default(),
            headers: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSocketConfig {
    #[serde(default)]
    pub compression: FrameCompression,
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
    /// Cap on a binary frame after decompression
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        WebSocketConfig {
            compression: FrameCompression::default(),
            max_consecutive_failures: default_max_consecutive_failures(),
            event_buffer: default_event_buffer(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl VenueConfig {
    pub fn rate_limit_rules(&self) -> Vec<RateLimitRule> {
        self.rate_limits.iter().map(RateLimitConfig::to_rule).collect()
    }

    /// Fresh quota registry for this venue's resources
    pub fn quota_registry(&self, clock: Arc<dyn Clock>) -> QuotaRegistry {
        QuotaRegistry::new(self.rate_limit_rules(), clock)
    }

    pub fn actor_policy(&self) -> ActorPolicy {
        self.actor.to_policy()
    }

    pub fn rest_client_config(&self) -> RestClientConfig {
        RestClientConfig {
            base_url: self.rest_base_url.clone(),
            request_timeout: Duration::from_millis(self.rest.request_timeout_ms),
            query_escaping: self.rest.query_escaping,
            default_headers: self.rest.headers.clone(),
        }
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_max_permit_wait() -> u64 {
    5_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    500
}

fn default_max_backoff() -> u64 {
    10_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_request_timeout() -> u64 {
    10_000
}

fn default_max_consecutive_failures() -> u32 {
    DEFAULT_MAX_CONSECUTIVE_FAILURES
}

fn default_event_buffer() -> usize {
    1024
}

fn default_max_frame_bytes() -> usize {
    DEFAULT_MAX_FRAME_BYTES
}
