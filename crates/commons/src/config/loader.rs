use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

use super::types::{InvokerConfigFile, VenueConfig};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("No enabled venues in config")]
    NoEnabledVenues,
    #[error("Venue not found: {0}")]
    VenueNotFound(String),
    #[error("Duplicate venue id: {0}")]
    DuplicateVenue(String),
    #[error("Venue {venue}: resource {resource} is configured twice")]
    DuplicateResource { venue: String, resource: String },
    #[error("Venue {venue}: invalid rate limit for {resource}: {reason}")]
    InvalidRateLimit {
        venue: String,
        resource: String,
        reason: &'static str,
    },
    #[error("Venue {venue}: invalid actor policy: {reason}")]
    InvalidPolicy { venue: String, reason: &'static str },
}

/// Load configuration from a JSON file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<InvokerConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Load configuration from a JSON string
pub fn load_config_from_str(json: &str) -> Result<InvokerConfigFile, ConfigError> {
    let config: InvokerConfigFile = serde_json::from_str(json)?;
    Ok(config)
}

/// Load the default embedded configuration
pub fn load_default_config() -> Result<InvokerConfigFile, ConfigError> {
    let default_config = include_str!("default_config.json");
    load_config_from_str(default_config)
}

impl InvokerConfigFile {
    /// Get only enabled venues
    pub fn enabled_venues(&self) -> Vec<&VenueConfig> {
        self.venues.iter().filter(|v| v.enabled).collect()
    }

    /// Get a specific venue by ID
    pub fn venue(&self, id: &str) -> Result<&VenueConfig, ConfigError> {
        self.venues
            .iter()
            .find(|v| v.id == id)
            .ok_or_else(|| ConfigError::VenueNotFound(id.to_string()))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled_venues().is_empty() {
            return Err(ConfigError::NoEnabledVenues);
        }

        let mut ids = HashSet::new();
        for venue in &self.venues {
            if !ids.insert(venue.id.as_str()) {
                return Err(ConfigError::DuplicateVenue(venue.id.clone()));
            }
            venue.validate()?;
        }
        Ok(())
    }
}

impl VenueConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut resources = HashSet::new();
        for limit in &self.rate_limits {
            let invalid = |reason: &'static str| ConfigError::InvalidRateLimit {
                venue: self.id.clone(),
                resource: limit.resource.clone(),
                reason,
            };
            if limit.resource.is_empty() {
                return Err(invalid("resource name is empty"));
            }
            if limit.capacity == 0 {
                return Err(invalid("capacity must be positive"));
            }
            if limit.window_ms == 0 {
                return Err(invalid("window must be positive"));
            }
            if !resources.insert(limit.resource.as_str()) {
                return Err(ConfigError::DuplicateResource {
                    venue: self.id.clone(),
                    resource: limit.resource.clone(),
                });
            }
        }

        let invalid = |reason: &'static str| ConfigError::InvalidPolicy {
            venue: self.id.clone(),
            reason,
        };
        let actor = &self.actor;
        if actor.max_attempts == 0 {
            return Err(invalid("max_attempts must be at least 1"));
        }
        if !actor.backoff_multiplier.is_finite() || actor.backoff_multiplier < 1.0 {
            return Err(invalid("backoff_multiplier must be a finite value >= 1"));
        }
        if actor.initial_backoff_ms > actor.max_backoff_ms {
            return Err(invalid("initial_backoff_ms exceeds max_backoff_ms"));
        }
        Ok(())
    }
}
