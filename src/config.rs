//! Client configuration.
//!
//! All options are plain values consumed at construction time; there is no
//! dynamic reconfiguration at runtime.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Properties;

/// The placeholder credential every quickstart snippet ships. Using it
/// verbatim is always a mistake, so construction rejects it outright.
pub const PLACEHOLDER_API_KEY: &str = "YOUR_API_KEY";

/// Default delay before retrying after a throttling or transient failure.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(15);

/// Default coalescing window before each dispatch iteration.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(2);

/// Default interval between background persistence saves.
pub const DEFAULT_SAVE_INTERVAL: Duration = Duration::from_secs(10);

/// Default upper bound on the number of events per remote batch.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 30;

/// Errors detected while validating a configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The API key was empty.
    #[error("API key must not be empty")]
    EmptyApiKey,

    /// The API key was the documentation placeholder, used verbatim.
    #[error("API key is the documentation placeholder '{PLACEHOLDER_API_KEY}'")]
    PlaceholderApiKey,
}

/// Regional ingestion endpoint the sender should target.
///
/// The core never builds URLs; this flag is carried for the sender
/// implementation to consume.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerZone {
    /// The global ingestion endpoint.
    #[default]
    Global,
    /// The EU-residency ingestion endpoint.
    Eu,
}

/// Configuration for a [`Beacon`](crate::client::Beacon) instance.
#[derive(Debug, Clone)]
pub struct BeaconConfig {
    /// Credential passed through to the sender.
    pub api_key: String,

    /// Delay before retrying after a throttled or transient failure.
    pub backoff: Duration,

    /// Coalescing window slept at the top of each dispatch iteration while
    /// the queue is non-empty. Zero disables the window.
    pub flush_interval: Duration,

    /// Age past which queued events are dropped by the TTL sweep. `None`
    /// disables expiry.
    pub event_ttl: Option<Duration>,

    /// Interval between background persistence saves. Zero disables the
    /// timer but leaves startup-load and shutdown-save active.
    pub save_interval: Duration,

    /// Regional endpoint residency.
    pub server_zone: ServerZone,

    /// Properties merged into every event; event-specific keys win on
    /// conflict.
    pub default_properties: Properties,

    /// Upper bound on events per remote batch. The dispatch loop may lower
    /// its working copy when the server reports oversized payloads.
    pub max_batch_size: usize,
}

impl BeaconConfig {
    /// Creates a configuration with the given API key and default settings.
    pub fn new(api_key: impl Into<String>) -> Self {
        BeaconConfig {
            api_key: api_key.into(),
            backoff: DEFAULT_BACKOFF,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            event_ttl: None,
            save_interval: DEFAULT_SAVE_INTERVAL,
            server_zone: ServerZone::default(),
            default_properties: Properties::new(),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }

    /// Sets the retry backoff delay.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets the batch coalescing window. Zero disables it.
    pub fn with_flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = flush_interval;
        self
    }

    /// Sets the queue-entry time-to-live.
    pub fn with_event_ttl(mut self, ttl: Duration) -> Self {
        self.event_ttl = Some(ttl);
        self
    }

    /// Sets the background persistence-save interval. Zero disables the
    /// periodic timer.
    pub fn with_save_interval(mut self, interval: Duration) -> Self {
        self.save_interval = interval;
        self
    }

    /// Selects the regional ingestion endpoint.
    pub fn with_server_zone(mut self, zone: ServerZone) -> Self {
        self.server_zone = zone;
        self
    }

    /// Sets properties merged into every event.
    pub fn with_default_properties(mut self, properties: Properties) -> Self {
        self.default_properties = properties;
        self
    }

    /// Sets the maximum events per batch (clamped to at least 1).
    pub fn with_max_batch_size(mut self, max: usize) -> Self {
        self.max_batch_size = max.max(1);
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for an empty or placeholder API key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.is_empty() {
            return Err(ConfigError::EmptyApiKey);
        }
        if self.api_key == PLACEHOLDER_API_KEY {
            return Err(ConfigError::PlaceholderApiKey);
        }
        Ok(())
    }
}
