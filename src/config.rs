//! Engine configuration.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_EVENT_CAPACITY, DEFAULT_POSITION_STEP, DEFAULT_TIMEOUT_MS, ENV_PREFIX, TEMP_ID_PREFIX,
};
use crate::error::SyncError;

/// Configuration for a synchronization engine instance.
///
/// Usually loaded once from a `taskboard.toml` file or the environment and
/// then handed to [`MutationCoordinator::with_config`](crate::MutationCoordinator::with_config).
///
/// # Example Configuration File
///
/// ```toml
/// position_step = 1000.0
/// temp_id_prefix = "temp-"
/// event_capacity = 256
///
/// [remote]
/// base_url = "https://tracker.example.com/api"
/// timeout_ms = 10000
/// headers = { "x-client" = "kanban" }
/// ```
///
/// # Examples
///
/// ```
/// use taskboard_sync::SyncConfig;
///
/// let config = SyncConfig::from_toml("position_step = 512.0").unwrap();
/// assert_eq!(config.position_step, 512.0);
/// assert_eq!(config.temp_id_prefix, "temp-");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Gap between consecutive position tokens in a status lane.
    #[serde(default = "default_position_step")]
    pub position_step: f64,

    /// Prefix for temporary ids of not-yet-confirmed tasks.
    #[serde(default = "default_temp_id_prefix")]
    pub temp_id_prefix: String,

    /// Capacity of the store event and mutation outcome channels.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Backend endpoint, used by the HTTP adapter.
    #[serde(default)]
    pub remote: RemoteEndpoint,
}

fn default_position_step() -> f64 {
    DEFAULT_POSITION_STEP
}

fn default_temp_id_prefix() -> String {
    TEMP_ID_PREFIX.to_string()
}

fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            position_step: default_position_step(),
            temp_id_prefix: default_temp_id_prefix(),
            event_capacity: default_event_capacity(),
            remote: RemoteEndpoint::default(),
        }
    }
}

impl SyncConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SyncError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, SyncError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to TOML.
    pub fn to_toml(&self) -> Result<String, SyncError> {
        toml::to_string_pretty(self).map_err(|e| SyncError::Serialization(e.to_string()))
    }

    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    ///
    /// - `TASKBOARD_SYNC_POSITION_STEP`
    /// - `TASKBOARD_SYNC_TEMP_ID_PREFIX`
    /// - `TASKBOARD_SYNC_EVENT_CAPACITY`
    /// - `TASKBOARD_SYNC_BASE_URL`
    /// - `TASKBOARD_SYNC_TIMEOUT_MS`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        let var = |name: &str| std::env::var(format!("{ENV_PREFIX}{name}")).ok();

        if let Some(step) = var("POSITION_STEP").and_then(|v| v.parse::<f64>().ok()) {
            if step > 0.0 {
                config.position_step = step;
            }
        }
        if let Some(prefix) = var("TEMP_ID_PREFIX").filter(|v| !v.is_empty()) {
            config.temp_id_prefix = prefix;
        }
        if let Some(capacity) = var("EVENT_CAPACITY").and_then(|v| v.parse::<usize>().ok()) {
            if capacity > 0 {
                config.event_capacity = capacity;
            }
        }
        if let Some(url) = var("BASE_URL") {
            config.remote.base_url = url;
        }
        if let Some(ms) = var("TIMEOUT_MS").and_then(|v| v.parse::<u64>().ok()) {
            config.remote.timeout_ms = ms;
        }

        config
    }

    /// Sets the position step.
    pub fn with_position_step(mut self, step: f64) -> Self {
        self.position_step = step;
        self
    }

    /// Sets the temporary id prefix.
    pub fn with_temp_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.temp_id_prefix = prefix.into();
        self
    }

    /// Sets the broadcast channel capacity.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Sets the remote endpoint.
    pub fn with_remote(mut self, remote: RemoteEndpoint) -> Self {
        self.remote = remote;
        self
    }

    /// Rejects values the engine cannot work with.
    pub fn validate(&self) -> Result<(), SyncError> {
        if !(self.position_step.is_finite() && self.position_step > 0.0) {
            return Err(SyncError::Configuration(format!(
                "position_step must be a positive number, got {}",
                self.position_step
            )));
        }
        if self.temp_id_prefix.is_empty() {
            return Err(SyncError::Configuration(
                "temp_id_prefix must not be empty".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(SyncError::Configuration(
                "event_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Connection settings for the remote task API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEndpoint {
    /// Base URL of the API, e.g. `https://tracker.example.com/api`.
    #[serde(default)]
    pub base_url: String,

    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,

    /// Extra headers sent with every request.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

impl Default for RemoteEndpoint {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_ms: default_timeout(),
            headers: HashMap::new(),
        }
    }
}

impl RemoteEndpoint {
    /// Create an endpoint for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Set the timeout.
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// The timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
