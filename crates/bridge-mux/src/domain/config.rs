//! Multiplexer configuration with validation.
//!
//! Defaults reproduce the plain behaviour: no request timeout, UUID v7
//! identifiers. Every field can be overridden from the environment.

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::correlation::IdStrategy;
use crate::error::ConfigError;

/// Multiplexer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MuxConfig {
    /// Pending requests older than this are rejected with `Expired`.
    /// `None` keeps them until a result arrives.
    pub request_timeout_ms: Option<u64>,
    /// How often the expiry sweeper runs when a timeout is set.
    pub sweep_interval_ms: u64,
    /// Identifier generator.
    pub id_strategy: IdStrategy,
    /// Buffer size of the in-memory channel transport.
    pub channel_capacity: usize,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: None,
            sweep_interval_ms: 1_000,
            id_strategy: IdStrategy::UuidV7,
            channel_capacity: 1024,
        }
    }
}

impl MuxConfig {
    /// Load from environment variables on top of the defaults.
    ///
    /// # Environment Variables
    ///
    /// - `BRIDGE_REQUEST_TIMEOUT_MS`: request timeout, `0` or `none` disables
    /// - `BRIDGE_SWEEP_INTERVAL_MS`: expiry sweep period (default: 1000)
    /// - `BRIDGE_ID_STRATEGY`: `uuid_v7` or `sequential` (default: uuid_v7)
    /// - `BRIDGE_CHANNEL_CAPACITY`: channel buffer (default: 1024)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`MuxConfig::from_env`] with an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("BRIDGE_REQUEST_TIMEOUT_MS") {
            config.request_timeout_ms = match raw.trim() {
                "" | "0" | "none" => None,
                value => Some(parse("BRIDGE_REQUEST_TIMEOUT_MS", value)?),
            };
        }
        if let Some(raw) = lookup("BRIDGE_SWEEP_INTERVAL_MS") {
            config.sweep_interval_ms = parse("BRIDGE_SWEEP_INTERVAL_MS", raw.trim())?;
        }
        if let Some(raw) = lookup("BRIDGE_ID_STRATEGY") {
            config.id_strategy = raw.parse()?;
        }
        if let Some(raw) = lookup("BRIDGE_CHANNEL_CAPACITY") {
            config.channel_capacity = parse("BRIDGE_CHANNEL_CAPACITY", raw.trim())?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_ms == Some(0) {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.request_timeout_ms.is_some() && self.sweep_interval_ms == 0 {
            return Err(ConfigError::ZeroSweepInterval);
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::ZeroChannelCapacity);
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Builder-style timeout override.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_id_strategy(mut self, strategy: IdStrategy) -> Self {
        self.id_strategy = strategy;
        self
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}
