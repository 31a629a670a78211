//! # Bridge Telemetry
//!
//! Structured logging for the worker bridge, built on `tracing-subscriber`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bridge_telemetry::{init_logging, TelemetryConfig};
//!
//! let _guard = init_logging(&TelemetryConfig::from_env())?;
//! tracing::info!("bridge up");
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `BRIDGE_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `BRIDGE_JSON_LOGS` | `false` (`true` in containers) | JSON output |
//! | `BRIDGE_SERVICE_NAME` | `worker-bridge` | Service name on the startup event |
//! | `BRIDGE_LOG_THREAD_IDS` | `false` | Include thread IDs |

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::{init_logging, LoggingGuard};

/// Telemetry initialization errors.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid log filter: {0}")]
    InvalidFilter(String),

    #[error("failed to install subscriber: {0}")]
    SubscriberInit(String),
}
