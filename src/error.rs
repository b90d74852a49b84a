//! Top-level error type for the bridge.

use thiserror::Error;

use crate::{client::TransportError, config::ConfigError, mqtt::MqttError};

/// Failures that stop the bridge.
///
/// Transient conditions such as a silent device or a rejected command never
/// surface here; they are logged and published instead.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The configuration could not be loaded or is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// The serial link failed.
    #[error("serial link failed: {0}")]
    Transport(#[from] TransportError),
    /// The MQTT client failed.
    #[error("MQTT error: {0}")]
    Mqtt(#[from] MqttError),
    /// Any other I/O failure, such as installing a signal handler.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type used by the binary.
pub type Result<T> = std::result::Result<T, BridgeError>;
