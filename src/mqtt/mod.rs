//! MQTT side of the bridge.
//!
//! State, discovery documents and command results leave through an
//! [`MqttSink`]; commands arrive as [`MqttEvent`]s from the client's event
//! loop. The sink trait keeps the publishing logic independent of the broker
//! client so it can be exercised against a recording sink.

use async_trait::async_trait;
use thiserror::Error;

pub mod client;
pub mod commands;
pub mod discovery;
pub mod publisher;
pub mod topics;

pub use client::{BackoffConfig, EventLoopTask, MqttClient, MqttEvent};
pub use commands::{
    Command,
    CommandError,
    CommandHandler,
    CommandOutcome,
    CommandResult,
    PreparedCommand,
};
pub use discovery::{Discovery, DiscoveryDocument};
pub use publisher::{StatePublisher, status_document, value_topics};
pub use topics::Topics;

/// Errors raised by MQTT operations.
#[derive(Debug, Error)]
pub enum MqttError {
    /// The broker client rejected the request.
    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),
    /// A JSON document could not be serialised.
    #[error("failed to encode JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Destination for outgoing MQTT traffic.
#[async_trait]
pub trait MqttSink: Send + Sync {
    /// Publish `payload` on `topic`.
    async fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<(), MqttError>;

    /// Subscribe to `filter`.
    async fn subscribe(&self, filter: &str) -> Result<(), MqttError>;
}
