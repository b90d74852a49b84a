//! State publishing.
//!
//! Every decoded [`DeviceState`] is rendered once as a JSON document. The
//! aggregate status topic carries the whole document; the per-value topics
//! carry its leaves, so the two never disagree.

use chrono::Local;
use serde_json::{Map, Value, json};

use super::{MqttError, MqttSink, commands::CommandResult, discovery::Discovery, topics::Topics};
use crate::state::{ChemicalChannel, DeviceState};

/// Top-level keys that only appear in the aggregate document.
const STATUS_ONLY_KEYS: [&str; 2] = ["address", "last_update"];

/// Render `state` as the aggregate status document.
///
/// `last_update` is an RFC 3339 timestamp supplied by the caller.
#[must_use]
pub fn status_document(state: &DeviceState, last_update: &str) -> Value {
    json!({
        "address": state.address,
        "ph": channel_document(&state.ph, round2(state.ph.level), round2(state.ph.setpoint)),
        "orp": channel_document(
            &state.orp,
            json!(whole(state.orp.level)),
            json!(whole(state.orp.setpoint)),
        ),
        "lsi": round2(state.lsi),
        "calcium_hardness": state.calcium_hardness,
        "cyanuric_acid": state.cyanuric_acid,
        "alkalinity": state.alkalinity,
        "salt_level": state.salt_level,
        "temperature": state.temperature,
        "firmware": state.firmware,
        "alarms": {
            "flow": state.alarms.flow,
            "ph_tank_empty": state.alarms.ph_tank_empty,
            "orp_tank_empty": state.alarms.orp_tank_empty,
            "probe_fault": state.alarms.probe_fault,
            "any_active": state.alarms.any_active(),
        },
        "warnings": {
            "ph_lockout": state.warnings.ph_lockout,
            "ph_daily_limit": state.warnings.ph_daily_limit,
            "orp_daily_limit": state.warnings.orp_daily_limit,
            "invalid_setup": state.warnings.invalid_setup,
            "chlorinator_comm_error": state.warnings.chlorinator_comm_error,
            "water_chemistry": state.warnings.water_chemistry.to_string(),
            "any_active": state.warnings.any_active(),
        },
        "flow_detected": state.flow_detected,
        "comms_lost": state.comms_lost,
        "last_update": last_update,
    })
}

fn channel_document(channel: &ChemicalChannel, level: impl Into<Value>, setpoint: impl Into<Value>) -> Value {
    json!({
        "level": level.into(),
        "setpoint": setpoint.into(),
        "tank_level": channel.tank_level,
        "tank_level_percent": round1(channel.tank_level_percent()),
        "dose_time": channel.dose_time,
        "dose_volume": channel.dose_volume,
        "dosing_status": channel.dosing_status.to_string(),
        "is_dosing": channel.is_dosing(),
        "dosing_enabled": channel.dosing_enabled(),
    })
}

fn round1(value: f64) -> f64 { (value * 10.0).round() / 10.0 }

fn round2(value: f64) -> f64 { (value * 100.0).round() / 100.0 }

#[expect(
    clippy::cast_possible_truncation,
    reason = "ORP readings are decoded from 16-bit fields"
)]
fn whole(value: f64) -> i64 { value.round() as i64 }

/// Per-value topics derived from a status document.
///
/// Nested objects become path segments, so `{"ph": {"level": 7.5}}` yields
/// `("ph/level", "7.5")`. Strings are published raw and everything else in
/// its JSON form, which renders booleans as `true` and `false`.
#[must_use]
pub fn value_topics(document: &Value) -> Vec<(String, String)> {
    let mut out = Vec::new();
    if let Value::Object(map) = document {
        let filtered: Map<String, Value> = map
            .iter()
            .filter(|(key, _)| !STATUS_ONLY_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        flatten("", &filtered, &mut out);
    }
    out
}

fn flatten(prefix: &str, map: &Map<String, Value>, out: &mut Vec<(String, String)>) {
    for (key, value) in map {
        let path = if prefix.is_empty() { key.clone() } else { format!("{prefix}/{key}") };
        match value {
            Value::Object(inner) => flatten(&path, inner, out),
            other => out.push((path, payload_text(other))),
        }
    }
}

/// Text published for a single JSON value.
#[must_use]
pub fn payload_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn bool_text(value: bool) -> &'static str { if value { "true" } else { "false" } }

/// Publishes device state, availability and discovery through an
/// [`MqttSink`].
#[derive(Clone, Debug)]
pub struct StatePublisher<S> {
    sink: S,
    topics: Topics,
    retain: bool,
}

impl<S: MqttSink> StatePublisher<S> {
    /// Publisher writing under `topics`; `retain` applies to state topics.
    #[must_use]
    pub fn new(sink: S, topics: Topics, retain: bool) -> Self { Self { sink, topics, retain } }

    /// Topic layout in use.
    #[must_use]
    pub fn topics(&self) -> &Topics { &self.topics }

    /// Underlying sink.
    #[must_use]
    pub fn sink(&self) -> &S { &self.sink }

    /// Publish `state` as the aggregate document and as per-value topics.
    ///
    /// # Errors
    ///
    /// Returns [`MqttError`] if the sink rejects a publish.
    pub async fn publish_state(&self, state: &DeviceState) -> Result<(), MqttError> {
        let document = status_document(state, &Local::now().to_rfc3339());
        let body = serde_json::to_string(&document)?;
        self.sink
            .publish(&self.topics.status(), &body, self.retain)
            .await?;
        for (path, payload) in value_topics(&document) {
            self.sink
                .publish(&self.topics.state(&path), &payload, self.retain)
                .await?;
        }
        Ok(())
    }

    /// Announce that the device stopped answering.
    ///
    /// The last known state, if any, is republished on the status topic
    /// marked as unreachable.
    ///
    /// # Errors
    ///
    /// Returns [`MqttError`] if the sink rejects a publish.
    pub async fn publish_comms_lost(&self, last: Option<&DeviceState>) -> Result<(), MqttError> {
        self.publish_comms_flags(true).await?;
        if let Some(state) = last {
            let annotated = state.clone().with_comms_lost();
            let document = status_document(&annotated, &Local::now().to_rfc3339());
            self.sink
                .publish(
                    &self.topics.status(),
                    &serde_json::to_string(&document)?,
                    self.retain,
                )
                .await?;
        }
        Ok(())
    }

    /// Announce that the device answers again.
    ///
    /// # Errors
    ///
    /// Returns [`MqttError`] if the sink rejects a publish.
    pub async fn publish_comms_restored(&self) -> Result<(), MqttError> {
        self.publish_comms_flags(false).await
    }

    async fn publish_comms_flags(&self, lost: bool) -> Result<(), MqttError> {
        let payload = bool_text(lost);
        self.sink
            .publish(&self.topics.state("comms_lost"), payload, self.retain)
            .await?;
        self.sink
            .publish(&self.topics.state("alarms/comms"), payload, self.retain)
            .await
    }

    /// Publish the retained bridge availability.
    ///
    /// # Errors
    ///
    /// Returns [`MqttError`] if the sink rejects the publish.
    pub async fn publish_availability(&self, online: bool) -> Result<(), MqttError> {
        let payload = if online { "online" } else { "offline" };
        self.sink
            .publish(&self.topics.availability(), payload, true)
            .await
    }

    /// Publish every retained discovery document.
    ///
    /// # Errors
    ///
    /// Returns [`MqttError`] if a document cannot be encoded or published.
    pub async fn publish_discovery(&self, discovery: &Discovery) -> Result<(), MqttError> {
        for document in discovery.documents() {
            let body = serde_json::to_string(&document.payload)?;
            self.sink.publish(&document.topic, &body, true).await?;
        }
        Ok(())
    }

    /// Publish the outcome of a handled command.
    ///
    /// # Errors
    ///
    /// Returns [`MqttError`] if the result cannot be encoded or published.
    pub async fn publish_command_result(&self, result: &CommandResult) -> Result<(), MqttError> {
        let body = serde_json::to_string(result)?;
        self.sink
            .publish(&self.topics.command_result(), &body, false)
            .await
    }

    /// Subscribe to every command topic.
    ///
    /// # Errors
    ///
    /// Returns [`MqttError`] if the subscription fails.
    pub async fn subscribe_commands(&self) -> Result<(), MqttError> {
        self.sink.subscribe(&self.topics.command_filter()).await
    }
}
