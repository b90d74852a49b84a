//! `rumqttc` client wrapper.
//!
//! [`MqttClient::connect`] returns the publishing handle together with an
//! [`EventLoopTask`] that drives the connection. The task forwards the events
//! the bridge cares about over a channel and backs off exponentially while
//! the broker is unreachable; `rumqttc` reconnects on the next poll.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use log::warn;
use rumqttc::{AsyncClient, Event, EventLoop, LastWill, MqttOptions, Outgoing, Packet, QoS};
use tokio::{select, sync::mpsc, task::JoinHandle, time::sleep};
use tokio_util::sync::CancellationToken;

use super::{MqttError, MqttSink, topics::Topics};
use crate::config::MqttConfig;

const KEEP_ALIVE: Duration = Duration::from_secs(60);
const REQUEST_CAPACITY: usize = 64;
const EVENT_CAPACITY: usize = 64;

/// Events forwarded from the MQTT connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MqttEvent {
    /// The broker accepted a (re)connection; subscriptions and retained
    /// announcements must be renewed.
    Connected,
    /// A message arrived on a subscribed topic.
    Message {
        /// Topic the message was published on.
        topic: String,
        /// Raw payload.
        payload: Bytes,
    },
}

/// Exponential back-off applied while the broker is unreachable.
///
/// The delay starts at `initial_delay`, doubles after each consecutive
/// failure and is capped at `max_delay`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Delay after the first failure.
    pub initial_delay: Duration,
    /// Upper bound for the delay.
    pub max_delay: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl BackoffConfig {
    /// Clamp delays to at least one millisecond with `initial_delay <=
    /// max_delay`.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.initial_delay = self.initial_delay.max(Duration::from_millis(1));
        self.max_delay = self.max_delay.max(Duration::from_millis(1));
        if self.initial_delay > self.max_delay {
            std::mem::swap(&mut self.initial_delay, &mut self.max_delay);
        }
        self
    }

    /// Delay to use after one more failure.
    #[must_use]
    pub fn next(&self, delay: Duration) -> Duration { (delay * 2).min(self.max_delay) }
}

/// Map a configured QoS level; values above 2 saturate to exactly-once.
#[must_use]
pub fn qos(level: u8) -> QoS {
    match level {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        _ => QoS::ExactlyOnce,
    }
}

/// Publishing handle onto the broker connection.
#[derive(Clone, Debug)]
pub struct MqttClient {
    client: AsyncClient,
    qos: QoS,
}

impl MqttClient {
    /// Configure a connection to the broker in `config`.
    ///
    /// No network traffic happens until the returned task runs. The bridge's
    /// availability topic is registered as last will with `offline`.
    #[must_use]
    pub fn connect(config: &MqttConfig, topics: &Topics) -> (Self, EventLoopTask) {
        let host = config.host.clone().unwrap_or_default();
        let mut options = MqttOptions::new(config.client_id.clone(), host, config.port);
        options.set_keep_alive(KEEP_ALIVE);
        if let Some(username) = &config.username {
            options.set_credentials(username.clone(), config.password.clone().unwrap_or_default());
        }
        let qos = qos(config.qos);
        options.set_last_will(LastWill::new(topics.availability(), "offline", qos, true));
        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        (
            Self { client, qos },
            EventLoopTask {
                eventloop,
                backoff: BackoffConfig::default(),
            },
        )
    }

    /// Send a clean disconnect.
    ///
    /// # Errors
    ///
    /// Returns [`MqttError::Client`] if the request queue is closed.
    pub async fn disconnect(&self) -> Result<(), MqttError> {
        self.client.disconnect().await?;
        Ok(())
    }
}

#[async_trait]
impl MqttSink for MqttClient {
    async fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<(), MqttError> {
        self.client
            .publish(topic, self.qos, retain, payload.as_bytes().to_vec())
            .await?;
        Ok(())
    }

    async fn subscribe(&self, filter: &str) -> Result<(), MqttError> {
        self.client.subscribe(filter, self.qos).await?;
        Ok(())
    }
}

/// Drives the `rumqttc` event loop.
pub struct EventLoopTask {
    eventloop: EventLoop,
    backoff: BackoffConfig,
}

impl std::fmt::Debug for EventLoopTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoopTask")
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl EventLoopTask {
    /// Replace the reconnect back-off.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Spawn the loop, returning the event receiver and the task handle.
    ///
    /// The loop ends once a disconnect has been written, when `shutdown` is
    /// cancelled or when the receiver is dropped.
    #[must_use]
    pub fn spawn(self, shutdown: CancellationToken) -> (mpsc::Receiver<MqttEvent>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(EVENT_CAPACITY);
        let handle = tokio::spawn(self.run(tx, shutdown));
        (rx, handle)
    }

    #[expect(
        clippy::integer_division_remainder_used,
        reason = "tokio::select! expands to modulus internally"
    )]
    async fn run(mut self, tx: mpsc::Sender<MqttEvent>, shutdown: CancellationToken) {
        let backoff = self.backoff.normalized();
        let mut delay = backoff.initial_delay;
        loop {
            let event = select! {
                biased;

                () = shutdown.cancelled() => break,
                event = self.eventloop.poll() => event,
            };
            let forwarded = match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    delay = backoff.initial_delay;
                    Some(MqttEvent::Connected)
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => Some(MqttEvent::Message {
                    topic: publish.topic,
                    payload: publish.payload,
                }),
                Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
                Ok(_) => None,
                Err(e) => {
                    warn!("MQTT connection error: error={e}, retry_in={delay:?}");
                    select! {
                        biased;

                        () = shutdown.cancelled() => break,
                        () = sleep(delay) => {}
                    }
                    delay = backoff.next(delay);
                    None
                }
            };
            if let Some(event) = forwarded
                && tx.send(event).await.is_err()
            {
                break;
            }
        }
    }
}
