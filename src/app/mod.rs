//! Bridge orchestration.
//!
//! [`Bridge`] owns the [`BusClient`] and is therefore the only writer on the
//! bus: scheduled polls and configuration commands are interleaved by a
//! single `select!` loop, never sent concurrently. Accepted commands queue
//! until the rate limiter admits them, so polls and shutdown stay live while
//! a command waits. Decoded states go to the optional [`StatePublisher`];
//! without one the bridge runs in log-only mode.

use std::{collections::VecDeque, time::Duration};

use tokio::{
    select,
    sync::mpsc,
    time::{MissedTickBehavior, interval},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

mod comms;

pub use comms::{CommsMonitor, CommsTransition};

use crate::{
    client::{BusClient, BusStream, PollOutcome, TransportError},
    config::AppConfig,
    error::BridgeError,
    mqtt::{
        CommandHandler,
        CommandOutcome,
        Discovery,
        MqttError,
        MqttEvent,
        MqttSink,
        PreparedCommand,
        StatePublisher,
        Topics,
    },
    state::DeviceState,
    trace::TraceConfig,
};

/// Accepted commands held while the rate limiter is exhausted.
pub const MAX_PENDING_COMMANDS: usize = 16;

/// Poll counters reported at shutdown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PollStats {
    /// Poll cycles started.
    pub polls: u64,
    /// Polls answered with a status response.
    pub successful: u64,
    /// Polls that timed out or failed.
    pub failed: u64,
}

/// MQTT side of the bridge.
#[derive(Debug)]
struct MqttLink<S> {
    publisher: StatePublisher<S>,
    discovery: Discovery,
    commands: CommandHandler,
    control_enabled: bool,
}

/// Polls the device and relays between the bus and MQTT.
pub struct Bridge<T: BusStream, S> {
    client: BusClient<T>,
    poll_interval: Duration,
    mqtt: Option<MqttLink<S>>,
    comms: CommsMonitor,
    stats: PollStats,
    last_state: Option<DeviceState>,
    pending: VecDeque<PreparedCommand>,
}

impl<T: BusStream, S> std::fmt::Debug for Bridge<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("client", &self.client)
            .field("poll_interval", &self.poll_interval)
            .field("log_only", &self.mqtt.is_none())
            .field("stats", &self.stats)
            .field("pending_commands", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl<T: BusStream, S: MqttSink> Bridge<T, S> {
    /// Log-only bridge polling through `client` every `poll_interval`.
    #[must_use]
    pub fn new(client: BusClient<T>, poll_interval: Duration) -> Self {
        Self {
            client,
            poll_interval,
            mqtt: None,
            comms: CommsMonitor::new(),
            stats: PollStats::default(),
            last_state: None,
            pending: VecDeque::new(),
        }
    }

    /// Bridge configured from `config`, publishing through `sink` when one
    /// is given.
    #[must_use]
    pub fn from_config(client: BusClient<T>, config: &AppConfig, sink: Option<S>) -> Self {
        let trace = TraceConfig::default().with_dump_frames(config.logging.dump_frames);
        let bridge = Self::new(client.with_trace(trace.clone()), config.intellichem.poll_interval());
        let Some(sink) = sink else {
            return bridge;
        };
        let topics = Topics::new(&config.mqtt.topic_prefix);
        let address = config.intellichem.address;
        let discovery = Discovery::new(&config.mqtt.discovery_prefix, topics.clone(), address)
            .with_control(config.control.enabled, config.control.limits);
        let commands = CommandHandler::new(topics.clone(), address, &config.control).with_trace(trace);
        let publisher = StatePublisher::new(sink, topics, config.mqtt.retain);
        bridge.with_mqtt(publisher, discovery, commands, config.control.enabled)
    }

    /// Attach the MQTT side. Command topics are subscribed only when
    /// `control_enabled` is set.
    #[must_use]
    pub fn with_mqtt(
        mut self,
        publisher: StatePublisher<S>,
        discovery: Discovery,
        commands: CommandHandler,
        control_enabled: bool,
    ) -> Self {
        self.mqtt = Some(MqttLink {
            publisher,
            discovery,
            commands,
            control_enabled,
        });
        self
    }

    /// Counters so far.
    #[must_use]
    pub fn stats(&self) -> PollStats { self.stats }

    /// Most recent decoded state.
    #[must_use]
    pub fn last_state(&self) -> Option<&DeviceState> { self.last_state.as_ref() }

    /// Reachability tracker.
    #[must_use]
    pub fn comms(&self) -> &CommsMonitor { &self.comms }

    /// Accepted commands not yet written to the bus.
    #[must_use]
    pub fn pending_commands(&self) -> usize { self.pending.len() }

    /// Run until `shutdown` is cancelled or the bus stream closes.
    ///
    /// Polls immediately, then every poll interval. `events` carries MQTT
    /// connection events and command messages; a closed channel only stops
    /// command intake. Queued commands are sent as the rate limiter admits
    /// them. On exit queued commands are reported as failed and `offline`
    /// is published.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Transport`] when the bus stream closes.
    #[expect(
        clippy::integer_division_remainder_used,
        reason = "tokio::select! expands to modulus internally"
    )]
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<MqttEvent>,
        shutdown: CancellationToken,
    ) -> Result<PollStats, BridgeError> {
        info!(
            address = self.client.address(),
            interval = ?self.poll_interval,
            log_only = self.mqtt.is_none(),
            "starting poll loop"
        );
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut events_open = true;
        let result = loop {
            select! {
                biased;

                () = shutdown.cancelled() => break Ok(()),
                () = command_slot(self.mqtt.as_ref()), if !self.pending.is_empty() => {
                    self.send_admitted_command().await;
                }
                event = events.recv(), if events_open => match event {
                    Some(event) => self.handle_event(event).await,
                    None => events_open = false,
                },
                _ = ticker.tick() => {
                    if let Err(e) = self.poll().await {
                        break Err(e);
                    }
                }
            }
        };
        self.stop().await;
        result.map(|()| self.stats)
    }

    /// Run one poll cycle and publish its outcome.
    ///
    /// Transport failures other than a closed stream are logged and counted
    /// as failed polls.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Transport`] when the bus stream is closed.
    pub async fn poll(&mut self) -> Result<(), BridgeError> {
        self.stats.polls += 1;
        match self.client.poll_status().await {
            Ok(PollOutcome::Status(state)) => {
                self.stats.successful += 1;
                self.on_status(state).await;
                Ok(())
            }
            Ok(PollOutcome::NoResponse) => {
                self.stats.failed += 1;
                warn!(address = self.client.address(), "no response from IntelliChem");
                self.on_silence().await;
                Ok(())
            }
            Err(TransportError::Closed) => {
                self.stats.failed += 1;
                error!("bus stream closed");
                Err(TransportError::Closed.into())
            }
            Err(e) => {
                self.stats.failed += 1;
                error!(error = %e, "poll failed");
                Ok(())
            }
        }
    }

    async fn on_status(&mut self, state: DeviceState) {
        let restored = self.comms.record_success() == Some(CommsTransition::Restored);
        if restored {
            info!("communication restored");
        }
        if let Some(mqtt) = &self.mqtt {
            debug!(
                ph = state.ph.level,
                orp = state.orp.level,
                temperature = state.temperature,
                "status received"
            );
            report(mqtt.publisher.publish_state(&state).await, "state");
            if restored {
                report(mqtt.publisher.publish_comms_restored().await, "comms restored");
            }
        } else {
            info!(
                ph = state.ph.level,
                ph_setpoint = state.ph.setpoint,
                orp = state.orp.level,
                orp_setpoint = state.orp.setpoint,
                temperature = state.temperature,
                lsi = state.lsi,
                alarms = state.alarms.any_active(),
                warnings = state.warnings.any_active(),
                "status received"
            );
        }
        self.last_state = Some(state);
    }

    async fn on_silence(&mut self) {
        if self.comms.record_failure() != Some(CommsTransition::Lost) {
            return;
        }
        warn!("communication lost");
        if let Some(mqtt) = &self.mqtt {
            report(
                mqtt.publisher
                    .publish_comms_lost(self.last_state.as_ref())
                    .await,
                "comms lost",
            );
        }
    }

    /// React to one MQTT event.
    ///
    /// A connection announces availability, publishes discovery and
    /// subscribes to command topics. A message is handled as a command: a
    /// rejection is published at once, an accepted command is queued for
    /// [`Bridge::send_next_command`].
    pub async fn handle_event(&mut self, event: MqttEvent) {
        let Some(mqtt) = &self.mqtt else {
            return;
        };
        match event {
            MqttEvent::Connected => {
                info!("connected to MQTT broker");
                report(mqtt.publisher.publish_availability(true).await, "availability");
                report(mqtt.publisher.publish_discovery(&mqtt.discovery).await, "discovery");
                if mqtt.control_enabled {
                    report(mqtt.publisher.subscribe_commands().await, "command subscription");
                }
            }
            MqttEvent::Message { topic, payload } => {
                let Some(outcome) = mqtt
                    .commands
                    .handle(&topic, &payload, self.last_state.as_ref())
                else {
                    debug!(topic = %topic, "ignoring message on non-command topic");
                    return;
                };
                match outcome {
                    CommandOutcome::Rejected(result) => {
                        report(mqtt.publisher.publish_command_result(&result).await, "command result");
                    }
                    CommandOutcome::Ready(prepared) if self.pending.len() >= MAX_PENDING_COMMANDS => {
                        warn!(command = prepared.command().name(), "command queue full, dropping command");
                        let result = prepared.finish(false);
                        report(mqtt.publisher.publish_command_result(&result).await, "command result");
                    }
                    CommandOutcome::Ready(prepared) => {
                        debug!(command = prepared.command().name(), queued = self.pending.len(), "command queued");
                        self.pending.push_back(prepared);
                    }
                }
            }
        }
    }

    /// Wait for the rate limiter, then write the oldest queued command to
    /// the bus and publish its result.
    ///
    /// Returns `false` when no command was queued.
    pub async fn send_next_command(&mut self) -> bool {
        if self.pending.is_empty() {
            return false;
        }
        command_slot(self.mqtt.as_ref()).await;
        self.send_admitted_command().await
    }

    async fn send_admitted_command(&mut self) -> bool {
        let Some(mqtt) = &self.mqtt else {
            return false;
        };
        let Some(prepared) = self.pending.pop_front() else {
            return false;
        };
        let sent = match self.client.send(prepared.frame()).await {
            Ok(()) => {
                info!(command = prepared.command().name(), "command sent");
                true
            }
            Err(e) => {
                error!(command = prepared.command().name(), error = %e, "command send failed");
                false
            }
        };
        let result = prepared.finish(sent);
        report(mqtt.publisher.publish_command_result(&result).await, "command result");
        true
    }

    async fn stop(&mut self) {
        if let Some(mqtt) = &self.mqtt {
            for prepared in self.pending.drain(..) {
                warn!(command = prepared.command().name(), "dropping queued command at shutdown");
                let result = prepared.finish(false);
                report(mqtt.publisher.publish_command_result(&result).await, "command result");
            }
            report(mqtt.publisher.publish_availability(false).await, "availability");
        }
        let buffer = self.client.buffer_stats();
        info!(
            polls = self.stats.polls,
            successful = self.stats.successful,
            failed = self.stats.failed,
            packets = buffer.packets_received,
            invalid_checksums = buffer.invalid_checksums,
            skipped_frames = self.client.skipped_frames(),
            "bridge stopped"
        );
    }
}

async fn command_slot<S>(mqtt: Option<&MqttLink<S>>) {
    if let Some(mqtt) = mqtt {
        mqtt.commands.ready().await;
    }
}

fn report(result: Result<(), MqttError>, what: &'static str) {
    if let Err(e) = result {
        warn!(error = %e, "failed to publish {what}");
    }
}
