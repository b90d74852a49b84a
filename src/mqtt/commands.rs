//! Inbound command handling.
//!
//! Commands arrive on `{prefix}/intellichem/set/{name}`. A command is parsed,
//! range-checked, merged with the last decoded state and turned into a
//! configuration [`Frame`]. Sending is left to the bus owner; the handler
//! never touches the transport.

use leaky_bucket::RateLimiter;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use super::topics::Topics;
use crate::{
    command::{
        BYTE_CAPACITY,
        CommandBuilder,
        DosingChannel,
        PH_SETPOINT_CAPACITY,
        SetpointLimits,
        ValidationError,
        WORD_CAPACITY,
    },
    config::ControlConfig,
    frame::Frame,
    metrics,
    state::DeviceState,
    trace::{TraceConfig, command_span},
};

/// A parsed, range-checked command.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    /// New pH setpoint.
    PhSetpoint(f64),
    /// New ORP setpoint in millivolts.
    OrpSetpoint(u16),
    /// New calcium hardness in ppm.
    CalciumHardness(u16),
    /// New cyanuric acid in ppm.
    CyanuricAcid(u8),
    /// New total alkalinity in ppm.
    Alkalinity(u16),
    /// Enable or disable dosing on a channel.
    Dosing(DosingChannel, bool),
}

/// Reasons a command payload is refused.
#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    /// The topic names no known command.
    #[error("Unknown command: {0}")]
    Unknown(String),
    /// The payload is not a number.
    #[error("invalid value for {command}: {payload:?}")]
    NotANumber {
        /// Command name.
        command: &'static str,
        /// Offending payload.
        payload: String,
    },
    /// The value lies outside its configured range.
    #[error(transparent)]
    OutOfRange(#[from] ValidationError),
}

impl Command {
    /// Every command name accepted on the command topics.
    pub const NAMES: [&'static str; 7] = [
        "ph_setpoint",
        "orp_setpoint",
        "calcium_hardness",
        "cyanuric_acid",
        "alkalinity",
        "ph_dosing",
        "orp_dosing",
    ];

    /// Parse the payload of command `name`, checking it against `limits`.
    ///
    /// Integer settings accept decimal text and truncate it, so `"650.9"`
    /// sets 650. Dosing accepts `true`, `1`, `yes` or `on` in any case as
    /// enable and anything else as disable.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] for unknown names, non-numeric payloads and
    /// out-of-range values.
    ///
    /// # Examples
    ///
    /// ```
    /// use intellichem::{command::SetpointLimits, mqtt::Command};
    ///
    /// let limits = SetpointLimits::default();
    /// assert_eq!(Command::parse("orp_setpoint", "650.9", &limits), Ok(Command::OrpSetpoint(650)));
    /// assert!(Command::parse("ph_setpoint", "9.0", &limits).is_err());
    /// ```
    pub fn parse(name: &str, payload: &str, limits: &SetpointLimits) -> Result<Self, CommandError> {
        let text = payload.trim();
        match name {
            "ph_setpoint" => {
                let value = number("ph_setpoint", text)?;
                limits.ph_setpoint.check("ph_setpoint", value)?;
                PH_SETPOINT_CAPACITY.check("ph_setpoint", value)?;
                Ok(Self::PhSetpoint(value))
            }
            "orp_setpoint" => {
                let value = integer("orp_setpoint", text)?;
                limits.orp_setpoint.check("orp_setpoint", value)?;
                Ok(Self::OrpSetpoint(narrow("orp_setpoint", value)?))
            }
            "calcium_hardness" => {
                let value = integer("calcium_hardness", text)?;
                limits.calcium_hardness.check("calcium_hardness", value)?;
                Ok(Self::CalciumHardness(narrow("calcium_hardness", value)?))
            }
            "cyanuric_acid" => {
                let value = integer("cyanuric_acid", text)?;
                limits.cyanuric_acid.check("cyanuric_acid", value)?;
                // The wire field is one byte wide whatever the configured limit.
                let byte = u8::try_from(narrow("cyanuric_acid", value)?).map_err(|_| ValidationError {
                    field: "cyanuric_acid",
                    value,
                    min: BYTE_CAPACITY.min,
                    max: BYTE_CAPACITY.max,
                })?;
                Ok(Self::CyanuricAcid(byte))
            }
            "alkalinity" => {
                let value = integer("alkalinity", text)?;
                limits.alkalinity.check("alkalinity", value)?;
                Ok(Self::Alkalinity(narrow("alkalinity", value)?))
            }
            "ph_dosing" => Ok(Self::Dosing(DosingChannel::Ph, truthy(text))),
            "orp_dosing" => Ok(Self::Dosing(DosingChannel::Orp, truthy(text))),
            other => Err(CommandError::Unknown(other.to_owned())),
        }
    }

    /// Topic name of the command.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::PhSetpoint(_) => "ph_setpoint",
            Self::OrpSetpoint(_) => "orp_setpoint",
            Self::CalciumHardness(_) => "calcium_hardness",
            Self::CyanuricAcid(_) => "cyanuric_acid",
            Self::Alkalinity(_) => "alkalinity",
            Self::Dosing(DosingChannel::Ph, _) => "ph_dosing",
            Self::Dosing(DosingChannel::Orp, _) => "orp_dosing",
        }
    }

    /// Apply the command to a builder.
    #[must_use]
    pub fn apply(self, builder: CommandBuilder) -> CommandBuilder {
        match self {
            Self::PhSetpoint(value) => builder.with_ph_setpoint(value),
            Self::OrpSetpoint(value) => builder.with_orp_setpoint(value),
            Self::CalciumHardness(value) => builder.with_calcium_hardness(value),
            Self::CyanuricAcid(value) => builder.with_cyanuric_acid(value),
            Self::Alkalinity(value) => builder.with_alkalinity(value),
            Self::Dosing(channel, enabled) => builder.with_dosing(channel, enabled),
        }
    }
}

fn number(command: &'static str, text: &str) -> Result<f64, CommandError> {
    text.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| CommandError::NotANumber {
            command,
            payload: text.to_owned(),
        })
}

fn integer(command: &'static str, text: &str) -> Result<f64, CommandError> {
    number(command, text).map(f64::trunc)
}

/// Convert a truncated value to the two-byte wire width, refusing values the
/// field cannot carry.
fn narrow(field: &'static str, value: f64) -> Result<u16, ValidationError> {
    WORD_CAPACITY.check(field, value)?;
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "value is integral and within 0..=65535"
    )]
    let narrowed = value as u16;
    Ok(narrowed)
}

fn truthy(text: &str) -> bool {
    ["true", "1", "yes", "on"]
        .iter()
        .any(|word| text.eq_ignore_ascii_case(word))
}

/// Outcome published on the command result topic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    /// `true` once the frame was written to the bus.
    pub success: bool,
    /// Command name taken from the topic.
    pub command: String,
    /// Human-readable detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Payload text as received.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl CommandResult {
    fn failure(command: &str, message: impl Into<String>, value: Option<String>) -> Self {
        Self {
            success: false,
            command: command.to_owned(),
            message: Some(message.into()),
            value,
        }
    }
}

/// A command ready to be written to the bus.
#[derive(Clone, Debug, PartialEq)]
pub struct PreparedCommand {
    command: Command,
    value: String,
    frame: Frame,
}

impl PreparedCommand {
    /// Parsed command.
    #[must_use]
    pub fn command(&self) -> Command { self.command }

    /// Configuration frame to send.
    #[must_use]
    pub fn frame(&self) -> &Frame { &self.frame }

    /// Result to publish once the send attempt finished.
    #[must_use]
    pub fn finish(self, sent: bool) -> CommandResult {
        metrics::inc_commands(if sent { "sent" } else { "failed" });
        CommandResult {
            success: sent,
            command: self.command.name().to_owned(),
            message: Some(if sent { "Command sent" } else { "Failed to send command" }.to_owned()),
            value: Some(self.value),
        }
    }
}

/// What to do with a command message.
#[derive(Clone, Debug, PartialEq)]
pub enum CommandOutcome {
    /// Refused before reaching the bus; publish the result.
    Rejected(CommandResult),
    /// Send the frame, then publish [`PreparedCommand::finish`].
    Ready(PreparedCommand),
}

/// Turns command messages into configuration frames.
pub struct CommandHandler {
    topics: Topics,
    address: u8,
    enabled: bool,
    limits: SetpointLimits,
    limiter: Option<RateLimiter>,
    trace: TraceConfig,
}

impl std::fmt::Debug for CommandHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHandler")
            .field("address", &self.address)
            .field("enabled", &self.enabled)
            .field("rate_limited", &self.limiter.is_some())
            .finish_non_exhaustive()
    }
}

impl CommandHandler {
    /// Handler for the device at `address` governed by `control`.
    ///
    /// A zero `rate_limit_seconds` disables rate limiting.
    #[must_use]
    pub fn new(topics: Topics, address: u8, control: &ControlConfig) -> Self {
        let interval = control.rate_limit();
        let limiter = (!interval.is_zero()).then(|| {
            RateLimiter::builder()
                .initial(1)
                .refill(1)
                .interval(interval)
                .max(1)
                .build()
        });
        Self {
            topics,
            address,
            enabled: control.enabled,
            limits: control.limits,
            limiter,
            trace: TraceConfig::default(),
        }
    }

    /// Replace the tracing configuration.
    #[must_use]
    pub fn with_trace(mut self, trace: TraceConfig) -> Self {
        self.trace = trace;
        self
    }

    /// Handle a message on `topic`.
    ///
    /// Returns `None` for topics that are not command topics. An accepted
    /// command must wait for [`CommandHandler::ready`] before it is sent.
    #[must_use]
    pub fn handle(
        &self,
        topic: &str,
        payload: &[u8],
        last: Option<&DeviceState>,
    ) -> Option<CommandOutcome> {
        let name = self.topics.command_name(topic)?;
        let span = command_span(&self.trace, name);
        let outcome = span.in_scope(|| self.prepare(name, payload, last));
        if matches!(outcome, CommandOutcome::Rejected(_)) {
            metrics::inc_commands("rejected");
        }
        Some(outcome)
    }

    /// Wait until the rate limiter admits one more command.
    ///
    /// Completes immediately when rate limiting is disabled. Dropping the
    /// future before it completes consumes nothing.
    pub async fn ready(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.acquire(1).await;
        }
    }

    fn prepare(&self, name: &str, payload: &[u8], last: Option<&DeviceState>) -> CommandOutcome {
        if !self.enabled {
            warn!(command = name, "control disabled, ignoring command");
            return CommandOutcome::Rejected(CommandResult::failure(
                name,
                "Control features are disabled",
                None,
            ));
        }
        if !Command::NAMES.contains(&name) {
            warn!(command = name, "unknown command");
            return CommandOutcome::Rejected(CommandResult::failure(
                name,
                CommandError::Unknown(name.to_owned()).to_string(),
                None,
            ));
        }
        let Ok(text) = std::str::from_utf8(payload) else {
            warn!(command = name, "command payload is not UTF-8");
            return CommandOutcome::Rejected(CommandResult::failure(
                name,
                "Invalid payload encoding",
                None,
            ));
        };
        let text = text.trim();
        let command = match Command::parse(name, text, &self.limits) {
            Ok(command) => command,
            Err(e) => {
                warn!(command = name, error = %e, "command rejected");
                return CommandOutcome::Rejected(CommandResult::failure(
                    name,
                    e.to_string(),
                    Some(text.to_owned()),
                ));
            }
        };
        info!(command = name, value = text, "received command");
        let frame = match command
            .apply(CommandBuilder::new(last))
            .build(self.address, &self.limits)
        {
            Ok(frame) => frame,
            Err(e) => {
                warn!(command = name, error = %e, "merged configuration rejected");
                return CommandOutcome::Rejected(CommandResult::failure(
                    name,
                    e.to_string(),
                    Some(text.to_owned()),
                ));
            }
        };
        CommandOutcome::Ready(PreparedCommand {
            command,
            value: text.to_owned(),
            frame,
        })
    }
}

#[cfg(test)]
mod tests;
