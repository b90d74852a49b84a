//! Injected tracing verbosity for protocol operations.
//!
//! [`TraceConfig`] decides at which level each protocol operation opens its
//! span and whether raw frames are dumped as hex. It is handed to the status
//! decoder, the bus client and the bridge instead of living in global state,
//! so two clients in one process can trace differently.

use std::{fmt, time::Instant};

use tracing::{Level, Span};

/// Controls tracing span levels and frame dumps for protocol operations.
///
/// By default `poll` spans are emitted at `INFO`; the high-frequency
/// operations (`decode`, `send`, `receive`, `command`) use `DEBUG`. Frame
/// dumps and poll timing are off.
///
/// # Examples
///
/// ```
/// use intellichem::trace::TraceConfig;
/// use tracing::Level;
///
/// let quiet = TraceConfig::default();
/// let noisy = TraceConfig::default()
///     .with_all_levels(Level::TRACE)
///     .with_dump_frames(true);
/// assert!(!quiet.dumps_frames());
/// assert!(noisy.dumps_frames());
/// ```
#[derive(Clone, Debug)]
pub struct TraceConfig {
    pub(crate) decode_level: Level,
    pub(crate) send_level: Level,
    pub(crate) receive_level: Level,
    pub(crate) poll_level: Level,
    pub(crate) command_level: Level,
    pub(crate) dump_frames: bool,
    pub(crate) poll_timing: bool,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            decode_level: Level::DEBUG,
            send_level: Level::DEBUG,
            receive_level: Level::DEBUG,
            poll_level: Level::INFO,
            command_level: Level::DEBUG,
            dump_frames: false,
            poll_timing: false,
        }
    }
}

impl TraceConfig {
    /// Set the span level for status decoding.
    #[must_use]
    pub fn with_decode_level(mut self, level: Level) -> Self {
        self.decode_level = level;
        self
    }

    /// Set the span level for frame transmission.
    #[must_use]
    pub fn with_send_level(mut self, level: Level) -> Self {
        self.send_level = level;
        self
    }

    /// Set the span level for waiting on inbound frames.
    #[must_use]
    pub fn with_receive_level(mut self, level: Level) -> Self {
        self.receive_level = level;
        self
    }

    /// Set the span level for whole poll cycles.
    #[must_use]
    pub fn with_poll_level(mut self, level: Level) -> Self {
        self.poll_level = level;
        self
    }

    /// Set the span level for configuration commands.
    #[must_use]
    pub fn with_command_level(mut self, level: Level) -> Self {
        self.command_level = level;
        self
    }

    /// Set the span level for every operation at once.
    #[must_use]
    pub fn with_all_levels(mut self, level: Level) -> Self {
        self.decode_level = level;
        self.send_level = level;
        self.receive_level = level;
        self.poll_level = level;
        self.command_level = level;
        self
    }

    /// Emit every frame sent or received as a hex dump at `DEBUG`.
    #[must_use]
    pub fn with_dump_frames(mut self, enabled: bool) -> Self {
        self.dump_frames = enabled;
        self
    }

    /// Emit an `elapsed_us` event when a poll cycle completes.
    #[must_use]
    pub fn with_poll_timing(mut self, enabled: bool) -> Self {
        self.poll_timing = enabled;
        self
    }

    /// Whether raw frames are dumped.
    #[must_use]
    pub fn dumps_frames(&self) -> bool { self.dump_frames }
}

/// Create a tracing span at a dynamically selected level.
///
/// Each branch calls the corresponding `tracing::<level>_span!` macro so the
/// span metadata stays static while the level is chosen at runtime.
macro_rules! dynamic_span {
    ($level:expr, $name:expr $(, $($field:tt)*)?) => {
        match $level {
            Level::ERROR => tracing::error_span!($name $(, $($field)*)?),
            Level::WARN  => tracing::warn_span!($name $(, $($field)*)?),
            Level::INFO  => tracing::info_span!($name $(, $($field)*)?),
            Level::DEBUG => tracing::debug_span!($name $(, $($field)*)?),
            Level::TRACE => tracing::trace_span!($name $(, $($field)*)?),
        }
    };
}

#[expect(
    clippy::cognitive_complexity,
    reason = "complexity from dynamic_span! macro expansion"
)]
pub(crate) fn decode_span(config: &TraceConfig, frame_bytes: usize) -> Span {
    dynamic_span!(
        config.decode_level,
        "status.decode",
        frame.bytes = frame_bytes,
        result = tracing::field::Empty
    )
}

#[expect(
    clippy::cognitive_complexity,
    reason = "complexity from dynamic_span! macro expansion"
)]
pub(crate) fn send_span(config: &TraceConfig, action: u8, frame_bytes: usize) -> Span {
    dynamic_span!(
        config.send_level,
        "bus.send",
        action = action,
        frame.bytes = frame_bytes
    )
}

/// The `frame.bytes` and `result` fields are recorded once a frame arrives.
#[expect(
    clippy::cognitive_complexity,
    reason = "complexity from dynamic_span! macro expansion"
)]
pub(crate) fn receive_span(config: &TraceConfig) -> Span {
    dynamic_span!(
        config.receive_level,
        "bus.receive",
        frame.bytes = tracing::field::Empty,
        result = tracing::field::Empty
    )
}

#[expect(
    clippy::cognitive_complexity,
    reason = "complexity from dynamic_span! macro expansion"
)]
pub(crate) fn poll_span(config: &TraceConfig, address: u8) -> Span {
    dynamic_span!(
        config.poll_level,
        "bus.poll",
        address = address,
        result = tracing::field::Empty
    )
}

#[expect(
    clippy::cognitive_complexity,
    reason = "complexity from dynamic_span! macro expansion"
)]
pub(crate) fn command_span(config: &TraceConfig, command: &str) -> Span {
    dynamic_span!(config.command_level, "bridge.command", command = command)
}

/// Dump `raw` as hex if frame dumps are enabled.
pub(crate) fn dump_frame(config: &TraceConfig, direction: &'static str, raw: &[u8]) {
    if config.dump_frames {
        tracing::debug!(direction, hex = %Hex(raw), "frame");
    }
}

/// Poll start time when timing is enabled.
pub(crate) fn timing_start(config: &TraceConfig) -> Option<Instant> {
    config.poll_timing.then(Instant::now)
}

/// Record elapsed time if timing was enabled for this operation.
pub(crate) fn emit_timing_event(start: Option<Instant>) {
    if let Some(start) = start {
        let elapsed_us = start.elapsed().as_micros();
        tracing::debug!(elapsed_us = elapsed_us, "operation.timing");
    }
}

/// Space-separated upper-case hex rendering of a byte slice.
pub struct Hex<'a>(pub &'a [u8]);

impl fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut bytes = self.0.iter();
        if let Some(first) = bytes.next() {
            write!(f, "{first:02X}")?;
        }
        for byte in bytes {
            write!(f, " {byte:02X}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::*;

    #[test]
    fn hex_renders_request_frame() {
        let raw = [0xFF, 0x00, 0xFF, 0xA5, 0x02, 0xEA];
        assert_eq!(Hex(&raw).to_string(), "FF 00 FF A5 02 EA");
        assert_eq!(Hex(&[]).to_string(), "");
    }

    #[test]
    fn all_levels_overrides_every_operation() {
        let config = TraceConfig::default().with_all_levels(Level::WARN);
        assert_eq!(config.decode_level, Level::WARN);
        assert_eq!(config.poll_level, Level::WARN);
        assert_eq!(config.command_level, Level::WARN);
    }

    #[traced_test]
    #[test]
    fn frame_dump_respects_switch() {
        dump_frame(&TraceConfig::default(), "inbound", &[0xAB]);
        assert!(!logs_contain("AB"));
        dump_frame(
            &TraceConfig::default().with_dump_frames(true),
            "inbound",
            &[0xCD, 0xEF],
        );
        assert!(logs_contain("CD EF"));
    }
}
