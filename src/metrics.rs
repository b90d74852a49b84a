//! Metric helpers for the IntelliChem bridge.
//!
//! This module defines metric names and small helpers wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. Without the `metrics` feature
//! every helper compiles to a no-op.

#[cfg(feature = "metrics")]
use metrics::counter;

/// Name of the counter tracking poll cycles by outcome.
pub const POLLS_TOTAL: &str = "intellichem_polls_total";
/// Name of the counter tracking frames crossing the bus.
pub const FRAMES_TOTAL: &str = "intellichem_frames_total";
/// Name of the counter tracking candidate frames rejected by checksum.
pub const CHECKSUM_ERRORS: &str = "intellichem_checksum_errors_total";
/// Name of the counter tracking configuration commands by outcome.
pub const COMMANDS_TOTAL: &str = "intellichem_commands_total";

/// Direction of frame processing.
#[derive(Clone, Copy, Debug)]
pub enum Direction {
    /// Frames read from the bus.
    Inbound,
    /// Frames written to the bus.
    Outbound,
}

impl Direction {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Outcome of a poll cycle.
#[derive(Clone, Copy, Debug)]
pub enum PollResult {
    /// The device answered with a status response.
    Success,
    /// The response timeout elapsed.
    NoResponse,
}

impl PollResult {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            PollResult::Success => "success",
            PollResult::NoResponse => "no_response",
        }
    }
}

/// Record a frame for the given direction.
#[cfg(feature = "metrics")]
pub fn inc_frames(direction: Direction) {
    counter!(FRAMES_TOTAL, "direction" => direction.as_str()).increment(1);
}

/// Record `count` checksum rejections.
#[cfg(feature = "metrics")]
pub fn inc_checksum_errors(count: u64) { counter!(CHECKSUM_ERRORS).increment(count); }

/// Record a completed poll cycle.
#[cfg(feature = "metrics")]
pub fn inc_polls(result: PollResult) {
    counter!(POLLS_TOTAL, "result" => result.as_str()).increment(1);
}

/// Record a handled command; `result` is `"sent"`, `"rejected"` or `"failed"`.
#[cfg(feature = "metrics")]
pub fn inc_commands(result: &'static str) {
    counter!(COMMANDS_TOTAL, "result" => result).increment(1);
}

/// Record a frame for the given direction.
#[cfg(not(feature = "metrics"))]
pub fn inc_frames(_direction: Direction) {}

/// Record `count` checksum rejections.
#[cfg(not(feature = "metrics"))]
pub fn inc_checksum_errors(_count: u64) {}

/// Record a completed poll cycle.
#[cfg(not(feature = "metrics"))]
pub fn inc_polls(_result: PollResult) {}

/// Record a handled command.
#[cfg(not(feature = "metrics"))]
pub fn inc_commands(_result: &'static str) {}
