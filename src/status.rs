//! Decoding of status responses into [`DeviceState`].
//!
//! A status response carries a fixed 41-byte payload. The decoder checks the
//! frame before reading any field and produces either a complete snapshot or
//! a [`StatusRejection`] naming the first failed check. Rejections are normal
//! on a shared bus and are not treated as failures.

use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    byte_order::read_network_u16,
    frame::{self, is_device_address, validate_checksum},
    message::Action,
    state::{Alarms, ChemicalChannel, DeviceState, DosingStatus, Warnings, WaterChemistry},
    trace::{TraceConfig, decode_span, dump_frame},
};

/// Minimum payload length of a status response.
pub const STATUS_PAYLOAD_LEN: usize = 41;

/// Alarm byte: no flow.
pub const ALARM_FLOW: u8 = 0x01;
/// Alarm byte: pH tank empty.
pub const ALARM_PH_TANK_EMPTY: u8 = 0x20;
/// Alarm byte: ORP tank empty.
pub const ALARM_ORP_TANK_EMPTY: u8 = 0x40;
/// Alarm byte: probe fault.
pub const ALARM_PROBE_FAULT: u8 = 0x80;

/// Warning byte: pH lockout.
pub const WARNING_PH_LOCKOUT: u8 = 0x01;
/// Warning byte: pH daily limit reached.
pub const WARNING_PH_DAILY_LIMIT: u8 = 0x02;
/// Warning byte: ORP daily limit reached.
pub const WARNING_ORP_DAILY_LIMIT: u8 = 0x04;
/// Warning byte: invalid setup.
pub const WARNING_INVALID_SETUP: u8 = 0x08;
/// Warning byte: chlorinator unreachable.
pub const WARNING_CHLORINATOR_COMM: u8 = 0x10;

/// Status flags byte: device lost contact with its peripherals.
pub const STATUS_COMMS_LOST: u8 = 0x80;

const PH_LEVEL: usize = 0;
const ORP_LEVEL: usize = 2;
const PH_SETPOINT: usize = 4;
const ORP_SETPOINT: usize = 6;
const PH_DOSE_TIME: usize = 10;
const ORP_DOSE_TIME: usize = 14;
const PH_DOSE_VOLUME: usize = 16;
const ORP_DOSE_VOLUME: usize = 18;
const PH_TANK: usize = 20;
const ORP_TANK: usize = 21;
const LSI: usize = 22;
const CALCIUM_HARDNESS: usize = 23;
const CYANURIC_ACID: usize = 26;
const ALKALINITY: usize = 27;
const SALT: usize = 29;
const TEMPERATURE: usize = 31;
const ALARMS: usize = 32;
const WARNINGS: usize = 33;
const DOSING: usize = 34;
const STATUS_FLAGS: usize = 35;
const FIRMWARE_MINOR: usize = 36;
const FIRMWARE_MAJOR: usize = 37;
const WATER_CHEMISTRY: usize = 38;

const SALT_SCALE: u16 = 50;

/// Why a frame did not yield a [`DeviceState`].
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum StatusRejection {
    /// Trailing checksum does not match the frame contents.
    #[error("frame checksum invalid")]
    InvalidChecksum,
    /// Frame is some other message type.
    #[error("not a status response (action {action})")]
    NotStatusResponse {
        /// Action code found in the frame.
        action: u8,
    },
    /// Sender is not an IntelliChem.
    #[error("source address {address} outside 144..=158")]
    InvalidSource {
        /// Source address found in the frame.
        address: u8,
    },
    /// Payload cannot hold every status field.
    #[error("status payload too short: {len} < 41")]
    PayloadTooShort {
        /// Payload length found in the frame.
        len: usize,
    },
}

/// Turns raw status responses into device snapshots.
///
/// The decoder holds no state between calls; decoding the same frame twice
/// yields equal snapshots.
///
/// # Examples
///
/// ```
/// use intellichem::{frame::build_frame, status::StatusDecoder};
///
/// let raw = build_frame(16, 144, 18, &[0; 41]).expect("payload fits");
/// let state = StatusDecoder::default().decode(&raw).expect("valid status response");
/// assert_eq!(state.firmware, "0.000");
/// assert!(state.flow_detected);
/// ```
#[derive(Clone, Debug, Default)]
pub struct StatusDecoder {
    trace: TraceConfig,
}

impl StatusDecoder {
    /// Create a decoder tracing at the levels in `trace`.
    #[must_use]
    pub fn new(trace: TraceConfig) -> Self { Self { trace } }

    /// Decode `raw`, discarding the reason for any rejection.
    #[must_use]
    pub fn decode(&self, raw: &[u8]) -> Option<DeviceState> { self.try_decode(raw).ok() }

    /// Decode `raw` into a snapshot.
    ///
    /// # Errors
    ///
    /// Returns the first failed check, in order: checksum, action code,
    /// source address, payload length.
    pub fn try_decode(&self, raw: &[u8]) -> Result<DeviceState, StatusRejection> {
        let span = decode_span(&self.trace, raw.len());
        let _guard = span.enter();
        dump_frame(&self.trace, "inbound", raw);

        let result = check_and_decode(raw);
        match &result {
            Ok(state) => {
                span.record("result", "ok");
                debug!(
                    ph = state.ph.level,
                    orp = state.orp.level,
                    temperature = state.temperature,
                    lsi = state.lsi,
                    flow = state.flow_detected,
                    "status decoded"
                );
            }
            Err(rejection @ StatusRejection::NotStatusResponse { .. }) => {
                span.record("result", "skipped");
                debug!(%rejection, "status frame skipped");
            }
            Err(rejection) => {
                span.record("result", "rejected");
                warn!(%rejection, "status frame rejected");
            }
        }
        result
    }
}

fn check_and_decode(raw: &[u8]) -> Result<DeviceState, StatusRejection> {
    if !validate_checksum(raw) {
        return Err(StatusRejection::InvalidChecksum);
    }
    // A valid checksum implies a complete header.
    let action = frame::action(raw).unwrap_or_default();
    if action != Action::StatusResponse.code() {
        return Err(StatusRejection::NotStatusResponse { action });
    }
    let address = frame::source(raw).unwrap_or_default();
    if !is_device_address(address) {
        return Err(StatusRejection::InvalidSource { address });
    }
    decode_payload(frame::payload(raw).unwrap_or_default(), address)
}

/// Decode a bare status payload sent by `address`.
///
/// # Errors
///
/// Returns [`StatusRejection::PayloadTooShort`] if `payload` is shorter than
/// [`STATUS_PAYLOAD_LEN`].
pub fn decode_payload(payload: &[u8], address: u8) -> Result<DeviceState, StatusRejection> {
    if payload.len() < STATUS_PAYLOAD_LEN {
        return Err(StatusRejection::PayloadTooShort { len: payload.len() });
    }
    let be16 = |offset: usize| read_network_u16([payload[offset], payload[offset + 1]]);

    let dosing = payload[DOSING];
    let ph = ChemicalChannel {
        level: f64::from(be16(PH_LEVEL)) / 100.0,
        setpoint: f64::from(be16(PH_SETPOINT)) / 100.0,
        dose_time: be16(PH_DOSE_TIME),
        dose_volume: be16(PH_DOSE_VOLUME),
        tank_level: ChemicalChannel::tank_level_from_raw(payload[PH_TANK]),
        tank_raw: payload[PH_TANK],
        doser_type: dosing & 0x03,
        dosing_status: DosingStatus::from_bits((dosing & 0x30) >> 4),
    };
    let orp = ChemicalChannel {
        level: f64::from(be16(ORP_LEVEL)),
        setpoint: f64::from(be16(ORP_SETPOINT)),
        dose_time: be16(ORP_DOSE_TIME),
        dose_volume: be16(ORP_DOSE_VOLUME),
        tank_level: ChemicalChannel::tank_level_from_raw(payload[ORP_TANK]),
        tank_raw: payload[ORP_TANK],
        doser_type: (dosing & 0x0C) >> 2,
        dosing_status: DosingStatus::from_bits((dosing & 0xC0) >> 6),
    };

    let alarm_bits = payload[ALARMS];
    let alarms = Alarms {
        flow: alarm_bits & ALARM_FLOW != 0,
        ph_tank_empty: alarm_bits & ALARM_PH_TANK_EMPTY != 0,
        orp_tank_empty: alarm_bits & ALARM_ORP_TANK_EMPTY != 0,
        probe_fault: alarm_bits & ALARM_PROBE_FAULT != 0,
        comms: false,
    };
    let warning_bits = payload[WARNINGS];
    let warnings = Warnings {
        ph_lockout: warning_bits & WARNING_PH_LOCKOUT != 0,
        ph_daily_limit: warning_bits & WARNING_PH_DAILY_LIMIT != 0,
        orp_daily_limit: warning_bits & WARNING_ORP_DAILY_LIMIT != 0,
        invalid_setup: warning_bits & WARNING_INVALID_SETUP != 0,
        chlorinator_comm_error: warning_bits & WARNING_CHLORINATOR_COMM != 0,
        water_chemistry: WaterChemistry::from_byte(payload[WATER_CHEMISTRY]),
    };

    Ok(DeviceState {
        address,
        ph,
        orp,
        lsi: decode_lsi(payload[LSI]),
        calcium_hardness: be16(CALCIUM_HARDNESS),
        cyanuric_acid: payload[CYANURIC_ACID],
        alkalinity: be16(ALKALINITY),
        salt_level: u16::from(payload[SALT]) * SALT_SCALE,
        temperature: payload[TEMPERATURE],
        firmware: format!(
            "{}.{:03}",
            payload[FIRMWARE_MAJOR], payload[FIRMWARE_MINOR]
        ),
        flow_detected: !alarms.flow,
        comms_lost: payload[STATUS_FLAGS] & STATUS_COMMS_LOST != 0,
        alarms,
        warnings,
    })
}

/// Decode the saturation index byte.
///
/// Bit 7 marks a negative value whose magnitude is `256 - byte`, so `0x9E`
/// reads as `-0.98` and `0x80` as `-1.28`.
#[must_use]
pub fn decode_lsi(byte: u8) -> f64 {
    if byte & 0x80 == 0 {
        f64::from(byte) / 100.0
    } else {
        f64::from(256 - u16::from(byte)) / -100.0
    }
}

#[cfg(test)]
mod tests;
