//! Status payload encoding, the inverse of the crate's decoder.

use bytes::Bytes;
use intellichem::{
    frame::{CONTROLLER_ADDRESS, build_frame},
    message::Action,
    state::{Alarms, ChemicalChannel, DeviceState, DosingStatus, Warnings, WaterChemistry},
    status::{
        ALARM_FLOW,
        ALARM_ORP_TANK_EMPTY,
        ALARM_PH_TANK_EMPTY,
        ALARM_PROBE_FAULT,
        STATUS_COMMS_LOST,
        STATUS_PAYLOAD_LEN,
        WARNING_CHLORINATOR_COMM,
        WARNING_INVALID_SETUP,
        WARNING_ORP_DAILY_LIMIT,
        WARNING_PH_DAILY_LIMIT,
        WARNING_PH_LOCKOUT,
    },
};

fn put_u16(payload: &mut [u8], offset: usize, value: u16) {
    payload[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
}

fn flag(set: bool, mask: u8) -> u8 { if set { mask } else { 0 } }

fn encode_lsi(lsi: f64) -> u8 {
    let hundredths = (lsi * 100.0).round() as i16;
    if hundredths < 0 {
        (256 + hundredths) as u8
    } else {
        hundredths as u8
    }
}

fn firmware_bytes(firmware: &str) -> (u8, u8) {
    let (major, minor) = firmware.split_once('.').unwrap_or((firmware, "0"));
    (
        major.parse().expect("firmware major is a byte"),
        minor.parse().expect("firmware minor is a byte"),
    )
}

/// Encode `state` as a 41-byte status payload.
///
/// Derived fields are not encoded: `tank_level` comes from `tank_raw`,
/// `flow_detected` from the flow alarm and `alarms.comms` is never sent.
///
/// # Panics
///
/// Panics if the firmware string is not `major.minor` with byte-sized parts.
pub fn encode_status(state: &DeviceState) -> [u8; STATUS_PAYLOAD_LEN] {
    let mut payload = [0u8; STATUS_PAYLOAD_LEN];
    put_u16(&mut payload, 0, (state.ph.level * 100.0).round() as u16);
    put_u16(&mut payload, 2, state.orp.level.round() as u16);
    put_u16(&mut payload, 4, (state.ph.setpoint * 100.0).round() as u16);
    put_u16(&mut payload, 6, state.orp.setpoint.round() as u16);
    put_u16(&mut payload, 10, state.ph.dose_time);
    put_u16(&mut payload, 14, state.orp.dose_time);
    put_u16(&mut payload, 16, state.ph.dose_volume);
    put_u16(&mut payload, 18, state.orp.dose_volume);
    payload[20] = state.ph.tank_raw;
    payload[21] = state.orp.tank_raw;
    payload[22] = encode_lsi(state.lsi);
    put_u16(&mut payload, 23, state.calcium_hardness);
    payload[26] = state.cyanuric_acid;
    put_u16(&mut payload, 27, state.alkalinity);
    payload[29] = (state.salt_level / 50) as u8;
    payload[31] = state.temperature;
    payload[32] = flag(state.alarms.flow, ALARM_FLOW)
        | flag(state.alarms.ph_tank_empty, ALARM_PH_TANK_EMPTY)
        | flag(state.alarms.orp_tank_empty, ALARM_ORP_TANK_EMPTY)
        | flag(state.alarms.probe_fault, ALARM_PROBE_FAULT);
    payload[33] = flag(state.warnings.ph_lockout, WARNING_PH_LOCKOUT)
        | flag(state.warnings.ph_daily_limit, WARNING_PH_DAILY_LIMIT)
        | flag(state.warnings.orp_daily_limit, WARNING_ORP_DAILY_LIMIT)
        | flag(state.warnings.invalid_setup, WARNING_INVALID_SETUP)
        | flag(state.warnings.chlorinator_comm_error, WARNING_CHLORINATOR_COMM);
    payload[34] = (state.ph.doser_type & 0x03)
        | ((state.orp.doser_type & 0x03) << 2)
        | (state.ph.dosing_status.code() << 4)
        | (state.orp.dosing_status.code() << 6);
    payload[35] = flag(state.comms_lost, STATUS_COMMS_LOST);
    let (major, minor) = firmware_bytes(&state.firmware);
    payload[36] = minor;
    payload[37] = major;
    payload[38] = state.warnings.water_chemistry.code();
    payload
}

/// Complete status response frame carrying `state`.
pub fn status_frame(state: &DeviceState) -> Bytes {
    build_frame(
        CONTROLLER_ADDRESS,
        state.address,
        Action::StatusResponse.code(),
        &encode_status(state),
    )
    .expect("status payload fits in a frame")
}

fn channel(level: f64, setpoint: f64, tank_raw: u8, status: DosingStatus) -> ChemicalChannel {
    ChemicalChannel {
        level,
        setpoint,
        dose_time: 0,
        dose_volume: 0,
        tank_level: ChemicalChannel::tank_level_from_raw(tank_raw),
        tank_raw,
        doser_type: 1,
        dosing_status: status,
    }
}

/// A healthy pool at address 144.
///
/// Every field survives an encode/decode round trip unchanged.
pub fn sample_state() -> DeviceState {
    DeviceState {
        address: 144,
        ph: channel(7.5, 7.6, 6, DosingStatus::Monitoring),
        orp: channel(700.0, 650.0, 5, DosingStatus::Dosing),
        lsi: -0.12,
        calcium_hardness: 250,
        cyanuric_acid: 50,
        alkalinity: 100,
        salt_level: 3200,
        temperature: 82,
        firmware: "1.080".to_owned(),
        alarms: Alarms::default(),
        warnings: Warnings {
            water_chemistry: WaterChemistry::Ok,
            ..Warnings::default()
        },
        flow_detected: true,
        comms_lost: false,
    }
}
