//! Unit tests for status response decoding.

use rstest::rstest;

use super::*;
use crate::{
    frame::{CONTROLLER_ADDRESS, build_frame},
    test_helpers::{
        SAMPLE_STATUS_PAYLOAD,
        default_status_response,
        payload_with,
        status_response,
    },
};

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

fn decode(payload: &[u8]) -> DeviceState {
    StatusDecoder::default()
        .decode(&default_status_response(payload))
        .expect("status response should decode")
}

#[test]
fn decodes_captured_payload() {
    let state = decode(&SAMPLE_STATUS_PAYLOAD);

    assert_eq!(state.address, 144);
    assert_close(state.ph.level, 7.50);
    assert_close(state.ph.setpoint, 7.60);
    assert_eq!(state.ph.tank_level, 5);
    assert_eq!(state.ph.tank_raw, 6);
    assert_eq!(state.ph.dose_time, 2);
    assert_eq!(state.ph.dose_volume, 10);
    assert_eq!(state.ph.dosing_status, DosingStatus::Monitoring);
    assert!(!state.ph.is_dosing());

    assert_close(state.orp.level, 700.0);
    assert_close(state.orp.setpoint, 700.0);
    assert_eq!(state.orp.tank_level, 4);
    assert_eq!(state.orp.dose_time, 5);
    assert_eq!(state.orp.dose_volume, 20);
    assert_eq!(state.orp.dosing_status, DosingStatus::Monitoring);

    assert_close(state.lsi, 0.03);
    assert_eq!(state.calcium_hardness, 250);
    assert_eq!(state.cyanuric_acid, 50);
    assert_eq!(state.alkalinity, 100);
    assert_eq!(state.salt_level, 3000);
    assert_eq!(state.temperature, 82);
    assert_eq!(state.firmware, "1.080");
    assert!(!state.alarms.any_active());
    assert!(!state.warnings.any_active());
    assert!(state.flow_detected);
    assert!(!state.comms_lost);
}

#[test]
fn all_zero_payload_decodes_to_baseline() {
    let state = decode(&[0; STATUS_PAYLOAD_LEN]);

    assert_close(state.ph.level, 0.0);
    assert_close(state.orp.level, 0.0);
    assert_close(state.lsi, 0.0);
    assert_eq!(state.firmware, "0.000");
    assert!(!state.alarms.any_active());
    assert!(!state.warnings.any_active());
    assert!(state.flow_detected);
    assert_eq!(state.ph.dosing_status, DosingStatus::Dosing);
    assert!(!state.ph.is_dosing(), "no doser fitted");
}

#[rstest]
#[case::zero(0x00, 0.0)]
#[case::positive(0x1E, 0.30)]
#[case::largest_positive(0x7F, 1.27)]
#[case::negative(0x9E, -0.98)]
#[case::most_negative(0x80, -1.28)]
#[case::least_negative(0xFF, -0.01)]
fn lsi_byte_boundaries(#[case] byte: u8, #[case] expected: f64) {
    assert_close(decode_lsi(byte), expected);
    assert_close(decode(&payload_with(22, byte)).lsi, expected);
}

#[rstest]
#[case::absent(0, 0)]
#[case::empty(1, 0)]
#[case::full(7, 6)]
fn tank_byte_boundaries(#[case] raw: u8, #[case] level: u8) {
    let mut payload = [0u8; STATUS_PAYLOAD_LEN];
    payload[20] = raw;
    payload[21] = raw;
    let state = decode(&payload);
    assert_eq!(state.ph.tank_level, level);
    assert_eq!(state.orp.tank_level, level);
}

#[test]
fn alarm_bits_map_independently() {
    let state = decode(&payload_with(32, ALARM_FLOW | ALARM_PH_TANK_EMPTY));
    assert!(state.alarms.flow);
    assert!(state.alarms.ph_tank_empty);
    assert!(!state.alarms.orp_tank_empty);
    assert!(!state.alarms.probe_fault);
    assert!(!state.alarms.comms);
    assert!(!state.flow_detected);
}

#[rstest]
#[case::ph_lockout(WARNING_PH_LOCKOUT)]
#[case::ph_daily(WARNING_PH_DAILY_LIMIT)]
#[case::orp_daily(WARNING_ORP_DAILY_LIMIT)]
#[case::invalid_setup(WARNING_INVALID_SETUP)]
#[case::chlorinator(WARNING_CHLORINATOR_COMM)]
fn each_warning_bit_raises_exactly_one_flag(#[case] bit: u8) {
    let w = decode(&payload_with(33, bit)).warnings;
    let raised = [
        w.ph_lockout,
        w.ph_daily_limit,
        w.orp_daily_limit,
        w.invalid_setup,
        w.chlorinator_comm_error,
    ];
    assert_eq!(raised.iter().filter(|&&flag| flag).count(), 1);
    assert!(w.any_active());
}

#[test]
fn dosing_byte_unpacks_type_and_status() {
    // pH: type 1, status Dosing. ORP: type 2, status Mixing.
    let byte = 0b1000_1001;
    let state = decode(&payload_with(34, byte));
    assert_eq!(state.ph.doser_type, 1);
    assert_eq!(state.ph.dosing_status, DosingStatus::Dosing);
    assert!(state.ph.is_dosing());
    assert_eq!(state.orp.doser_type, 2);
    assert_eq!(state.orp.dosing_status, DosingStatus::Mixing);
    assert!(!state.orp.is_dosing());
}

#[test]
fn dosing_status_three_clamps_to_mixing() {
    let state = decode(&payload_with(34, 0xF0));
    assert_eq!(state.ph.dosing_status, DosingStatus::Mixing);
    assert_eq!(state.orp.dosing_status, DosingStatus::Mixing);
}

#[test]
fn status_flag_reports_comms_lost() {
    assert!(decode(&payload_with(35, STATUS_COMMS_LOST)).comms_lost);
    assert!(!decode(&payload_with(35, 0x7F)).comms_lost);
}

#[test]
fn firmware_reads_major_from_later_byte() {
    let mut payload = [0u8; STATUS_PAYLOAD_LEN];
    payload[36] = 5;
    payload[37] = 2;
    assert_eq!(decode(&payload).firmware, "2.005");
}

#[test]
fn water_chemistry_clamps_out_of_range() {
    assert_eq!(
        decode(&payload_with(38, 200)).warnings.water_chemistry,
        WaterChemistry::Scaling
    );
}

#[test]
fn decoding_twice_yields_equal_snapshots() {
    let raw = default_status_response(&SAMPLE_STATUS_PAYLOAD);
    let decoder = StatusDecoder::default();
    assert_eq!(decoder.decode(&raw), decoder.decode(&raw));
}

#[test]
fn rejects_corrupted_checksum() {
    let mut raw = default_status_response(&[0; STATUS_PAYLOAD_LEN]).to_vec();
    let last = raw.len() - 1;
    raw[last] ^= 0xFF;
    assert_eq!(
        StatusDecoder::default().try_decode(&raw),
        Err(StatusRejection::InvalidChecksum)
    );
}

#[test]
fn rejects_request_action_with_status_shaped_payload() {
    let raw = build_frame(CONTROLLER_ADDRESS, 144, 210, &SAMPLE_STATUS_PAYLOAD)
        .expect("payload fits");
    assert_eq!(
        StatusDecoder::default().try_decode(&raw),
        Err(StatusRejection::NotStatusResponse { action: 210 })
    );
}

#[rstest]
#[case::controller(16)]
#[case::below_range(143)]
#[case::above_range(159)]
fn rejects_foreign_source(#[case] address: u8) {
    let raw = status_response(address, &SAMPLE_STATUS_PAYLOAD);
    assert_eq!(
        StatusDecoder::default().try_decode(&raw),
        Err(StatusRejection::InvalidSource { address })
    );
}

#[test]
fn accepts_highest_device_address() {
    let raw = status_response(158, &SAMPLE_STATUS_PAYLOAD);
    let state = StatusDecoder::default().decode(&raw).expect("decodes");
    assert_eq!(state.address, 158);
}

#[test]
fn rejects_short_payload() {
    let raw = default_status_response(&[0; 20]);
    assert_eq!(
        StatusDecoder::default().try_decode(&raw),
        Err(StatusRejection::PayloadTooShort { len: 20 })
    );
}

#[test]
fn longer_payload_is_accepted() {
    let mut payload = SAMPLE_STATUS_PAYLOAD.to_vec();
    payload.extend_from_slice(&[0xAA; 4]);
    assert_eq!(decode(&payload), decode(&SAMPLE_STATUS_PAYLOAD));
}

#[test]
fn short_input_never_panics() {
    let decoder = StatusDecoder::default();
    for len in 0..12 {
        let raw = vec![0xFF; len];
        assert!(decoder.decode(&raw).is_none());
    }
}
