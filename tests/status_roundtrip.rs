//! Status frames built by the test encoder decode back to the same state.

use intellichem::{
    Message,
    StatusDecoder,
    TraceConfig,
    state::{DosingStatus, WaterChemistry},
};
use intellichem_testing::{sample_state, status_frame};
use rstest::rstest;

fn decode(state: &intellichem::DeviceState) -> intellichem::DeviceState {
    let decoder = StatusDecoder::new(TraceConfig::default());
    match Message::classify(&status_frame(state), &decoder) {
        Message::StatusResponse(decoded) => decoded,
        other => panic!("expected a status response, got {other:?}"),
    }
}

#[test]
fn sample_state_survives_the_wire() {
    let state = sample_state();
    assert_eq!(decode(&state), state);
}

#[rstest]
#[case::flow_alarm(|s: &mut intellichem::DeviceState| {
    s.alarms.flow = true;
    s.flow_detected = false;
})]
#[case::tank_alarms(|s: &mut intellichem::DeviceState| {
    s.alarms.ph_tank_empty = true;
    s.alarms.orp_tank_empty = true;
    s.alarms.probe_fault = true;
})]
#[case::warnings(|s: &mut intellichem::DeviceState| {
    s.warnings.ph_lockout = true;
    s.warnings.orp_daily_limit = true;
    s.warnings.chlorinator_comm_error = true;
    s.warnings.water_chemistry = WaterChemistry::Corrosive;
})]
#[case::mixing_and_empty_tank(|s: &mut intellichem::DeviceState| {
    s.ph.dosing_status = DosingStatus::Mixing;
    s.ph.tank_raw = 1;
    s.ph.tank_level = 0;
})]
#[case::dosing_disabled(|s: &mut intellichem::DeviceState| {
    s.orp.tank_raw = 0;
    s.orp.tank_level = 0;
})]
#[case::positive_lsi(|s: &mut intellichem::DeviceState| s.lsi = 0.35)]
#[case::device_comms_lost(|s: &mut intellichem::DeviceState| s.comms_lost = true)]
#[case::other_address(|s: &mut intellichem::DeviceState| s.address = 150)]
fn variations_survive_the_wire(#[case] change: fn(&mut intellichem::DeviceState)) {
    let mut state = sample_state();
    change(&mut state);
    assert_eq!(decode(&state), state);
}

#[test]
fn frame_from_controller_address_is_not_a_status() {
    let mut state = sample_state();
    state.address = 16;
    let decoder = StatusDecoder::new(TraceConfig::default());
    assert!(!matches!(
        Message::classify(&status_frame(&state), &decoder),
        Message::StatusResponse(_)
    ));
}
