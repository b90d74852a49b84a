//! Unit tests for configuration command encoding.

use rstest::{fixture, rstest};

use super::*;
use crate::{
    status::StatusDecoder,
    test_helpers::{SAMPLE_STATUS_PAYLOAD, default_status_response},
};

#[fixture]
fn seed() -> DeviceState {
    StatusDecoder::default()
        .decode(&default_status_response(&SAMPLE_STATUS_PAYLOAD))
        .expect("sample payload decodes")
}

#[fixture]
fn limits() -> SetpointLimits { SetpointLimits::default() }

#[test]
fn default_values_encode_exactly() {
    let payload = ConfigurationValues::default().encode_payload();
    let expected: [u8; CONFIG_PAYLOAD_LEN] = [
        0x02, 0xD0, // pH 7.2 -> 720
        0x02, 0x8A, // ORP 650
        7, 7, // tanks
        0x01, 0x2C, // calcium 300
        0, 30, // reserved, CYA
        0x00, 0x00, 0x50, // alkalinity high, reserved, low
        0, 0, 0, 0, 0, 0, 0, 0,
    ];
    assert_eq!(payload, expected);
}

#[test]
fn alkalinity_bytes_straddle_reserved_byte() {
    let values = ConfigurationValues {
        alkalinity: 0x0123,
        ..ConfigurationValues::default()
    };
    let payload = values.encode_payload();
    assert_eq!(payload[10], 0x01);
    assert_eq!(payload[11], 0x00);
    assert_eq!(payload[12], 0x23);
}

#[rstest]
#[case::exact(7.4, 740)]
#[case::binary_fraction(7.35, 735)]
#[case::lowest(7.0, 700)]
fn ph_setpoint_is_rounded_to_hundredths(#[case] ph: f64, #[case] encoded: u16) {
    let values = ConfigurationValues {
        ph_setpoint: ph,
        ..ConfigurationValues::default()
    };
    assert_eq!(&values.encode_payload()[..2], &encoded.to_be_bytes());
}

#[rstest]
fn seeded_ph_change_touches_only_ph_bytes(seed: DeviceState, limits: SetpointLimits) {
    let baseline = CommandBuilder::new(Some(&seed))
        .build(144, &limits)
        .expect("seed values are in range");
    let changed = CommandBuilder::new(Some(&seed))
        .with_ph_setpoint(7.4)
        .build(144, &limits)
        .expect("7.4 is in range");

    let differing: Vec<usize> = baseline
        .payload()
        .iter()
        .zip(changed.payload().iter())
        .enumerate()
        .filter_map(|(i, (a, b))| (a != b).then_some(i))
        .collect();
    // 7.60 and 7.40 share the high byte 0x02.
    assert_eq!(differing, vec![1]);
    assert_eq!(&changed.payload()[..2], &[0x02, 0xE4]);
}

#[rstest]
fn ph_change_across_high_byte_touches_both_ph_bytes(mut seed: DeviceState) {
    let limits = SetpointLimits {
        ph_setpoint: Limit::new(7.0, 8.0),
        ..SetpointLimits::default()
    };
    seed.ph.setpoint = 7.68;
    let baseline = CommandBuilder::new(Some(&seed))
        .build(144, &limits)
        .expect("seed values are in range");
    let changed = CommandBuilder::new(Some(&seed))
        .with_ph_setpoint(7.4)
        .build(144, &limits)
        .expect("7.4 is in range");

    let differing: Vec<usize> = baseline
        .payload()
        .iter()
        .zip(changed.payload().iter())
        .enumerate()
        .filter_map(|(i, (a, b))| (a != b).then_some(i))
        .collect();
    assert_eq!(&baseline.payload()[..2], &[0x03, 0x00]);
    assert_eq!(differing, vec![0, 1]);
}

#[rstest]
fn seed_carries_raw_tank_bytes(seed: DeviceState) {
    let values = *CommandBuilder::new(Some(&seed)).values();
    assert_eq!(values.ph_tank, seed.ph.tank_raw);
    assert_eq!(values.orp_tank, seed.orp.tank_raw);
    assert_eq!(values.orp_setpoint, 700);
    assert_eq!(values.calcium_hardness, 250);
}

#[rstest]
fn frame_is_addressed_from_controller(limits: SetpointLimits) {
    let frame = CommandBuilder::new(None)
        .build(150, &limits)
        .expect("defaults are in range");
    assert_eq!(frame.destination(), 150);
    assert_eq!(frame.source(), CONTROLLER_ADDRESS);
    assert_eq!(frame.action(), 146);
    assert_eq!(frame.payload().len(), CONFIG_PAYLOAD_LEN);
}

#[rstest]
fn disable_then_enable_restores_observed_level(seed: DeviceState) {
    let disabled = CommandBuilder::new(Some(&seed)).with_dosing(DosingChannel::Ph, false);
    assert_eq!(disabled.values().ph_tank, 0);
    let enabled = disabled.with_dosing(DosingChannel::Ph, true);
    assert_eq!(enabled.values().ph_tank, seed.ph.tank_raw);
}

#[test]
fn enable_without_history_uses_full_tank() {
    let state = DeviceState::default();
    let builder = CommandBuilder::new(Some(&state)).with_dosing(DosingChannel::Orp, true);
    assert_eq!(builder.values().orp_tank, TANK_RAW_MAX);
}

#[rstest]
#[case::ph_low(CommandBuilder::new(None).with_ph_setpoint(6.9), "ph_setpoint")]
#[case::ph_high(CommandBuilder::new(None).with_ph_setpoint(7.7), "ph_setpoint")]
#[case::orp(CommandBuilder::new(None).with_orp_setpoint(850), "orp_setpoint")]
#[case::ph_tank(CommandBuilder::new(None).with_tank_level(DosingChannel::Ph, 8), "ph_tank_level")]
#[case::orp_tank(
    CommandBuilder::new(None).with_tank_level(DosingChannel::Orp, 9),
    "orp_tank_level"
)]
#[case::calcium(CommandBuilder::new(None).with_calcium_hardness(10), "calcium_hardness")]
#[case::cya(CommandBuilder::new(None).with_cyanuric_acid(211), "cyanuric_acid")]
#[case::alkalinity(CommandBuilder::new(None).with_alkalinity(900), "alkalinity")]
fn out_of_range_field_is_named(
    #[case] builder: CommandBuilder,
    #[case] field: &str,
    limits: SetpointLimits,
) {
    let err = builder.build(144, &limits).expect_err("value out of range");
    assert_eq!(err.field, field);
}

#[test]
fn first_failing_field_is_reported() {
    let err = CommandBuilder::new(None)
        .with_orp_setpoint(1000)
        .with_alkalinity(1)
        .build(144, &SetpointLimits::default())
        .expect_err("two fields out of range");
    assert_eq!(err.field, "orp_setpoint");
    assert_eq!(err.to_string(), "orp_setpoint 1000 outside allowed range 400..=800");
}

#[test]
fn injected_limits_replace_defaults() {
    let limits = SetpointLimits {
        orp_setpoint: Limit::from(600.0..=700.0),
        ..SetpointLimits::default()
    };
    let err = CommandBuilder::new(None)
        .with_orp_setpoint(750)
        .build(144, &limits)
        .expect_err("narrowed range rejects 750");
    assert_eq!((err.min, err.max), (600.0, 700.0));
}

#[test]
fn disabled_channel_validates() {
    CommandBuilder::new(None)
        .with_dosing(DosingChannel::Ph, false)
        .with_dosing(DosingChannel::Orp, false)
        .build(144, &SetpointLimits::default())
        .expect("zero tank level disables dosing");
}

#[test]
fn ph_setpoint_past_the_scaled_field_is_not_encoded() {
    let limits = SetpointLimits {
        ph_setpoint: Limit::new(0.0, 1000.0),
        ..SetpointLimits::default()
    };
    let err = CommandBuilder::new(None)
        .with_ph_setpoint(700.0)
        .build(144, &limits)
        .expect_err("700.00 does not fit two bytes");
    assert_eq!(err.field, "ph_setpoint");
    assert_eq!(err.max, PH_SETPOINT_CAPACITY.max);
}

#[rstest]
#[case::inside(Limit::new(7.0, 7.6), true)]
#[case::edge(Limit::new(0.0, 655.35), true)]
#[case::above(Limit::new(7.0, 700.0), false)]
#[case::below(Limit::new(-1.0, 7.6), false)]
fn limits_nest_within_field_capacity(#[case] limit: Limit, #[case] fits: bool) {
    assert_eq!(limit.is_within(&PH_SETPOINT_CAPACITY), fits);
}
