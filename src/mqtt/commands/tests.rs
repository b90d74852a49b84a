//! Tests for command parsing and the command handler.

use std::time::Duration;

use rstest::{fixture, rstest};
use tokio::time::Instant;

use super::*;
use crate::{
    command::Limit,
    status::decode_payload,
    test_helpers::SAMPLE_STATUS_PAYLOAD,
};

const TOPIC_PREFIX: &str = "pool";

fn control(enabled: bool, rate_limit_seconds: u64) -> ControlConfig {
    ControlConfig {
        enabled,
        rate_limit_seconds,
        limits: SetpointLimits::default(),
    }
}

#[fixture]
fn handler() -> CommandHandler { CommandHandler::new(Topics::new(TOPIC_PREFIX), 144, &control(true, 0)) }

fn topic(name: &str) -> String { Topics::new(TOPIC_PREFIX).command(name) }

fn seed() -> DeviceState { decode_payload(&SAMPLE_STATUS_PAYLOAD, 144).expect("sample decodes") }

fn rejection(outcome: Option<CommandOutcome>) -> CommandResult {
    match outcome {
        Some(CommandOutcome::Rejected(result)) => result,
        other => panic!("expected a rejection, got {other:?}"),
    }
}

fn prepared(outcome: Option<CommandOutcome>) -> PreparedCommand {
    match outcome {
        Some(CommandOutcome::Ready(prepared)) => prepared,
        other => panic!("expected a prepared command, got {other:?}"),
    }
}

#[rstest]
#[case::ph("ph_setpoint", "7.4", Command::PhSetpoint(7.4))]
#[case::orp_decimal("orp_setpoint", "650.9", Command::OrpSetpoint(650))]
#[case::calcium("calcium_hardness", " 300 ", Command::CalciumHardness(300))]
#[case::cya("cyanuric_acid", "50", Command::CyanuricAcid(50))]
#[case::alkalinity("alkalinity", "120.0", Command::Alkalinity(120))]
#[case::dosing_on("ph_dosing", "ON", Command::Dosing(DosingChannel::Ph, true))]
#[case::dosing_yes("orp_dosing", "Yes", Command::Dosing(DosingChannel::Orp, true))]
#[case::dosing_one("orp_dosing", "1", Command::Dosing(DosingChannel::Orp, true))]
#[case::dosing_off("ph_dosing", "OFF", Command::Dosing(DosingChannel::Ph, false))]
#[case::dosing_garbage("ph_dosing", "maybe", Command::Dosing(DosingChannel::Ph, false))]
fn payloads_parse(#[case] name: &str, #[case] payload: &str, #[case] expected: Command) {
    let command = Command::parse(name, payload, &SetpointLimits::default()).expect("valid payload");
    assert_eq!(command, expected);
    assert_eq!(command.name(), name);
}

#[rstest]
#[case::ph_high("ph_setpoint", "7.8", "ph_setpoint")]
#[case::orp_low("orp_setpoint", "399", "orp_setpoint")]
#[case::cya_high("cyanuric_acid", "300", "cyanuric_acid")]
#[case::alkalinity_low("alkalinity", "10", "alkalinity")]
fn out_of_range_payloads_name_the_field(#[case] name: &str, #[case] payload: &str, #[case] field: &str) {
    let err = Command::parse(name, payload, &SetpointLimits::default()).expect_err("out of range");
    let CommandError::OutOfRange(validation) = err else {
        panic!("expected a range error, got {err:?}");
    };
    assert_eq!(validation.field, field);
}

#[test]
fn non_numeric_payload_is_refused() {
    let err = Command::parse("ph_setpoint", "high", &SetpointLimits::default()).expect_err("text");
    assert!(matches!(err, CommandError::NotANumber { command: "ph_setpoint", .. }));
    let err = Command::parse("ph_setpoint", "NaN", &SetpointLimits::default()).expect_err("nan");
    assert!(matches!(err, CommandError::NotANumber { .. }));
}

#[test]
fn cyanuric_acid_cannot_exceed_one_byte() {
    let limits = SetpointLimits {
        cyanuric_acid: Limit::new(0.0, 1000.0),
        ..SetpointLimits::default()
    };
    let err = Command::parse("cyanuric_acid", "300", &limits).expect_err("too wide");
    assert!(matches!(err, CommandError::OutOfRange(ValidationError { max, .. }) if max == 255.0));
}

#[rstest]
#[case::orp_past_word("orp_setpoint", "70000")]
#[case::calcium_past_word("calcium_hardness", "70000")]
#[case::alkalinity_negative("alkalinity", "-5")]
fn values_the_wire_cannot_carry_are_refused(#[case] name: &str, #[case] payload: &str) {
    let wide = Limit::new(-100.0, 100_000.0);
    let limits = SetpointLimits {
        orp_setpoint: wide,
        calcium_hardness: wide,
        alkalinity: wide,
        ..SetpointLimits::default()
    };
    let err = Command::parse(name, payload, &limits).expect_err("does not fit two bytes");
    let CommandError::OutOfRange(validation) = err else {
        panic!("expected a range error, got {err:?}");
    };
    assert_eq!(validation.field, name);
    assert_eq!((validation.min, validation.max), (0.0, 65535.0));
}

#[test]
fn ph_setpoint_past_the_scaled_field_is_refused() {
    let limits = SetpointLimits {
        ph_setpoint: Limit::new(0.0, 1000.0),
        ..SetpointLimits::default()
    };
    let err = Command::parse("ph_setpoint", "700", &limits).expect_err("does not fit two bytes");
    assert!(matches!(err, CommandError::OutOfRange(ValidationError { max, .. }) if max == 655.35));
}

#[rstest]
fn non_command_topics_are_ignored(handler: CommandHandler) {
    assert!(handler.handle("pool/intellichem/ph/level", b"7.4", None).is_none());
    assert!(handler.handle("other/intellichem/set/ph_setpoint", b"7.4", None).is_none());
}

#[test]
fn disabled_control_rejects_everything() {
    let handler = CommandHandler::new(Topics::new(TOPIC_PREFIX), 144, &control(false, 0));
    let result = rejection(handler.handle(&topic("ph_setpoint"), b"7.4", None));
    assert!(!result.success);
    assert_eq!(result.message.as_deref(), Some("Control features are disabled"));
    assert_eq!(result.value, None);
}

#[rstest]
fn unknown_command_is_named(handler: CommandHandler) {
    let result = rejection(handler.handle(&topic("salt_level"), b"3000", None));
    assert_eq!(result.command, "salt_level");
    assert_eq!(result.message.as_deref(), Some("Unknown command: salt_level"));
}

#[rstest]
fn invalid_utf8_is_rejected(handler: CommandHandler) {
    let result = rejection(handler.handle(&topic("ph_setpoint"), &[0xFF, 0xFE], None));
    assert_eq!(result.message.as_deref(), Some("Invalid payload encoding"));
}

#[rstest]
fn validation_failure_echoes_the_payload(handler: CommandHandler) {
    let result = rejection(handler.handle(&topic("orp_setpoint"), b"1000", None));
    assert_eq!(
        result.message.as_deref(),
        Some("orp_setpoint 1000 outside allowed range 400..=800")
    );
    assert_eq!(result.value.as_deref(), Some("1000"));
}

#[rstest]
fn accepted_command_merges_with_last_state(handler: CommandHandler) {
    let seed = seed();
    let baseline = CommandBuilder::new(Some(&seed))
        .build(144, &SetpointLimits::default())
        .expect("seed is in range");
    let command = prepared(handler.handle(&topic("ph_setpoint"), b"7.4", Some(&seed)));

    assert_eq!(command.command(), Command::PhSetpoint(7.4));
    assert_eq!(command.frame().destination(), 144);
    let changed: Vec<usize> = command
        .frame()
        .payload()
        .iter()
        .zip(baseline.payload())
        .enumerate()
        .filter(|(_, (a, b))| a != b)
        .map(|(i, _)| i)
        .collect();
    assert!(!changed.is_empty());
    assert!(changed.iter().all(|i| *i < 2), "unexpected bytes changed: {changed:?}");
}

#[rstest]
fn finished_command_reports_send_result(handler: CommandHandler) {
    let command = prepared(handler.handle(&topic("ph_dosing"), b"OFF", None));
    assert_eq!(command.frame().payload()[4], 0);
    let result = command.clone().finish(true);
    assert_eq!(
        result,
        CommandResult {
            success: true,
            command: "ph_dosing".into(),
            message: Some("Command sent".into()),
            value: Some("OFF".into()),
        }
    );
    let failed = command.finish(false);
    assert!(!failed.success);
    assert_eq!(failed.message.as_deref(), Some("Failed to send command"));
}

#[test]
fn result_json_omits_absent_fields() {
    let result = CommandResult::failure("ph_setpoint", "Control features are disabled", None);
    let json = serde_json::to_string(&result).expect("serialises");
    assert_eq!(
        json,
        r#"{"success":false,"command":"ph_setpoint","message":"Control features are disabled"}"#
    );
}

#[tokio::test(start_paused = true)]
async fn rate_limiter_spaces_commands() {
    let handler = CommandHandler::new(Topics::new(TOPIC_PREFIX), 144, &control(true, 5));
    let start = Instant::now();
    prepared(handler.handle(&topic("ph_setpoint"), b"7.4", None));
    handler.ready().await;
    assert!(start.elapsed() < Duration::from_secs(1));
    prepared(handler.handle(&topic("ph_setpoint"), b"7.5", None));
    handler.ready().await;
    assert!(start.elapsed() >= Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn rejected_commands_do_not_consume_the_rate_limit() {
    let handler = CommandHandler::new(Topics::new(TOPIC_PREFIX), 144, &control(true, 5));
    let start = Instant::now();
    rejection(handler.handle(&topic("ph_setpoint"), b"9.9", None));
    prepared(handler.handle(&topic("ph_setpoint"), b"7.4", None));
    handler.ready().await;
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn abandoned_wait_leaves_the_limiter_usable() {
    let handler = CommandHandler::new(Topics::new(TOPIC_PREFIX), 144, &control(true, 5));
    handler.ready().await;
    let start = Instant::now();
    let waited = tokio::time::timeout(Duration::from_secs(1), handler.ready()).await;
    assert!(waited.is_err());
    handler.ready().await;
    assert!(start.elapsed() <= Duration::from_secs(6));
}

#[tokio::test]
async fn unlimited_handler_is_always_ready() {
    let handler = CommandHandler::new(Topics::new(TOPIC_PREFIX), 144, &control(true, 0));
    for _ in 0..3 {
        handler.ready().await;
    }
}
