//! Log output of the bridge.
//!
//! `tracing` forwards events to the `log` facade, so they are captured here
//! with `logtest` as well as with `tracing-test`.

use std::time::Duration;

use intellichem::{BusClient, app::Bridge};
use intellichem_testing::{LoggerHandle, RecordingSink, Reply, logger, sample_state, spawn_device};
use rstest::rstest;
use serial_test::serial;
use tokio::io::DuplexStream;
use tracing_test::traced_test;

const TIMEOUT: Duration = Duration::from_secs(5);

fn log_only(stream: DuplexStream) -> Bridge<DuplexStream, RecordingSink> {
    Bridge::new(BusClient::new(stream, 144, TIMEOUT), Duration::from_secs(30))
}

#[rstest]
#[serial(logs)]
#[tokio::test]
async fn log_only_mode_logs_readings(mut logger: LoggerHandle) {
    let (stream, _device) = spawn_device([Reply::Status(sample_state())]);
    let mut bridge = log_only(stream);

    bridge.poll().await.expect("poll succeeds");

    let messages = logger.messages();
    assert!(
        messages
            .iter()
            .any(|m| m.contains("status received") && m.contains("7.5")),
        "readings not logged: {messages:?}"
    );
}

#[rstest]
#[serial(logs)]
#[tokio::test(start_paused = true)]
async fn silence_is_logged_as_warning(mut logger: LoggerHandle) {
    let (stream, _device) = spawn_device([Reply::Silence]);
    let mut bridge = log_only(stream);

    bridge.poll().await.expect("silence is not an error");

    let messages = logger.messages();
    assert!(
        messages.iter().any(|m| m.contains("no response from IntelliChem")),
        "timeout not logged: {messages:?}"
    );
    assert!(messages.iter().any(|m| m.contains("communication lost")));
}

#[traced_test]
#[tokio::test(start_paused = true)]
async fn recovery_is_traced() {
    let (stream, _device) = spawn_device([Reply::Silence, Reply::Status(sample_state())]);
    let mut bridge = log_only(stream);

    bridge.poll().await.expect("silent poll");
    assert!(bridge.comms().is_lost());
    bridge.poll().await.expect("answered poll");

    assert!(!bridge.comms().is_lost());
    assert!(logs_contain("communication lost"));
    assert!(logs_contain("communication restored"));
}
