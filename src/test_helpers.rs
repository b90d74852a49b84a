#![cfg(test)]
//! Test-only helpers shared by unit test modules.

use bytes::Bytes;
use proptest::test_runner::{Config as ProptestConfig, RngAlgorithm, TestRng, TestRunner};

use crate::{
    frame::{CONTROLLER_ADDRESS, DEFAULT_DEVICE_ADDRESS, build_frame},
    message::Action,
};

/// Proptest runner with a fixed seed so failures reproduce across machines.
pub fn deterministic_runner(cases: u32) -> TestRunner {
    let config = ProptestConfig {
        cases,
        ..ProptestConfig::default()
    };
    let rng = TestRng::deterministic_rng(RngAlgorithm::ChaCha);
    TestRunner::new_with_rng(config, rng)
}

/// Status payload captured from a pool running normally.
///
/// Decodes to pH 7.50 (setpoint 7.60), ORP 700 mV (setpoint 700), tanks 5 and
/// 4, LSI 0.03, calcium 250, CYA 50, alkalinity 100, salt 3000, 82 degrees and
/// firmware 1.080.
pub const SAMPLE_STATUS_PAYLOAD: [u8; 41] = [
    2, 238, // pH 7.50
    2, 188, // ORP 700
    2, 248, // pH setpoint 7.60
    2, 188, // ORP setpoint 700
    0, 0, //
    0, 2, // pH dose time
    0, 0, //
    0, 5, // ORP dose time
    0, 10, // pH dose volume
    0, 20, // ORP dose volume
    6,  // pH tank
    5,  // ORP tank
    3,  // LSI
    0, 250, // calcium
    0,   //
    50,  // CYA
    0, 100, // alkalinity
    60,  // salt / 50
    0,   //
    82,  // temperature
    0,   // alarms
    0,   // warnings
    0x51, // dosing
    0,   // status flags
    80, 1, // firmware
    0, // water chemistry
    0, 0,
];

/// Raw status response from `source` carrying `payload`.
pub fn status_response(source: u8, payload: &[u8]) -> Bytes {
    build_frame(
        CONTROLLER_ADDRESS,
        source,
        Action::StatusResponse.code(),
        payload,
    ).expect("test payload fits")
}

/// Raw status response from the default address carrying `payload`.
pub fn default_status_response(payload: &[u8]) -> Bytes {
    status_response(DEFAULT_DEVICE_ADDRESS, payload)
}

/// All-zero status payload with `value` written at `index`.
pub fn payload_with(index: usize, value: u8) -> [u8; 41] {
    let mut payload = [0u8; 41];
    payload[index] = value;
    payload
}
