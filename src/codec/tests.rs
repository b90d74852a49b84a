//! Tests for `BusCodec` encode/decode behaviour.

use std::io;

use bytes::BytesMut;
use rstest::rstest;
use tokio_util::codec::{Decoder, Encoder};

use super::*;
use crate::{
    frame::{MAX_PAYLOAD_LEN, PREAMBLE},
    request::status_request,
    test_helpers::{SAMPLE_STATUS_PAYLOAD, default_status_response},
};

#[test]
fn encode_appends_complete_frame() {
    let mut codec = BusCodec::new();
    let mut dst = BytesMut::from(&b"xy"[..]);
    codec
        .encode(status_request(144), &mut dst)
        .expect("request encodes");
    assert_eq!(&dst[..2], b"xy");
    assert_eq!(&dst[2..5], &PREAMBLE);
    assert_eq!(dst.len(), 2 + 12);
}

#[test]
fn encode_rejects_oversized_payload() {
    let mut codec = BusCodec::new();
    let mut dst = BytesMut::new();
    let frame = Frame::new(144, 16, 146, vec![0u8; MAX_PAYLOAD_LEN + 1]);
    let err = codec.encode(frame, &mut dst).expect_err("payload too long");
    assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    assert!(dst.is_empty());
}

#[test]
fn decode_drains_source_and_returns_frames_in_order() {
    let status = default_status_response(&SAMPLE_STATUS_PAYLOAD);
    let request = status_request(144).to_bytes().expect("request fits");
    let mut src = BytesMut::new();
    src.extend_from_slice(&[0x42, 0x42]);
    src.extend_from_slice(&request);
    src.extend_from_slice(&status);

    let mut codec = BusCodec::new();
    assert_eq!(codec.decode(&mut src).expect("decode"), Some(request));
    assert!(src.is_empty(), "codec moves every byte into its buffer");
    assert_eq!(codec.decode(&mut src).expect("decode"), Some(status));
    assert_eq!(codec.decode(&mut src).expect("decode"), None);
    assert_eq!(codec.stats().packets_received, 2);
}

#[rstest]
#[case::empty(&[])]
#[case::noise(&[0x01, 0x02, 0x03, 0x04])]
fn clean_eof_ends_stream(#[case] tail: &[u8]) {
    let mut codec = BusCodec::new();
    let mut src = BytesMut::from(tail);
    assert_eq!(codec.decode_eof(&mut src).expect("clean close"), None);
}

#[test]
fn eof_mid_frame_reports_progress() {
    let status = default_status_response(&SAMPLE_STATUS_PAYLOAD);
    let mut codec = BusCodec::new();
    let mut src = BytesMut::from(&status[..20]);
    let err = codec.decode_eof(&mut src).expect_err("frame incomplete");
    assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    assert!(err.to_string().contains("20 bytes of 52"));
    assert_eq!(codec.pending_bytes(), 0);
}

#[test]
fn eof_still_yields_buffered_frame() {
    let status = default_status_response(&SAMPLE_STATUS_PAYLOAD);
    let mut codec = BusCodec::new();
    let mut src = BytesMut::from(&status[..]);
    assert_eq!(codec.decode_eof(&mut src).expect("decode"), Some(status));
}

#[cfg(feature = "metrics")]
#[test]
fn decode_counts_frames_and_checksum_failures() {
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    let mut corrupted = status_request(144).to_bytes().expect("fits").to_vec();
    corrupted[9] ^= 0x10;
    let status = default_status_response(&SAMPLE_STATUS_PAYLOAD);

    metrics::with_local_recorder(&recorder, || {
        let mut codec = BusCodec::new();
        let mut src = BytesMut::from(&corrupted[..]);
        src.extend_from_slice(&status);
        assert!(codec.decode(&mut src).expect("decode").is_some());
    });

    let metrics = snapshotter.snapshot().into_vec();
    let count = |name: &str| {
        metrics.iter().find_map(|(key, _, _, value)| match value {
            DebugValue::Counter(count) if key.key().name() == name => Some(*count),
            _ => None,
        })
    };
    assert_eq!(count(crate::metrics::CHECKSUM_ERRORS), Some(1));
    assert_eq!(count(crate::metrics::FRAMES_TOTAL), Some(1));
}
