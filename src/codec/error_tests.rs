//! Unit tests for codec error types.

use std::io;

use rstest::rstest;

use super::{CodecError, EofError, FramingError};

#[rstest]
#[case::framing(
    CodecError::Framing(FramingError::OversizedPayload { size: 256, max: 255 }),
    io::ErrorKind::InvalidData,
    "framing"
)]
#[case::eof(
    CodecError::Eof(EofError::MidFrame { bytes_received: 7, expected: 11 }),
    io::ErrorKind::UnexpectedEof,
    "eof"
)]
#[case::io(
    CodecError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "line dropped")),
    io::ErrorKind::BrokenPipe,
    "io"
)]
fn codec_errors_map_to_io_kinds(
    #[case] err: CodecError,
    #[case] kind: io::ErrorKind,
    #[case] category: &str,
) {
    assert_eq!(err.error_type(), category);
    assert_eq!(io::Error::from(err).kind(), kind);
}

#[test]
fn oversized_payload_message_names_both_sizes() {
    let err = FramingError::OversizedPayload { size: 300, max: 255 };
    assert_eq!(err.to_string(), "payload exceeds max length: 300 > 255");
}

#[test]
fn mid_frame_eof_message_reports_progress() {
    let err = CodecError::from(EofError::MidFrame {
        bytes_received: 20,
        expected: 52,
    });
    assert_eq!(
        err.to_string(),
        "EOF: premature EOF: 20 bytes of 52 byte frame received"
    );
}
