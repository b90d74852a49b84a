//! Error types for the bus codec.
//!
//! Resynchronisation inside the reassembly buffer is never an error; a noisy
//! bus simply yields no frame. The types here cover what remains: frames that
//! cannot be represented on the wire, streams that end mid-frame and
//! transport failures.
//!
//! - [`FramingError`]: an outbound frame violates the wire layout.
//! - [`EofError`]: the stream closed while a frame was still arriving.
//! - [`CodecError`]: top-level enum wrapping both plus I/O errors.

use std::io;

use thiserror::Error;

/// Wire-layout violations detected while building a frame.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    /// Payload does not fit the one-byte length field.
    #[error("payload exceeds max length: {size} > {max}")]
    OversizedPayload {
        /// Payload length that was requested.
        size: usize,
        /// Largest payload the header can describe.
        max: usize,
    },
}

/// End-of-stream conditions.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum EofError {
    /// The stream ended after a preamble but before the frame completed.
    #[error("premature EOF: {bytes_received} bytes of {expected} byte frame received")]
    MidFrame {
        /// Bytes of the partial frame held when the stream ended.
        bytes_received: usize,
        /// Frame length implied by the header, or the minimum frame length
        /// when the header had not arrived.
        expected: usize,
    },
}

/// Top-level codec error taxonomy.
///
/// # Examples
///
/// ```
/// use intellichem::codec::{CodecError, FramingError};
///
/// let err = CodecError::Framing(FramingError::OversizedPayload { size: 300, max: 255 });
/// assert_eq!(err.error_type(), "framing");
/// assert_eq!(std::io::Error::from(err).kind(), std::io::ErrorKind::InvalidData);
/// ```
#[derive(Debug, Error)]
pub enum CodecError {
    /// Outbound frame cannot be encoded.
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// Transport layer I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// End-of-stream handling.
    #[error("EOF: {0}")]
    Eof(#[from] EofError),
}

impl CodecError {
    /// Returns the error category as a string for logging and metrics.
    ///
    /// One of `"framing"`, `"io"` or `"eof"`.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Framing(_) => "framing",
            Self::Io(_) => "io",
            Self::Eof(_) => "eof",
        }
    }
}

impl From<CodecError> for io::Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(e) => e,
            CodecError::Framing(e) => io::Error::new(io::ErrorKind::InvalidData, e),
            CodecError::Eof(e) => io::Error::new(io::ErrorKind::UnexpectedEof, e),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
