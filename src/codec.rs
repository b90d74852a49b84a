//! `tokio_util` codec for the IntelliChem bus.
//!
//! [`BusCodec`] drives a [`PacketBuffer`] from a framed byte stream: every
//! chunk read from the transport is moved into the buffer, and decoding yields
//! the next checksum-valid raw frame. Noise never surfaces as a decode error.
//! Encoding serialises a [`Frame`] with its preamble and checksum.
//!
//! # Error Handling
//!
//! The codec layer reports failures through [`CodecError`]. See the [`error`]
//! module for details.

use std::io;

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::{
    buffer::{BufferStats, PacketBuffer},
    frame::Frame,
};

pub mod error;

pub use error::{CodecError, EofError, FramingError};

/// Framing codec for the RS-485 bus.
///
/// Decoded items are whole raw frames, preamble and checksum included, so
/// they can be handed straight to the status decoder.
///
/// # Examples
///
/// ```
/// use bytes::BytesMut;
/// use intellichem::{codec::BusCodec, request::status_request};
/// use tokio_util::codec::{Decoder, Encoder};
///
/// let mut codec = BusCodec::new();
/// let mut wire = BytesMut::from(&[0x00, 0x42][..]);
/// codec.encode(status_request(144), &mut wire).expect("request encodes");
/// let raw = codec.decode(&mut wire).expect("decode never fails on noise");
/// assert_eq!(raw.map(|f| f.len()), Some(12));
/// ```
#[derive(Debug, Default)]
pub struct BusCodec {
    buffer: PacketBuffer,
}

impl BusCodec {
    /// Create a codec with an empty reassembly buffer.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Reassembly counters accumulated since creation.
    #[must_use]
    pub fn stats(&self) -> BufferStats { self.buffer.stats() }

    /// Bytes held back waiting for the rest of a frame.
    #[must_use]
    pub fn pending_bytes(&self) -> usize { self.buffer.pending_bytes() }
}

impl Decoder for BusCodec {
    type Item = Bytes;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if !src.is_empty() {
            let chunk = src.split();
            self.buffer.push(&chunk);
        }
        let rejected_before = self.buffer.stats().invalid_checksums;
        let frame = self.buffer.next_frame();
        let rejected = self.buffer.stats().invalid_checksums - rejected_before;
        if rejected > 0 {
            crate::metrics::inc_checksum_errors(rejected);
        }
        if frame.is_some() {
            crate::metrics::inc_frames(crate::metrics::Direction::Inbound);
        }
        Ok(frame)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        match self.buffer.partial_frame() {
            None => Ok(None),
            Some((bytes_received, expected)) => {
                self.buffer.clear();
                Err(CodecError::Eof(EofError::MidFrame {
                    bytes_received,
                    expected,
                })
                .into())
            }
        }
    }
}

impl Encoder<Frame> for BusCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode_into(dst).map_err(CodecError::from)?;
        crate::metrics::inc_frames(crate::metrics::Direction::Outbound);
        Ok(())
    }
}

#[cfg(test)]
mod tests;
