//! Reassembly of bus frames from an unreliable byte stream.
//!
//! Bytes arrive from the serial line in arbitrary chunks. [`PacketBuffer`]
//! accumulates them and extracts complete, checksum-valid frames, discarding
//! noise in between. Every anomaly is absorbed by resynchronising and is only
//! visible through [`BufferStats`].
//!
//! Extraction proceeds as follows on each call to
//! [`PacketBuffer::next_frame`]:
//!
//! 1. Search for the preamble. Without one, keep at most the trailing two
//!    bytes (they may begin a preamble) and report no frame.
//! 2. Drop everything before the preamble.
//! 3. Wait until at least [`MIN_FRAME_LEN`] bytes are buffered.
//! 4. If the header start byte is wrong, drop one byte and search again.
//! 5. Derive the frame length from the header length byte.
//! 6. Wait until the whole frame is buffered.
//! 7. Accept the frame if its checksum holds. Otherwise count it, drop one
//!    byte and search again, since a genuine preamble may lie inside the
//!    rejected candidate.

use bytes::{Buf, Bytes, BytesMut};
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::frame::{
    HEADER_START,
    HEADER_START_INDEX,
    LENGTH_INDEX,
    MIN_FRAME_LEN,
    PREAMBLE,
    frame_len,
    validate_checksum,
};

/// Buffered bytes beyond which the overflow guard trims the buffer.
pub const BUFFER_CAPACITY: usize = 4096;
/// Trailing bytes kept when the overflow guard trims the buffer.
pub const OVERFLOW_RETAIN: usize = 256;
const PARTIAL_PREAMBLE_RETAIN: usize = PREAMBLE.len() - 1;

/// Counters describing buffer activity since creation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BufferStats {
    /// Checksum-valid frames extracted.
    pub packets_received: u64,
    /// Bytes pushed into the buffer.
    pub bytes_received: u64,
    /// Candidate frames rejected by checksum.
    pub invalid_checksums: u64,
    /// Times the overflow guard trimmed the buffer.
    pub buffer_overflows: u64,
}

/// Accumulates stream bytes and yields validated raw frames.
///
/// The buffer is owned by whichever task reads the stream; it is not meant
/// for shared mutation.
///
/// # Examples
///
/// ```
/// use intellichem::{buffer::PacketBuffer, frame::build_frame};
///
/// let raw = build_frame(144, 16, 210, &[210]).expect("payload fits");
/// let mut buffer = PacketBuffer::new();
/// buffer.push(&[0x13, 0x37]);
/// buffer.push(&raw[..5]);
/// assert!(buffer.next_frame().is_none());
/// buffer.push(&raw[5..]);
/// assert_eq!(buffer.next_frame(), Some(raw));
/// ```
#[derive(Debug, Default)]
pub struct PacketBuffer {
    buf: BytesMut,
    stats: BufferStats,
}

impl PacketBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Append a chunk read from the stream.
    ///
    /// If the accumulated bytes exceed [`BUFFER_CAPACITY`], only the trailing
    /// [`OVERFLOW_RETAIN`] bytes are kept.
    pub fn push(&mut self, data: &[u8]) {
        self.stats.bytes_received += data.len() as u64;
        self.buf.extend_from_slice(data);
        if self.buf.len() > BUFFER_CAPACITY {
            let dropped = self.buf.len() - OVERFLOW_RETAIN;
            warn!(dropped, "packet buffer overflow, discarding stale bytes");
            self.buf.advance(dropped);
            self.stats.buffer_overflows += 1;
        }
    }

    /// Extract the next complete, checksum-valid frame.
    ///
    /// Returns `None` when no frame can be extracted yet. Call repeatedly
    /// until it returns `None` to drain every buffered frame.
    pub fn next_frame(&mut self) -> Option<Bytes> {
        loop {
            let Some(start) = find_preamble(&self.buf) else {
                if self.buf.len() > PARTIAL_PREAMBLE_RETAIN {
                    let dropped = self.buf.len() - PARTIAL_PREAMBLE_RETAIN;
                    trace!(dropped, "no preamble, discarding noise");
                    self.buf.advance(dropped);
                }
                return None;
            };
            if start > 0 {
                trace!(dropped = start, "discarding bytes before preamble");
                self.buf.advance(start);
            }
            if self.buf.len() < MIN_FRAME_LEN {
                return None;
            }
            if self.buf[HEADER_START_INDEX] != HEADER_START {
                trace!(
                    found = self.buf[HEADER_START_INDEX],
                    "bad header start, resynchronising"
                );
                self.buf.advance(1);
                continue;
            }
            let total = frame_len(usize::from(self.buf[LENGTH_INDEX]));
            if self.buf.len() < total {
                return None;
            }
            if validate_checksum(&self.buf[..total]) {
                self.stats.packets_received += 1;
                return Some(self.buf.split_to(total).freeze());
            }
            self.stats.invalid_checksums += 1;
            debug!(frame.bytes = total, "checksum mismatch, resynchronising");
            self.buf.advance(1);
        }
    }

    /// Length of a partial frame held at the front of the buffer, with the
    /// length it is expected to reach.
    ///
    /// Returns `None` when the buffer does not begin with a preamble.
    #[must_use]
    pub fn partial_frame(&self) -> Option<(usize, usize)> {
        if !self.buf.starts_with(&PREAMBLE) {
            return None;
        }
        let expected = self
            .buf
            .get(LENGTH_INDEX)
            .map_or(MIN_FRAME_LEN, |&len| frame_len(usize::from(len)));
        Some((self.buf.len(), expected))
    }

    /// Number of bytes waiting in the buffer.
    #[must_use]
    pub fn pending_bytes(&self) -> usize { self.buf.len() }

    /// Counters accumulated since creation.
    #[must_use]
    pub fn stats(&self) -> BufferStats { self.stats }

    /// Discard buffered bytes, keeping the counters.
    pub fn clear(&mut self) { self.buf.clear(); }
}

fn find_preamble(buf: &[u8]) -> Option<usize> {
    buf.windows(PREAMBLE.len())
        .position(|window| window == PREAMBLE)
}
