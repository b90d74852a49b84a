//! Wire layout of IntelliChem bus frames.
//!
//! Every frame on the bus has the same shape:
//!
//! ```text
//! FF 00 FF | A5 00 DEST SRC ACTION LEN | PAYLOAD ... | CK_HI CK_LO
//! preamble | header (6 bytes)           | LEN bytes   | checksum
//! ```
//!
//! The checksum is the plain sum of every header and payload byte. Only its
//! low 16 bits travel on the wire, big-endian.
//!
//! The raw accessors in this module never panic on short input; they return
//! `None` (or `false` for [`validate_checksum`]) instead.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    byte_order::{read_network_u16_at, write_network_u16},
    codec::FramingError,
};

/// Synchronisation marker preceding every frame.
pub const PREAMBLE: [u8; 3] = [0xFF, 0x00, 0xFF];
/// First header byte of every frame.
pub const HEADER_START: u8 = 165;
/// Second header byte of every frame.
pub const HEADER_SUB: u8 = 0;
/// Bus address used by the controller issuing requests.
pub const CONTROLLER_ADDRESS: u8 = 16;
/// Lowest bus address an IntelliChem can occupy.
pub const DEVICE_ADDRESS_MIN: u8 = 144;
/// Highest bus address an IntelliChem can occupy.
pub const DEVICE_ADDRESS_MAX: u8 = 158;
/// Factory bus address of an IntelliChem.
pub const DEFAULT_DEVICE_ADDRESS: u8 = 144;

/// Number of header bytes following the preamble.
pub const HEADER_LEN: usize = 6;
/// Number of trailing checksum bytes.
pub const CHECKSUM_LEN: usize = 2;
/// Offset of the first payload byte.
pub const PAYLOAD_OFFSET: usize = PREAMBLE.len() + HEADER_LEN;
/// Shortest possible frame: preamble, header and checksum with no payload.
pub const MIN_FRAME_LEN: usize = PAYLOAD_OFFSET + CHECKSUM_LEN;
/// Largest payload the one-byte length field can describe.
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize;

pub(crate) const HEADER_START_INDEX: usize = PREAMBLE.len();
const DESTINATION_INDEX: usize = 5;
const SOURCE_INDEX: usize = 6;
const ACTION_INDEX: usize = 7;
pub(crate) const LENGTH_INDEX: usize = 8;

/// Returns `true` if `address` lies in the IntelliChem address range.
#[must_use]
pub fn is_device_address(address: u8) -> bool {
    (DEVICE_ADDRESS_MIN..=DEVICE_ADDRESS_MAX).contains(&address)
}

/// Total wire length of a frame carrying `payload_len` payload bytes.
#[must_use]
pub const fn frame_len(payload_len: usize) -> usize { PAYLOAD_OFFSET + payload_len + CHECKSUM_LEN }

/// A decoded bus frame with its header fields split out.
///
/// The preamble, fixed header bytes, length and checksum are derived when the
/// frame is serialised and are not stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    destination: u8,
    source: u8,
    action: u8,
    payload: Bytes,
}

impl Frame {
    /// Create a frame from its header fields and payload.
    #[must_use]
    pub fn new(destination: u8, source: u8, action: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            destination,
            source,
            action,
            payload: payload.into(),
        }
    }

    /// Split a raw frame into its fields.
    ///
    /// Only the layout is checked here; callers that need integrity should
    /// run [`validate_checksum`] first. Returns `None` when `raw` is shorter
    /// than [`MIN_FRAME_LEN`].
    #[must_use]
    pub fn from_raw(raw: &[u8]) -> Option<Self> {
        Some(Self::new(
            destination(raw)?,
            source(raw)?,
            action(raw)?,
            Bytes::copy_from_slice(payload(raw)?),
        ))
    }

    /// Address of the receiving node.
    #[must_use]
    pub fn destination(&self) -> u8 { self.destination }

    /// Address of the sending node.
    #[must_use]
    pub fn source(&self) -> u8 { self.source }

    /// Message-type code.
    #[must_use]
    pub fn action(&self) -> u8 { self.action }

    /// Payload bytes.
    #[must_use]
    pub fn payload(&self) -> &Bytes { &self.payload }

    /// Wire length of this frame once serialised.
    #[must_use]
    pub fn encoded_len(&self) -> usize { frame_len(self.payload.len()) }

    /// Serialise this frame for transmission.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::OversizedPayload`] if the payload does not fit
    /// the one-byte length field.
    pub fn to_bytes(&self) -> Result<Bytes, FramingError> {
        build_frame(self.destination, self.source, self.action, &self.payload)
    }

    /// Append the serialised frame to `dst`.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::OversizedPayload`] if the payload does not fit
    /// the one-byte length field. Nothing is written in that case.
    pub fn encode_into(&self, dst: &mut BytesMut) -> Result<(), FramingError> {
        let len = payload_len_byte(self.payload.len())?;
        dst.reserve(self.encoded_len());
        let start = dst.len();
        dst.put_slice(&PREAMBLE);
        dst.put_slice(&[
            HEADER_START,
            HEADER_SUB,
            self.destination,
            self.source,
            self.action,
            len,
        ]);
        dst.put_slice(&self.payload);
        let sum = checksum(&dst[start + HEADER_START_INDEX..]);
        dst.put_slice(&checksum_bytes(sum));
        Ok(())
    }
}

/// Build a complete frame: preamble, header, payload and checksum.
///
/// # Errors
///
/// Returns [`FramingError::OversizedPayload`] if `payload` is longer than
/// [`MAX_PAYLOAD_LEN`].
///
/// # Examples
///
/// ```
/// use intellichem::frame::{build_frame, validate_checksum};
///
/// let raw = build_frame(144, 16, 210, &[210]).expect("one-byte payload fits");
/// assert_eq!(
///     raw.as_ref(),
///     &[0xFF, 0x00, 0xFF, 0xA5, 0x00, 0x90, 0x10, 0xD2, 0x01, 0xD2, 0x02, 0xEA]
/// );
/// assert!(validate_checksum(&raw));
/// ```
pub fn build_frame(
    destination: u8,
    source: u8,
    action: u8,
    payload: &[u8],
) -> Result<Bytes, FramingError> {
    let frame = Frame::new(destination, source, action, Bytes::copy_from_slice(payload));
    let mut buf = BytesMut::with_capacity(frame.encoded_len());
    frame.encode_into(&mut buf)?;
    Ok(buf.freeze())
}

/// Sum of `region` as an unbounded integer.
///
/// Only the low 16 bits are significant on the wire; the accumulator wraps
/// silently well beyond any real frame size.
#[must_use]
pub fn checksum(region: &[u8]) -> u32 {
    region
        .iter()
        .fold(0u32, |acc, &byte| acc.wrapping_add(u32::from(byte)))
}

#[allow(
    clippy::cast_possible_truncation,
    reason = "only the low 16 bits of the sum are transmitted"
)]
fn low_word(sum: u32) -> u16 { (sum & 0xFFFF) as u16 }

fn checksum_bytes(sum: u32) -> [u8; 2] { write_network_u16(low_word(sum)) }

fn payload_len_byte(len: usize) -> Result<u8, FramingError> {
    u8::try_from(len).map_err(|_| FramingError::OversizedPayload {
        size: len,
        max: MAX_PAYLOAD_LEN,
    })
}

/// Check the trailing checksum of a candidate frame.
///
/// The sum covers every byte between the preamble and the checksum. Returns
/// `false` for input shorter than [`MIN_FRAME_LEN`].
#[must_use]
pub fn validate_checksum(raw: &[u8]) -> bool {
    if raw.len() < MIN_FRAME_LEN {
        return false;
    }
    let split = raw.len() - CHECKSUM_LEN;
    let Some(received) = read_network_u16_at(raw, split) else {
        return false;
    };
    low_word(checksum(&raw[HEADER_START_INDEX..split])) == received
}

/// Payload region of a raw frame, as declared by its length byte.
///
/// A length byte that overruns the buffer yields whatever bytes are present.
/// Returns `None` for input shorter than [`MIN_FRAME_LEN`].
#[must_use]
pub fn payload(raw: &[u8]) -> Option<&[u8]> {
    if raw.len() < MIN_FRAME_LEN {
        return None;
    }
    let declared = usize::from(raw[LENGTH_INDEX]);
    let end = (PAYLOAD_OFFSET + declared).min(raw.len());
    Some(&raw[PAYLOAD_OFFSET..end])
}

/// Action code of a raw frame.
#[must_use]
pub fn action(raw: &[u8]) -> Option<u8> { raw.get(ACTION_INDEX).copied() }

/// Source address of a raw frame.
#[must_use]
pub fn source(raw: &[u8]) -> Option<u8> { raw.get(SOURCE_INDEX).copied() }

/// Destination address of a raw frame.
#[must_use]
pub fn destination(raw: &[u8]) -> Option<u8> { raw.get(DESTINATION_INDEX).copied() }
