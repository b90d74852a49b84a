//! Helpers for explicit bus byte-order conversions.
//!
//! Every multi-byte integer on the IntelliChem bus is big-endian. These
//! helpers keep Clippy expectations scoped to the conversion points so
//! protocol code can remain explicit about wire endianness without repeating
//! lint annotations.

/// Serialise a `u16` in bus byte order (big-endian).
///
/// # Examples
///
/// ```
/// use intellichem::byte_order::write_network_u16;
///
/// assert_eq!(write_network_u16(0x02EA), [0x02, 0xEA]);
/// ```
#[must_use]
pub fn write_network_u16(value: u16) -> [u8; 2] {
    #[expect(
        clippy::big_endian_bytes,
        reason = "The RS-485 bus carries big-endian integers."
    )]
    value.to_be_bytes()
}

/// Parse a bus-order `u16` from its on-wire representation.
///
/// # Examples
///
/// ```
/// use intellichem::byte_order::read_network_u16;
///
/// assert_eq!(read_network_u16([0x02, 0xEA]), 746);
/// ```
#[must_use]
pub fn read_network_u16(bytes: [u8; 2]) -> u16 {
    #[expect(
        clippy::big_endian_bytes,
        reason = "The RS-485 bus carries big-endian integers."
    )]
    u16::from_be_bytes(bytes)
}

/// Read a bus-order `u16` starting at `offset`.
///
/// Returns `None` when fewer than two bytes remain at `offset`.
///
/// # Examples
///
/// ```
/// use intellichem::byte_order::read_network_u16_at;
///
/// assert_eq!(read_network_u16_at(&[0x00, 0x02, 0xEE], 1), Some(750));
/// assert_eq!(read_network_u16_at(&[0x00, 0x02], 1), None);
/// ```
#[must_use]
pub fn read_network_u16_at(bytes: &[u8], offset: usize) -> Option<u16> {
    let end = offset.checked_add(2)?;
    let pair: [u8; 2] = bytes.get(offset..end)?.try_into().ok()?;
    Some(read_network_u16(pair))
}
