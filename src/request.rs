//! Status poll frames.
//!
//! A poll is a one-byte frame from the controller address whose payload
//! echoes the status request action code.

use crate::{
    frame::{CONTROLLER_ADDRESS, Frame},
    message::Action,
};

/// Build the status request for the device at `address`.
///
/// # Examples
///
/// ```
/// use intellichem::request::status_request;
///
/// let frame = status_request(144);
/// let wire = frame.to_bytes().expect("one-byte payload fits");
/// assert_eq!(
///     &wire[..],
///     &[0xFF, 0x00, 0xFF, 0xA5, 0x00, 0x90, 0x10, 0xD2, 0x01, 0xD2, 0x02, 0xEA]
/// );
/// ```
#[must_use]
pub fn status_request(address: u8) -> Frame {
    let action = Action::StatusRequest.code();
    Frame::new(address, CONTROLLER_ADDRESS, action, vec![action])
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::frame::validate_checksum;

    #[rstest]
    #[case(144)]
    #[case(150)]
    #[case(158)]
    fn request_targets_device_from_controller(#[case] address: u8) {
        let frame = status_request(address);
        assert_eq!(frame.destination(), address);
        assert_eq!(frame.source(), CONTROLLER_ADDRESS);
        assert_eq!(frame.action(), 210);
        assert_eq!(&frame.payload()[..], &[210]);
        assert!(validate_checksum(&frame.to_bytes().expect("request fits")));
    }
}
