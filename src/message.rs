//! Message kinds carried on the bus.
//!
//! The action byte of a frame selects its meaning. [`Message::classify`]
//! matches on it once and hands back a typed variant; unknown codes become
//! [`Message::Unrecognized`] rather than an error.

use bytes::Bytes;

use crate::{
    frame,
    state::DeviceState,
    status::{StatusDecoder, StatusRejection},
};

/// Known action codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    /// Controller asks a device for its status.
    StatusRequest,
    /// Device reports its status.
    StatusResponse,
    /// Controller writes device configuration.
    ConfigurationCommand,
    /// Broadcast from a touch panel controller.
    OcpBroadcast,
}

impl Action {
    /// Wire code of this action.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::StatusRequest => 210,
            Self::StatusResponse => 18,
            Self::ConfigurationCommand => 146,
            Self::OcpBroadcast => 147,
        }
    }

    /// Look up an action by its wire code.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            210 => Some(Self::StatusRequest),
            18 => Some(Self::StatusResponse),
            146 => Some(Self::ConfigurationCommand),
            147 => Some(Self::OcpBroadcast),
            _ => None,
        }
    }
}

/// A validated frame interpreted according to its action code.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    /// A status poll addressed to `destination`.
    StatusRequest {
        /// Polled device.
        destination: u8,
    },
    /// A decoded status response.
    StatusResponse(DeviceState),
    /// A status response that failed decoding.
    RejectedStatus(StatusRejection),
    /// A configuration write addressed to `destination`.
    ConfigurationCommand {
        /// Configured device.
        destination: u8,
        /// Configuration payload.
        payload: Bytes,
    },
    /// Any action this crate does not interpret, broadcasts included.
    Unrecognized {
        /// Action code found in the frame.
        action: u8,
    },
}

impl Message {
    /// Interpret a raw frame.
    ///
    /// Status responses go through `decoder`; every other kind is split out
    /// from the header alone. Frames too short to carry an action are
    /// reported as [`Message::Unrecognized`] with action `0`.
    #[must_use]
    pub fn classify(raw: &[u8], decoder: &StatusDecoder) -> Self {
        let Some(code) = frame::action(raw) else {
            return Self::Unrecognized { action: 0 };
        };
        match Action::from_code(code) {
            Some(Action::StatusResponse) => match decoder.try_decode(raw) {
                Ok(state) => Self::StatusResponse(state),
                Err(rejection) => Self::RejectedStatus(rejection),
            },
            Some(Action::StatusRequest) => Self::StatusRequest {
                destination: frame::destination(raw).unwrap_or_default(),
            },
            Some(Action::ConfigurationCommand) => Self::ConfigurationCommand {
                destination: frame::destination(raw).unwrap_or_default(),
                payload: Bytes::copy_from_slice(frame::payload(raw).unwrap_or_default()),
            },
            Some(Action::OcpBroadcast) | None => Self::Unrecognized { action: code },
        }
    }

    /// Short name for logs and metrics labels.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StatusRequest { .. } => "status_request",
            Self::StatusResponse(_) => "status_response",
            Self::RejectedStatus(_) => "rejected_status",
            Self::ConfigurationCommand { .. } => "configuration_command",
            Self::Unrecognized { .. } => "unrecognized",
        }
    }
}
