#![doc(html_root_url = "https://docs.rs/intellichem/latest")]
//! Public API for the `intellichem` library.
//!
//! This crate speaks the Pentair IntelliChem RS-485 protocol and bridges a
//! controller to MQTT. The protocol core (framing, reassembly, status
//! decoding and command encoding) is pure and transport-agnostic; the
//! [`client`], [`mqtt`] and [`app`] modules wire it to a serial port and a
//! broker.

pub mod app;
pub mod buffer;
pub mod byte_order;
pub mod client;
pub mod codec;
pub mod command;
pub mod config;
pub mod error;
pub mod frame;
pub mod message;
pub mod metrics;
pub mod mqtt;
pub mod request;
pub mod state;
pub mod status;
pub mod trace;

#[cfg(test)]
mod test_helpers;

pub use buffer::{BufferStats, PacketBuffer};
pub use client::{BusClient, PollOutcome, TransportError};
pub use codec::BusCodec;
pub use command::{CommandBuilder, ConfigurationValues, SetpointLimits, ValidationError};
pub use error::{BridgeError, Result};
pub use frame::Frame;
pub use message::{Action, Message};
pub use state::DeviceState;
pub use status::{StatusDecoder, StatusRejection};
pub use trace::TraceConfig;
