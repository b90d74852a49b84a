//! Test support for the `intellichem` crate.
//!
//! - [`encode_status`] is the inverse of the status decoder, so tests can
//!   describe a device reading as a [`DeviceState`](intellichem::DeviceState)
//!   and put it on the wire.
//! - [`spawn_device`] runs a scripted IntelliChem on one end of a
//!   `tokio::io::duplex` stream.
//! - [`RecordingSink`] captures everything the bridge publishes.
//! - [`logger`] serialises access to the global `logtest` logger.
//!
//! ```rust
//! use intellichem::{BusClient, PollOutcome};
//! use intellichem_testing::{Reply, sample_state, spawn_device};
//!
//! # async fn example() {
//! let (stream, _device) = spawn_device([Reply::Status(sample_state())]);
//! let mut client = BusClient::new(stream, 144, std::time::Duration::from_secs(1));
//! let outcome = client.poll_status().await.unwrap();
//! assert_eq!(outcome, PollOutcome::Status(sample_state()));
//! # }
//! ```

pub mod device;
pub mod logging;
pub mod sink;
pub mod status;

pub use device::{DeviceHandle, Reply, spawn_device};
pub use logging::{LoggerHandle, logger};
pub use sink::{Published, RecordingSink};
pub use status::{encode_status, sample_state, status_frame};
