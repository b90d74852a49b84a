//! Error types for bus transport operations.

use std::io;

/// Errors emitted by [`crate::client::BusClient`] and
/// [`crate::client::open_serial`].
///
/// A silent device is not an error; polls that time out report
/// [`crate::client::PollOutcome::NoResponse`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Transport or codec error.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
    /// The stream reached end-of-file.
    #[error("bus stream closed")]
    Closed,
    /// The serial port could not be opened or configured.
    #[error("failed to open serial port {port}: {source}")]
    Open {
        /// Device path that was requested.
        port: String,
        /// Underlying serial error.
        #[source]
        source: tokio_serial::Error,
    },
}
