//! Bus client for the IntelliChem RS-485 link.
//!
//! [`BusClient`] owns the framed byte stream exclusively: it is the single
//! writer on the half-duplex bus and the only reader feeding the reassembly
//! buffer. Polls and configuration commands therefore go through the same
//! instance, one at a time.

use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    time::Instant,
};
use tokio_serial::{DataBits, Parity as SerialParity, SerialPortBuilderExt, SerialStream, StopBits};
use tokio_util::codec::Framed;
use tracing::{Instrument, debug};

mod error;

pub use error::TransportError;

use crate::{
    buffer::BufferStats,
    codec::BusCodec,
    config::{Parity, SerialConfig},
    frame::Frame,
    message::Message,
    metrics::{self, PollResult},
    request::status_request,
    state::DeviceState,
    status::StatusDecoder,
    trace::{
        TraceConfig,
        dump_frame,
        emit_timing_event,
        poll_span,
        receive_span,
        send_span,
        timing_start,
    },
};

/// Trait alias for streams the bus client can drive.
///
/// Implemented by the serial port and by in-memory duplex streams.
pub trait BusStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T> BusStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Open and configure the serial port described by `config`.
///
/// # Errors
///
/// Returns [`TransportError::Open`] if the device cannot be opened.
pub fn open_serial(config: &SerialConfig) -> Result<SerialStream, TransportError> {
    let data_bits = match config.databits {
        5 => DataBits::Five,
        6 => DataBits::Six,
        7 => DataBits::Seven,
        _ => DataBits::Eight,
    };
    let stop_bits = if config.stopbits == 2 { StopBits::Two } else { StopBits::One };
    let parity = match config.parity {
        Parity::None => SerialParity::None,
        Parity::Even => SerialParity::Even,
        Parity::Odd => SerialParity::Odd,
    };
    tokio_serial::new(&config.port, config.baudrate)
        .data_bits(data_bits)
        .stop_bits(stop_bits)
        .parity(parity)
        .open_native_async()
        .map_err(|source| TransportError::Open {
            port: config.port.clone(),
            source,
        })
}

/// Result of one poll cycle.
#[derive(Clone, Debug, PartialEq)]
pub enum PollOutcome {
    /// The polled device answered.
    Status(DeviceState),
    /// No status response arrived before the timeout.
    NoResponse,
}

/// Client for one IntelliChem device on a shared bus.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
///
/// use intellichem::client::{BusClient, PollOutcome};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), intellichem::client::TransportError> {
/// let (stream, _device) = tokio::io::duplex(1024);
/// let mut client = BusClient::new(stream, 144, Duration::from_secs(5));
/// if let PollOutcome::Status(state) = client.poll_status().await? {
///     println!("pH {}", state.ph.level);
/// }
/// # Ok(())
/// # }
/// ```
pub struct BusClient<T: BusStream> {
    framed: Framed<T, BusCodec>,
    address: u8,
    timeout: Duration,
    decoder: StatusDecoder,
    trace: TraceConfig,
    skipped_frames: u64,
}

impl<T: BusStream> std::fmt::Debug for BusClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusClient")
            .field("address", &self.address)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl<T: BusStream> BusClient<T> {
    /// Wrap `stream` as a client polling the device at `address`, waiting up
    /// to `timeout` for each response.
    #[must_use]
    pub fn new(stream: T, address: u8, timeout: Duration) -> Self {
        let trace = TraceConfig::default();
        Self {
            framed: Framed::new(stream, BusCodec::new()),
            address,
            timeout,
            decoder: StatusDecoder::new(trace.clone()),
            trace,
            skipped_frames: 0,
        }
    }

    /// Replace the tracing configuration.
    #[must_use]
    pub fn with_trace(mut self, trace: TraceConfig) -> Self {
        self.decoder = StatusDecoder::new(trace.clone());
        self.trace = trace;
        self
    }

    /// Address of the polled device.
    #[must_use]
    pub fn address(&self) -> u8 { self.address }

    /// Reassembly counters for the underlying stream.
    #[must_use]
    pub fn buffer_stats(&self) -> BufferStats { self.framed.codec().stats() }

    /// Valid frames discarded while waiting for a status response.
    #[must_use]
    pub fn skipped_frames(&self) -> u64 { self.skipped_frames }

    /// Write one frame to the bus.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] if the frame cannot be encoded or
    /// written.
    pub async fn send(&mut self, frame: &Frame) -> Result<(), TransportError> {
        let span = send_span(&self.trace, frame.action(), frame.encoded_len());
        if self.trace.dumps_frames()
            && let Ok(raw) = frame.to_bytes()
        {
            dump_frame(&self.trace, "outbound", &raw);
        }
        self.framed.send(frame.clone()).instrument(span).await?;
        Ok(())
    }

    /// Wait up to `timeout` for the next checksum-valid frame.
    ///
    /// Returns `Ok(None)` when the deadline passes first.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] at end-of-stream and
    /// [`TransportError::Io`] on read failures.
    pub async fn receive(&mut self, timeout: Duration) -> Result<Option<Bytes>, TransportError> {
        let span = receive_span(&self.trace);
        let next = tokio::time::timeout(timeout, self.framed.next())
            .instrument(span.clone())
            .await;
        match next {
            Err(_) => {
                span.record("result", "timeout");
                Ok(None)
            }
            Ok(None) => {
                span.record("result", "closed");
                Err(TransportError::Closed)
            }
            Ok(Some(Err(e))) => {
                span.record("result", "error");
                Err(TransportError::Io(e))
            }
            Ok(Some(Ok(raw))) => {
                span.record("frame.bytes", raw.len());
                span.record("result", "ok");
                dump_frame(&self.trace, "inbound", &raw);
                Ok(Some(raw))
            }
        }
    }

    /// Run one poll cycle: send the status request and wait for the answer.
    ///
    /// Frames that are not a status response from the polled address, such
    /// as the echo of the request or traffic for other devices, are skipped
    /// until the timeout elapses.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the request cannot be written or the
    /// stream fails. A silent device is [`PollOutcome::NoResponse`].
    pub async fn poll_status(&mut self) -> Result<PollOutcome, TransportError> {
        let span = poll_span(&self.trace, self.address);
        let start = timing_start(&self.trace);
        let outcome = self.poll_once().instrument(span.clone()).await;
        emit_timing_event(start);
        match &outcome {
            Ok(PollOutcome::Status(_)) => {
                span.record("result", "status");
                metrics::inc_polls(PollResult::Success);
            }
            Ok(PollOutcome::NoResponse) => {
                span.record("result", "no_response");
                metrics::inc_polls(PollResult::NoResponse);
            }
            Err(_) => {
                span.record("result", "error");
            }
        }
        outcome
    }

    async fn poll_once(&mut self) -> Result<PollOutcome, TransportError> {
        self.send(&status_request(self.address)).await?;
        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let Some(raw) = self.receive(remaining).await? else {
                debug!(address = self.address, "no status response before timeout");
                return Ok(PollOutcome::NoResponse);
            };
            match Message::classify(&raw, &self.decoder) {
                Message::StatusResponse(state) if state.address == self.address => {
                    return Ok(PollOutcome::Status(state));
                }
                other => {
                    self.skipped_frames += 1;
                    debug!(kind = other.kind(), "skipping frame while awaiting status");
                }
            }
        }
    }
}
