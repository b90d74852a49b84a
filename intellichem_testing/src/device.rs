//! A scripted IntelliChem on an in-memory stream.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use bytes::Bytes;
use futures::StreamExt;
use intellichem::{codec::BusCodec, frame, message::Action, state::DeviceState};
use tokio::{
    io::{AsyncWriteExt, DuplexStream, WriteHalf, duplex},
    task::JoinHandle,
};
use tokio_util::codec::FramedRead;

use crate::status::status_frame;

/// How the device answers one status request.
#[derive(Clone, Debug)]
pub enum Reply {
    /// Answer with this state.
    Status(DeviceState),
    /// Do not answer.
    Silence,
    /// Write these bytes verbatim.
    Raw(Bytes),
    /// Close the stream without answering.
    Hangup,
}

#[derive(Debug, Default)]
struct Log {
    requests: Vec<Bytes>,
    commands: Vec<Bytes>,
}

/// Inspects what the scripted device received.
#[derive(Debug)]
pub struct DeviceHandle {
    log: Arc<Mutex<Log>>,
    task: JoinHandle<()>,
}

impl Drop for DeviceHandle {
    fn drop(&mut self) { self.task.abort(); }
}

impl DeviceHandle {
    /// Status requests received so far.
    pub fn requests(&self) -> Vec<Bytes> { self.lock().requests.clone() }

    /// Configuration commands received so far.
    pub fn commands(&self) -> Vec<Bytes> { self.lock().commands.clone() }

    fn lock(&self) -> std::sync::MutexGuard<'_, Log> {
        self.log
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Spawn a device answering status requests from `script` in order.
///
/// Once the script is exhausted the device stays silent. Configuration
/// commands are recorded and never answered. Returns the bridge's end of the
/// stream.
pub fn spawn_device(script: impl IntoIterator<Item = Reply>) -> (DuplexStream, DeviceHandle) {
    let (bridge_end, device_end) = duplex(4096);
    let log = Arc::new(Mutex::new(Log::default()));
    let script: VecDeque<Reply> = script.into_iter().collect();
    let task = tokio::spawn(run(device_end, script, Arc::clone(&log)));
    (bridge_end, DeviceHandle { log, task })
}

async fn run(stream: DuplexStream, mut script: VecDeque<Reply>, log: Arc<Mutex<Log>>) {
    let (reader, mut writer) = tokio::io::split(stream);
    let mut frames = FramedRead::new(reader, BusCodec::new());
    while let Some(Ok(raw)) = frames.next().await {
        let action = frame::action(&raw);
        if action == Some(Action::StatusRequest.code()) {
            log.lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .requests
                .push(raw);
            if !answer(&mut writer, script.pop_front()).await {
                break;
            }
        } else if action == Some(Action::ConfigurationCommand.code()) {
            log.lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .commands
                .push(raw);
        }
    }
}

async fn answer(writer: &mut WriteHalf<DuplexStream>, reply: Option<Reply>) -> bool {
    let bytes = match reply {
        Some(Reply::Status(state)) => status_frame(&state),
        Some(Reply::Raw(bytes)) => bytes,
        Some(Reply::Silence) | None => return true,
        Some(Reply::Hangup) => return false,
    };
    writer.write_all(&bytes).await.is_ok()
}
