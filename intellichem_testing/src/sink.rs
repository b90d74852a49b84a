//! An [`MqttSink`] that records instead of publishing.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use intellichem::mqtt::{MqttError, MqttSink};

/// One recorded publish.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Published {
    /// Topic.
    pub topic: String,
    /// Payload text.
    pub payload: String,
    /// Retain flag.
    pub retain: bool,
}

#[derive(Debug, Default)]
struct Record {
    published: Vec<Published>,
    subscriptions: Vec<String>,
}

/// Records publishes and subscriptions. Clones share the same record.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    record: Arc<Mutex<Record>>,
}

impl RecordingSink {
    /// Empty sink.
    pub fn new() -> Self { Self::default() }

    /// Every publish, oldest first.
    pub fn published(&self) -> Vec<Published> { self.lock().published.clone() }

    /// Payloads published on `topic`, oldest first.
    pub fn payloads(&self, topic: &str) -> Vec<String> {
        self.lock()
            .published
            .iter()
            .filter(|p| p.topic == topic)
            .map(|p| p.payload.clone())
            .collect()
    }

    /// Most recent payload on `topic`.
    pub fn last(&self, topic: &str) -> Option<String> { self.payloads(topic).pop() }

    /// Most recent publish on `topic`, retain flag included.
    pub fn last_publish(&self, topic: &str) -> Option<Published> {
        self.lock()
            .published
            .iter()
            .rev()
            .find(|p| p.topic == topic)
            .cloned()
    }

    /// Subscribed filters.
    pub fn subscriptions(&self) -> Vec<String> { self.lock().subscriptions.clone() }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        let mut record = self.lock();
        record.published.clear();
        record.subscriptions.clear();
    }

    fn lock(&self) -> MutexGuard<'_, Record> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl MqttSink for RecordingSink {
    async fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<(), MqttError> {
        self.lock().published.push(Published {
            topic: topic.to_owned(),
            payload: payload.to_owned(),
            retain,
        });
        Ok(())
    }

    async fn subscribe(&self, filter: &str) -> Result<(), MqttError> {
        self.lock().subscriptions.push(filter.to_owned());
        Ok(())
    }
}
