//! An in-process `AdminLogTransport`, grounded on the teacher's segment/offset
//! bookkeeping in its message log: an append-only `Vec` of records behind a
//! lock, with offset assigned at append time. Good enough for tests and a
//! single-process demo; not a real replicated, persistent log.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::external::{AdminLogTransport, LogRecord};

struct Topic {
    records: Vec<LogRecord>,
}

#[derive(Default)]
pub struct LocalLogTransport {
    topics: Mutex<std::collections::HashMap<String, Topic>>,
    subscribed: Mutex<Option<(String, u32, u64)>>,
    existing_topics: Mutex<HashSet<String>>,
}

impl LocalLogTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record to `topic`, assigning it the next offset. Used by
    /// tests and the demo binary to seed the log; not part of the trait
    /// contract (a real transport is written to by producers, not readers).
    pub fn append(&self, topic: &str, key: crate::external::LogKey, envelope: crate::external::LogEnvelope) -> u64 {
        let mut topics = self.topics.lock();
        let t = topics.entry(topic.to_owned()).or_insert_with(|| Topic { records: Vec::new() });
        let offset = t.records.len() as u64;
        t.records.push(LogRecord { offset, key, envelope });
        offset
    }
}

#[async_trait]
impl AdminLogTransport for LocalLogTransport {
    async fn subscribe(&self, topic: &str, partition: u32, offset: u64) -> anyhow::Result<()> {
        *self.subscribed.lock() = Some((topic.to_owned(), partition, offset));
        Ok(())
    }

    async fn unsubscribe(&self) -> anyhow::Result<()> {
        *self.subscribed.lock() = None;
        Ok(())
    }

    async fn poll(&self, _timeout: Duration) -> anyhow::Result<Vec<LogRecord>> {
        let Some((topic, _partition, offset)) = self.subscribed.lock().clone() else {
            return Ok(Vec::new());
        };
        let topics = self.topics.lock();
        let Some(t) = topics.get(&topic) else {
            return Ok(Vec::new());
        };
        Ok(t.records.iter().filter(|r| r.offset >= offset).cloned().collect())
    }

    async fn create_topic(&self, topic: &str, _partitions: u32, _replication_factor: u32) -> anyhow::Result<()> {
        self.topics
            .lock()
            .entry(topic.to_owned())
            .or_insert_with(|| Topic { records: Vec::new() });
        self.existing_topics.lock().insert(topic.to_owned());
        Ok(())
    }

    async fn set_unbounded_retention(&self, _topic: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn contains_topic(&self, topic: &str) -> anyhow::Result<bool> {
        Ok(self.existing_topics.lock().contains(topic))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::{LogEnvelope, LogKey, MessageType};

    #[tokio::test]
    async fn poll_returns_records_at_or_after_subscribed_offset() {
        let transport = LocalLogTransport::new();
        for i in 0..5u8 {
            transport.append(
                "admin-log",
                LogKey::default(),
                LogEnvelope {
                    message_type: MessageType::Put,
                    payload: vec![i],
                    schema_id: 1,
                },
            );
        }
        transport.subscribe("admin-log", 0, 2).await.unwrap();
        let batch = transport.poll(Duration::from_millis(1)).await.unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[0].offset, 2);
    }
}
