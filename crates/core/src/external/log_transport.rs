//! The admin log transport: an append-only, single-partition, infinite-retention
//! replicated journal with offset-seek. spec.md §3 "LogRecord", §4.A, §6.

use async_trait::async_trait;
use std::time::Duration;

/// A single record polled from the admin log partition.
#[derive(Debug, Clone)]
pub struct LogRecord {
    /// 64-bit monotonic position in the admin log partition.
    pub offset: u64,
    pub key: LogKey,
    pub envelope: LogEnvelope,
}

#[derive(Debug, Clone, Default)]
pub struct LogKey {
    /// Transport-level marker records (e.g. compaction tombstones) carry
    /// this flag; the per-store dispatcher drops them, spec.md §4.C step 3.
    pub is_control_message: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageType {
    Put,
    Other(String),
}

#[derive(Debug, Clone)]
pub struct LogEnvelope {
    pub message_type: MessageType,
    pub payload: Vec<u8>,
    pub schema_id: u32,
}

/// The admin log transport collaborator, spec.md §6 "Admin log transport (in)".
#[async_trait]
pub trait AdminLogTransport: Send + Sync {
    /// Subscribes to `topic`/`partition` starting at `offset` (inclusive of
    /// records with offset >= `offset`). Replaces any existing subscription.
    async fn subscribe(&self, topic: &str, partition: u32, offset: u64) -> anyhow::Result<()>;

    /// Cancels the current subscription. A no-op if not subscribed.
    async fn unsubscribe(&self) -> anyhow::Result<()>;

    /// Polls for new records, blocking up to `timeout` if none are
    /// immediately available. Returns records in strictly increasing offset
    /// order, all with offset >= the subscribed offset.
    async fn poll(&self, timeout: Duration) -> anyhow::Result<Vec<LogRecord>>;

    /// Creates `topic` with the given partition count and replication
    /// factor if it does not already exist.
    async fn create_topic(&self, topic: &str, partitions: u32, replication_factor: u32) -> anyhow::Result<()>;

    /// Sets `topic`'s retention to unbounded.
    async fn set_unbounded_retention(&self, topic: &str) -> anyhow::Result<()>;

    /// Returns whether `topic` currently exists.
    async fn contains_topic(&self, topic: &str) -> anyhow::Result<bool>;
}
