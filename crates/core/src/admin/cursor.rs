//! Log cursor (component A), spec.md §4.A.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::error::CursorError;
use crate::external::{AdminLogTransport, LogRecord};

/// Polls the admin log from a persisted offset, buffering undelivered
/// records so a mid-batch dispatch failure cannot lose them: `poll` is a
/// no-op while the buffer is non-empty.
pub struct LogCursor {
    transport: Arc<dyn AdminLogTransport>,
    topic: String,
    partition: u32,
    subscribed: bool,
    undelivered: VecDeque<LogRecord>,
    last_persisted_offset: Option<u64>,
}

impl LogCursor {
    pub fn new(transport: Arc<dyn AdminLogTransport>, topic: impl Into<String>, partition: u32) -> Self {
        Self {
            transport,
            topic: topic.into(),
            partition,
            subscribed: false,
            undelivered: VecDeque::new(),
            last_persisted_offset: None,
        }
    }

    pub fn last_persisted_offset(&self) -> Option<u64> {
        self.last_persisted_offset
    }

    pub async fn subscribe(&mut self, offset: u64) -> Result<(), CursorError> {
        self.transport
            .subscribe(&self.topic, self.partition, offset)
            .await
            .map_err(CursorError::Subscribe)?;
        self.subscribed = true;
        Ok(())
    }

    /// Creates the admin topic if absent and sets its retention to
    /// unbounded, spec.md §4.F (top-level controller on election).
    pub async fn ensure_topic(&self, replication_factor: u32) -> Result<(), CursorError> {
        if !self
            .transport
            .contains_topic(&self.topic)
            .await
            .map_err(CursorError::Transport)?
        {
            self.transport
                .create_topic(&self.topic, 1, replication_factor)
                .await
                .map_err(CursorError::Transport)?;
        }
        self.transport
            .set_unbounded_retention(&self.topic)
            .await
            .map_err(CursorError::Transport)?;
        Ok(())
    }

    pub async fn unsubscribe(&mut self) -> Result<(), CursorError> {
        if self.subscribed {
            self.transport.unsubscribe().await.map_err(CursorError::Transport)?;
            self.subscribed = false;
        }
        Ok(())
    }

    /// Clears the undelivered buffer, spec.md §4.F: volatile state wiped on
    /// loss of leadership or resubscription.
    pub fn clear_buffer(&mut self) {
        self.undelivered.clear();
    }

    /// Returns a snapshot of records awaiting dispatch, polling the
    /// transport only if the buffer was empty.
    pub async fn poll(&mut self, timeout: Duration) -> Result<Vec<LogRecord>, CursorError> {
        if self.undelivered.is_empty() {
            let batch = self.transport.poll(timeout).await.map_err(CursorError::Transport)?;
            self.undelivered.extend(batch);
        }
        Ok(self.undelivered.iter().cloned().collect())
    }

    /// Removes the front record after it has been successfully dispatched.
    /// Callers must call this once per record, in order, as the dispatcher
    /// consumes the snapshot returned by `poll`.
    pub fn mark_delivered(&mut self) {
        self.undelivered.pop_front();
    }

    /// Records a durable persist point. Any buffered record whose offset is
    /// now `<= offset` is dropped (its lifecycle ends here per spec.md §3).
    pub fn persist(&mut self, offset: u64) {
        self.last_persisted_offset = Some(offset);
        self.undelivered.retain(|r| r.offset > offset);
    }
}
