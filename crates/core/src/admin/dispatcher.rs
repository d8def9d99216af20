//! Per-store dispatcher (component C), spec.md §4.C.

use std::collections::{HashMap, VecDeque};

use crate::admin::div::DivValidator;
use crate::admin::operation::AdminOperation;
use crate::admin::progress::ProgressTracker;
use crate::context::StoreName;
use crate::error::{DispatchError, DivOutcome};
use crate::external::{LogRecord, MessageType};

pub type PendingQueue = VecDeque<(u64, AdminOperation)>;

/// What happened to one `LogRecord` as it passed through the dispatcher.
#[derive(Debug, PartialEq)]
pub enum DispatchOutcome {
    /// Consumed the plain skip sentinel; nothing enqueued.
    SkippedByOperator,
    /// Already applied (offset <= lastPersistedOffset); dropped.
    AlreadyProcessed,
    /// Transport-level marker; dropped.
    ControlMessage,
    /// Duplicate per DIV; dropped.
    DivDuplicate,
    /// Enqueued onto the named store's pending queue.
    Enqueued { store: StoreName },
}

pub struct PerStoreDispatcher {
    admin_topic: String,
    admin_partition: u32,
    pending: HashMap<StoreName, PendingQueue>,
    last_seen_offset: Option<u64>,
}

impl PerStoreDispatcher {
    pub fn new(admin_topic: impl Into<String>, admin_partition: u32) -> Self {
        Self {
            admin_topic: admin_topic.into(),
            admin_partition,
            pending: HashMap::new(),
            last_seen_offset: None,
        }
    }

    pub fn pending(&self) -> &HashMap<StoreName, PendingQueue> {
        &self.pending
    }

    pub fn pending_mut(&mut self) -> &mut HashMap<StoreName, PendingQueue> {
        &mut self.pending
    }

    pub fn last_seen_offset(&self) -> Option<u64> {
        self.last_seen_offset
    }

    /// Clears all pending queues, spec.md §4.F volatile-state reset.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.last_seen_offset = None;
    }

    /// Dispatches one record, deserializing its payload as an `AdminOperation`
    /// via the envelope's declared schema id. Actual schema-driven decoding
    /// is delegated to `decode`; this core treats the schema registry as an
    /// external collaborator (spec.md §6) and only needs bytes -> operation.
    pub fn dispatch(
        &mut self,
        record: &LogRecord,
        topic: &str,
        partition: u32,
        progress: &mut ProgressTracker,
        div: &mut DivValidator,
        decode: impl FnOnce(&[u8], u32) -> Result<AdminOperation, anyhow::Error>,
    ) -> Result<DispatchOutcome, DispatchError> {
        if progress.try_consume_skip(record.offset) {
            self.last_seen_offset = Some(record.offset);
            return Ok(DispatchOutcome::SkippedByOperator);
        }

        if topic != self.admin_topic || partition != self.admin_partition {
            return Err(DispatchError::WrongPartition { offset: record.offset });
        }

        if let Some(persisted) = progress.last_persisted_offset() {
            if record.offset <= persisted {
                self.last_seen_offset = Some(record.offset);
                return Ok(DispatchOutcome::AlreadyProcessed);
            }
        }

        if record.key.is_control_message {
            self.last_seen_offset = Some(record.offset);
            return Ok(DispatchOutcome::ControlMessage);
        }

        if record.envelope.message_type != MessageType::Put {
            return Err(DispatchError::NotPut { offset: record.offset });
        }

        let op = decode(&record.envelope.payload, record.envelope.schema_id)
            .map_err(|source| DispatchError::Deserialize { offset: record.offset, source })?;

        if progress.try_consume_skip_div(record.offset) {
            div.set_skip_div(record.offset);
        }
        match div.check(op.execution_id(), record.offset)? {
            DivOutcome::Duplicate => {
                self.last_seen_offset = Some(record.offset);
                return Ok(DispatchOutcome::DivDuplicate);
            }
            DivOutcome::Accepted => {}
            DivOutcome::Gap => unreachable!("check() returns Err for a gap, never Ok(Gap)"),
        }

        let store = op.store_name(record.offset)?;
        self.pending.entry(store.clone()).or_default().push_back((record.offset, op));
        self.last_seen_offset = Some(record.offset);
        Ok(DispatchOutcome::Enqueued { store })
    }
}
