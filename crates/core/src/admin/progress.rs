//! Progress tracker and skip controls (component E), spec.md §3 "Progress
//! state" / "Volatile controller state", §4.E.

use std::collections::HashMap;

use crate::admin::operation::ExecutionId;
use crate::context::StoreName;
use crate::error::ProgressError;
use crate::external::coordination::PersistedProgress;

/// Durable + volatile progress state for one cluster's admin consumer.
/// Single writer: the consumer task, at cycle boundaries (spec.md §5).
pub struct ProgressTracker {
    // Durable (mirrors the coordination store; write-through on cycle success).
    last_persisted_offset: Option<u64>,
    last_succeeded_execution_id: Option<ExecutionId>,
    last_succeeded_execution_id_by_store: HashMap<StoreName, ExecutionId>,

    // Volatile.
    failing_offset: Option<u64>,
    offset_to_skip: Option<u64>,
    offset_to_skip_div: Option<u64>,
    problematic_stores: HashMap<StoreName, u64>,
}

impl ProgressTracker {
    pub fn from_persisted(persisted: PersistedProgress) -> Self {
        Self {
            last_persisted_offset: persisted.last_persisted_offset,
            last_succeeded_execution_id: persisted.last_succeeded_execution_id,
            last_succeeded_execution_id_by_store: persisted
                .last_succeeded_execution_id_by_store
                .into_iter()
                .map(|(k, v)| (StoreName::new(k), v))
                .collect(),
            failing_offset: None,
            offset_to_skip: None,
            offset_to_skip_div: None,
            problematic_stores: HashMap::new(),
        }
    }

    pub fn last_persisted_offset(&self) -> Option<u64> {
        self.last_persisted_offset
    }

    pub fn last_succeeded_execution_id(&self) -> Option<ExecutionId> {
        self.last_succeeded_execution_id
    }

    pub fn execution_id_for_store(&self, store: &StoreName) -> Option<ExecutionId> {
        self.last_succeeded_execution_id_by_store.get(store).copied()
    }

    pub fn failing_offset(&self) -> Option<u64> {
        self.failing_offset
    }

    pub fn problematic_stores(&self) -> &HashMap<StoreName, u64> {
        &self.problematic_stores
    }

    /// Resets all volatile state, spec.md §4.F: on loss of leadership or
    /// resubscription. Durable state (the `last_*` fields) is untouched.
    pub fn reset_volatile(&mut self) {
        self.failing_offset = None;
        self.offset_to_skip = None;
        self.offset_to_skip_div = None;
        self.problematic_stores.clear();
    }

    /// spec.md §4.E `skipMessageWithOffset`.
    pub fn skip_message_with_offset(&mut self, offset: u64) -> Result<(), ProgressError> {
        if self.failing_offset != Some(offset) {
            return Err(ProgressError::SkipMismatch {
                requested: offset,
                actual: self.failing_offset,
            });
        }
        self.offset_to_skip = Some(offset);
        Ok(())
    }

    /// spec.md §4.E `skipMessageDIVWithOffset`.
    pub fn skip_message_div_with_offset(&mut self, offset: u64) -> Result<(), ProgressError> {
        if self.failing_offset != Some(offset) {
            return Err(ProgressError::SkipMismatch {
                requested: offset,
                actual: self.failing_offset,
            });
        }
        self.offset_to_skip_div = Some(offset);
        Ok(())
    }

    /// Consumes the plain skip sentinel if `offset` matches it.
    pub fn try_consume_skip(&mut self, offset: u64) -> bool {
        if self.offset_to_skip == Some(offset) {
            self.offset_to_skip = None;
            true
        } else {
            false
        }
    }

    pub fn offset_to_skip_div(&self) -> Option<u64> {
        self.offset_to_skip_div
    }

    /// Consumes the DIV-skip sentinel if `offset` matches it, mirroring
    /// `try_consume_skip`'s single-shot semantics for the plain skip field
    /// (spec.md §3: a skip sentinel is used at most once).
    pub fn try_consume_skip_div(&mut self, offset: u64) -> bool {
        if self.offset_to_skip_div == Some(offset) {
            self.offset_to_skip_div = None;
            true
        } else {
            false
        }
    }

    /// Records a DIV gap as the new failing offset, unless a DIV-originated
    /// failing offset already there is further ahead (spec.md §4.D cycle-end
    /// reconciliation: "never overwrite a DIV-originated failingOffset that
    /// is already ahead").
    pub fn record_div_gap(&mut self, offset: u64) {
        match self.failing_offset {
            Some(existing) if existing <= offset => {}
            _ => self.failing_offset = Some(offset),
        }
    }

    pub fn mark_problematic(&mut self, store: StoreName, blocking_offset: u64) {
        self.problematic_stores.insert(store, blocking_offset);
    }

    pub fn clear_problematic(&mut self, store: &StoreName) {
        self.problematic_stores.remove(store);
    }

    pub fn record_store_success(&mut self, store: StoreName, execution_id: ExecutionId) {
        self.last_succeeded_execution_id_by_store.insert(store, execution_id);
    }

    /// Cycle-end reconciliation, spec.md §4.D. Returns `Some((execution_id,
    /// offset))` to persist iff every store succeeded and the offset moved.
    pub fn reconcile_cycle_end(
        &mut self,
        largest_succeeded_this_cycle: Option<ExecutionId>,
        candidate_offset: u64,
    ) -> Option<(ExecutionId, u64)> {
        if !self.problematic_stores.is_empty() {
            let min_blocking = self.problematic_stores.values().copied().min();
            if let Some(min_blocking) = min_blocking {
                match self.failing_offset {
                    // A DIV-originated failing offset that is already ahead
                    // of the blocking offset is left untouched.
                    Some(existing) if existing <= min_blocking => {}
                    _ => self.failing_offset = Some(min_blocking),
                }
            }
            return None;
        }

        if let Some(largest) = largest_succeeded_this_cycle {
            self.last_succeeded_execution_id =
                Some(self.last_succeeded_execution_id.map_or(largest, |cur| cur.max(largest)));
        }

        if let Some(failing) = self.failing_offset {
            if failing <= self.last_persisted_offset.unwrap_or(0) {
                self.failing_offset = None;
            }
        }

        if self.last_persisted_offset == Some(candidate_offset) {
            return None;
        }
        self.last_persisted_offset = Some(candidate_offset);
        self.last_succeeded_execution_id.map(|eid| (eid, candidate_offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> ProgressTracker {
        ProgressTracker::from_persisted(PersistedProgress::default())
    }

    #[test]
    fn skip_rejects_mismatched_offset() {
        let mut p = fresh();
        p.failing_offset = Some(41);
        let err = p.skip_message_with_offset(42).unwrap_err();
        assert_eq!(
            err,
            ProgressError::SkipMismatch {
                requested: 42,
                actual: Some(41),
            }
        );
    }

    #[test]
    fn skip_is_single_shot() {
        let mut p = fresh();
        p.failing_offset = Some(10);
        p.skip_message_with_offset(10).unwrap();
        assert!(p.try_consume_skip(10));
        assert!(!p.try_consume_skip(10));
    }

    #[test]
    fn skip_div_is_single_shot() {
        let mut p = fresh();
        p.failing_offset = Some(11);
        p.skip_message_div_with_offset(11).unwrap();
        assert!(p.try_consume_skip_div(11));
        assert!(!p.try_consume_skip_div(11));
    }

    #[test]
    fn reconcile_persists_only_when_no_problems() {
        let mut p = fresh();
        assert_eq!(p.reconcile_cycle_end(Some(109), 19), Some((109, 19)));
        assert_eq!(p.last_persisted_offset(), Some(19));
    }

    #[test]
    fn reconcile_skips_persist_when_offset_unchanged() {
        let mut p = fresh();
        p.reconcile_cycle_end(Some(109), 19);
        assert_eq!(p.reconcile_cycle_end(Some(109), 19), None);
    }

    #[test]
    fn reconcile_sets_failing_offset_from_problematic_stores() {
        let mut p = fresh();
        p.mark_problematic(StoreName::new("a"), 10);
        assert_eq!(p.reconcile_cycle_end(Some(109), 19), None);
        assert_eq!(p.failing_offset(), Some(10));
        assert_eq!(p.last_persisted_offset(), None);
    }
}
