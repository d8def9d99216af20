//! Data integrity validation (component B): monotonic execution-id
//! gap/duplicate detection, spec.md §4.B.

use crate::admin::operation::ExecutionId;
use crate::error::{DivError, DivOutcome};

/// Tracks `lastDelegatedExecutionId` for one cluster's subscription and the
/// single-shot DIV-skip sentinel.
#[derive(Debug, Default)]
pub struct DivValidator {
    last_delegated_execution_id: Option<ExecutionId>,
    offset_to_skip_div: Option<u64>,
}

impl DivValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets all volatile state, spec.md §4.F (loss of leadership / resubscription).
    pub fn reset(&mut self) {
        self.last_delegated_execution_id = None;
        self.offset_to_skip_div = None;
    }

    pub fn last_delegated_execution_id(&self) -> Option<ExecutionId> {
        self.last_delegated_execution_id
    }

    /// Registers a single-shot DIV-skip override for `offset`. Caller is
    /// responsible for checking it matches the current `failingOffset`
    /// (spec.md §4.E); this type only tracks whether the sentinel is set.
    pub fn set_skip_div(&mut self, offset: u64) {
        self.offset_to_skip_div = Some(offset);
    }

    /// Checks `op` against the monotonic baseline. Consumes the DIV-skip
    /// sentinel if it matches `offset`.
    pub fn check(&mut self, op_execution_id: ExecutionId, offset: u64) -> Result<DivOutcome, DivError> {
        if self.offset_to_skip_div == Some(offset) {
            self.offset_to_skip_div = None;
            self.last_delegated_execution_id = Some(op_execution_id);
            return Ok(DivOutcome::Accepted);
        }

        match self.last_delegated_execution_id {
            None => {
                self.last_delegated_execution_id = Some(op_execution_id);
                Ok(DivOutcome::Accepted)
            }
            Some(last) if op_execution_id == last + 1 => {
                self.last_delegated_execution_id = Some(op_execution_id);
                Ok(DivOutcome::Accepted)
            }
            Some(last) if op_execution_id <= last => Ok(DivOutcome::Duplicate),
            Some(last) => Err(DivError::Gap {
                offset,
                expected: last + 1,
                incoming: op_execution_id,
            }),
        }
    }
}
