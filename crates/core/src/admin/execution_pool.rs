//! Admin execution pool (component D), spec.md §4.D.
//!
//! Drains each store's pending queue sequentially (preserving per-store
//! order) while stores run concurrently, bounded by a semaphore-based
//! worker limit and a single cycle-wide timeout. Cooperative cancellation:
//! a per-store task checks a shared cancellation flag between operations
//! rather than being hard-aborted mid-apply, so a handler never observes a
//! torn write.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::admin::dispatcher::PendingQueue;
use crate::admin::operation::ExecutionId;
use crate::context::StoreName;
use crate::external::AdminHandler;

/// Terminal state of one store's drain task for a single cycle.
///
/// `Raised` and `TimedOutNoProgress` carry the offset of the store's own
/// head-of-pending-queue operation — the one that raised or stalled — so
/// the caller can mark that store problematic at the offset that is
/// actually blocking it (spec.md §4.D), not some unrelated cluster-wide
/// offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreCycleResult {
    CompletedSuccessfully,
    Raised { head_offset: u64 },
    TimedOutNoProgress { head_offset: u64 },
    TimedOutWithProgress,
}

pub struct CycleReport {
    /// Per-store terminal state, for every store that had a non-empty queue.
    pub results: HashMap<StoreName, StoreCycleResult>,
    /// Per-store highest execution id successfully applied this cycle.
    pub succeeded_this_cycle: HashMap<StoreName, ExecutionId>,
}

pub struct AdminExecutionPool {
    max_workers: usize,
}

impl AdminExecutionPool {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
        }
    }

    /// Drains `pending` for one cycle. Queues that fully drain successfully
    /// are removed from `pending`; queues that stall (error or timeout)
    /// retain their unprocessed tail for the next cycle.
    pub async fn execute_cycle(
        &self,
        pending: &mut HashMap<StoreName, PendingQueue>,
        handler: Arc<dyn AdminHandler>,
        starting_execution_id: &HashMap<StoreName, ExecutionId>,
        timeout: Duration,
    ) -> CycleReport {
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let cancel = Arc::new(AtomicBool::new(false));
        let succeeded_this_cycle: Arc<Mutex<HashMap<StoreName, ExecutionId>>> = Arc::new(Mutex::new(HashMap::new()));

        // Kept so that a store whose task never yields to `cancel` (and
        // therefore has to be hard-aborted after the grace period) can still
        // have its whole pre-cycle queue restored for retry next cycle. The
        // admin handler is contractually idempotent by execution id (spec.md
        // §6), so redelivering already-applied operations from this snapshot
        // is safe.
        let original_queues: HashMap<StoreName, PendingQueue> = pending.clone();

        let mut joinset = tokio::task::JoinSet::new();
        for (store, queue) in pending.drain() {
            if queue.is_empty() {
                continue;
            }
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();
            let handler = handler.clone();
            let succeeded_this_cycle = succeeded_this_cycle.clone();
            let store_cloned = store.clone();

            joinset.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
                let mut queue = queue;
                let mut raised = false;
                while let Some((_offset, op)) = queue.front() {
                    if cancel.load(Ordering::Relaxed) {
                        break;
                    }
                    match handler.apply(&store_cloned, op).await {
                        Ok(()) => {
                            let execution_id = op.execution_id();
                            succeeded_this_cycle.lock().insert(store_cloned.clone(), execution_id);
                            queue.pop_front();
                        }
                        Err(_) => {
                            raised = true;
                            break;
                        }
                    }
                }
                (store_cloned, queue, raised)
            });
        }

        let mut outcomes = Vec::new();
        let all_done = tokio::time::timeout(timeout, async {
            while let Some(res) = joinset.join_next().await {
                outcomes.push(res.expect("store drain task panicked"));
            }
        })
        .await;

        if all_done.is_err() {
            // The cycle-wide deadline passed. `cancel` is set so any task
            // between operations stops on its own, but a task already
            // blocked inside a single `handler.apply()` call won't notice
            // until that call returns; since a cycle must not run longer
            // than `timeout`, such tasks are hard-aborted and their progress
            // (if any, recorded in `succeeded_this_cycle` before the abort)
            // is reconciled from `original_queues` below.
            cancel.store(true, Ordering::Relaxed);
            joinset.abort_all();
            while joinset.join_next().await.is_some() {}
        }

        let mut results = HashMap::new();
        let mut restored_pending = HashMap::new();
        let mut accounted_for: std::collections::HashSet<StoreName> = std::collections::HashSet::new();

        for (store, remaining_queue, raised) in outcomes {
            accounted_for.insert(store.clone());
            if raised || !remaining_queue.is_empty() {
                let made_progress =
                    succeeded_this_cycle.lock().get(&store).copied() != starting_execution_id.get(&store).copied();
                let head_offset = remaining_queue.front().map(|(offset, _)| *offset).unwrap_or(0);
                results.insert(
                    store.clone(),
                    if raised {
                        StoreCycleResult::Raised { head_offset }
                    } else if made_progress {
                        StoreCycleResult::TimedOutWithProgress
                    } else {
                        StoreCycleResult::TimedOutNoProgress { head_offset }
                    },
                );
                restored_pending.insert(store, remaining_queue);
            } else {
                results.insert(store, StoreCycleResult::CompletedSuccessfully);
            }
        }

        // Stores whose task was hard-aborted never produced an outcome; fall
        // back to their pre-cycle snapshot.
        for (store, original_queue) in original_queues {
            if accounted_for.contains(&store) {
                continue;
            }
            let made_progress =
                succeeded_this_cycle.lock().get(&store).copied() != starting_execution_id.get(&store).copied();
            let head_offset = original_queue.front().map(|(offset, _)| *offset).unwrap_or(0);
            results.insert(
                store.clone(),
                if made_progress {
                    StoreCycleResult::TimedOutWithProgress
                } else {
                    StoreCycleResult::TimedOutNoProgress { head_offset }
                },
            );
            restored_pending.insert(store, original_queue);
        }

        let succeeded_snapshot = succeeded_this_cycle.lock().clone();
        *pending = restored_pending;

        CycleReport {
            results,
            succeeded_this_cycle: succeeded_snapshot,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::operation::AdminOperation;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;
    use tokio::time::sleep;

    struct DelayHandler {
        delay_by_store: HashMap<StoreName, Duration>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl AdminHandler for DelayHandler {
        async fn apply(&self, store: &StoreName, _op: &AdminOperation) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if let Some(delay) = self.delay_by_store.get(store) {
                sleep(*delay).await;
            }
            Ok(())
        }
    }

    fn op(execution_id: ExecutionId, store: &str) -> AdminOperation {
        AdminOperation::CreateStore {
            execution_id,
            store_name: store.to_owned(),
            replication_factor: 1,
        }
    }

    #[tokio::test]
    async fn fast_stores_complete_while_slow_store_is_marked_problematic() {
        let mut pending = HashMap::new();
        pending.insert(
            StoreName::new("slow"),
            PendingQueue::from([(10, op(100, "slow"))]),
        );
        pending.insert(StoreName::new("fast"), PendingQueue::from([(11, op(101, "fast"))]));

        let handler = Arc::new(DelayHandler {
            delay_by_store: HashMap::from([(StoreName::new("slow"), Duration::from_millis(200))]),
            calls: AtomicU32::new(0),
        });

        let pool = AdminExecutionPool::new(4);
        let report = pool
            .execute_cycle(&mut pending, handler, &HashMap::new(), Duration::from_millis(50))
            .await;

        assert_eq!(report.results[&StoreName::new("fast")], StoreCycleResult::CompletedSuccessfully);
        assert!(matches!(
            report.results[&StoreName::new("slow")],
            StoreCycleResult::TimedOutNoProgress { head_offset: 10 }
        ));
        assert!(pending.contains_key(&StoreName::new("slow")));
        assert!(!pending.contains_key(&StoreName::new("fast")));
    }
}
