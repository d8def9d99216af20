//! Outer admin-loop orchestration tying components A-F together, spec.md §2
//! data flow (A → B → C → D → E → F) and §5 "Admin side".

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::admin::dispatcher::{DispatchOutcome, PerStoreDispatcher};
use crate::admin::div::DivValidator;
use crate::admin::execution_pool::{AdminExecutionPool, StoreCycleResult};
use crate::admin::leadership::{LeadershipGate, LeadershipTransition, TopicCreationRole};
use crate::admin::operation::AdminOperation;
use crate::admin::progress::ProgressTracker;
use crate::admin::cursor::LogCursor;
use crate::context::ClusterId;
use crate::external::coordination::CoordinationStore;
use crate::external::AdminHandler;
use crate::metrics::Metrics;

pub struct AdminConsumerConfig {
    pub cluster: ClusterId,
    pub admin_topic: String,
    pub admin_partition: u32,
    pub topic_replication_factor: u32,
    pub cycle_delay: Duration,
    pub cycle_timeout: Duration,
    pub max_workers: usize,
}

/// The single long-lived per-cluster outer loop, spec.md §5: "One dedicated
/// long-lived task per cluster runs the outer loop (leader check → subscribe
/// → poll → dispatch → execute cycle → persist)."
pub struct AdminConsumer {
    config: AdminConsumerConfig,
    cursor: LogCursor,
    div: DivValidator,
    dispatcher: PerStoreDispatcher,
    progress: ProgressTracker,
    pool: AdminExecutionPool,
    leadership: LeadershipGate,
    coordination: Arc<dyn CoordinationStore>,
    handler: Arc<dyn AdminHandler>,
    metrics: Arc<Metrics>,
    decode: fn(&[u8], u32) -> Result<AdminOperation, anyhow::Error>,
}

impl AdminConsumer {
    pub async fn new(
        config: AdminConsumerConfig,
        transport: Arc<dyn crate::external::AdminLogTransport>,
        coordination: Arc<dyn CoordinationStore>,
        handler: Arc<dyn AdminHandler>,
        leadership: LeadershipGate,
        metrics: Arc<Metrics>,
        decode: fn(&[u8], u32) -> Result<AdminOperation, anyhow::Error>,
    ) -> anyhow::Result<Self> {
        let persisted = coordination.read_progress(config.cluster.as_str()).await?;
        let progress = ProgressTracker::from_persisted(persisted);
        let cursor = LogCursor::new(transport, config.admin_topic.clone(), config.admin_partition);
        let dispatcher = PerStoreDispatcher::new(config.admin_topic.clone(), config.admin_partition);
        let pool = AdminExecutionPool::new(config.max_workers);
        Ok(Self {
            config,
            cursor,
            div: DivValidator::new(),
            dispatcher,
            progress,
            pool,
            leadership,
            coordination,
            handler,
            metrics,
            decode,
        })
    }

    /// Runs the outer loop forever, sleeping `cycle_delay` between ticks.
    /// Exits only on a fatal error from a collaborator; per spec.md §6
    /// everything else is logged and retried.
    pub async fn run(&mut self) {
        loop {
            if let Err(e) = self.tick().await {
                warn!(cluster = %self.config.cluster, error = %e, "admin consumer tick failed, retrying next cycle");
            }
            tokio::time::sleep(self.config.cycle_delay).await;
        }
    }

    /// One iteration: leader check, subscribe-on-election, poll, dispatch,
    /// execute, persist.
    pub async fn tick(&mut self) -> anyhow::Result<()> {
        let cluster = self.config.cluster.as_str().to_owned();

        match self.leadership.tick(&cluster).await? {
            LeadershipTransition::LostLeadership => {
                self.cursor.unsubscribe().await?;
                self.reset_volatile_state();
                return Ok(());
            }
            LeadershipTransition::BecameLeader => {
                match self.leadership.should_create_topic(&cluster).await? {
                    TopicCreationRole::Create => {
                        self.cursor.ensure_topic(self.config.topic_replication_factor).await?;
                    }
                    TopicCreationRole::Wait { should_log } => {
                        if should_log {
                            info!(cluster = %cluster, topic = %self.config.admin_topic, "waiting for top-level controller to create admin topic");
                        }
                    }
                }
                let resume_from = self.progress.last_persisted_offset().unwrap_or(0);
                self.cursor.subscribe(resume_from).await?;
            }
            LeadershipTransition::None => {
                if !self.leadership.is_leader() {
                    return Ok(());
                }
            }
        }

        let cycle_start = std::time::Instant::now();
        let batch = self.cursor.poll(Duration::from_millis(500)).await?;

        for record in &batch {
            let outcome = self.dispatcher.dispatch(
                record,
                &self.config.admin_topic,
                self.config.admin_partition,
                &mut self.progress,
                &mut self.div,
                self.decode,
            );
            self.cursor.mark_delivered();
            match outcome {
                Ok(DispatchOutcome::Enqueued { .. })
                | Ok(DispatchOutcome::SkippedByOperator)
                | Ok(DispatchOutcome::AlreadyProcessed)
                | Ok(DispatchOutcome::ControlMessage) => {}
                Ok(DispatchOutcome::DivDuplicate) => {
                    info!(offset = record.offset, "dropping duplicate admin operation");
                }
                Err(crate::error::DispatchError::Div(crate::error::DivError::Gap { offset, .. })) => {
                    self.metrics.admin_topic_div_error_report_count.with_label_values(&[&cluster]).inc();
                    self.progress.record_div_gap(offset);
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "fatal dispatch error, stopping dispatch for this cycle");
                    break;
                }
            }
        }

        let starting_execution_ids: HashMap<_, _> = self
            .dispatcher
            .pending()
            .keys()
            .filter_map(|store| self.progress.execution_id_for_store(store).map(|id| (store.clone(), id)))
            .collect();

        let report = self
            .pool
            .execute_cycle(
                self.dispatcher.pending_mut(),
                self.handler.clone(),
                &starting_execution_ids,
                self.config.cycle_timeout,
            )
            .await;

        let mut largest_succeeded = self.progress.last_succeeded_execution_id();
        for (store, result) in &report.results {
            match result {
                StoreCycleResult::CompletedSuccessfully => self.progress.clear_problematic(store),
                StoreCycleResult::Raised { head_offset } | StoreCycleResult::TimedOutNoProgress { head_offset } => {
                    self.progress.mark_problematic(store.clone(), *head_offset);
                }
                StoreCycleResult::TimedOutWithProgress => {
                    self.progress.clear_problematic(store);
                }
            }
        }
        for (store, execution_id) in &report.succeeded_this_cycle {
            self.progress.record_store_success(store.clone(), *execution_id);
            largest_succeeded = Some(largest_succeeded.map_or(*execution_id, |cur| cur.max(*execution_id)));
        }

        let candidate_offset = self
            .dispatcher
            .last_seen_offset()
            .unwrap_or_else(|| self.cursor.last_persisted_offset().unwrap_or(0));

        if let Some((execution_id, offset)) = self.progress.reconcile_cycle_end(largest_succeeded, candidate_offset) {
            self.coordination
                .write_progress(
                    &cluster,
                    execution_id,
                    offset,
                    &self
                        .dispatcher
                        .pending()
                        .keys()
                        .cloned()
                        .collect::<Vec<_>>()
                        .into_iter()
                        .filter_map(|s| self.progress.execution_id_for_store(&s).map(|id| (s.as_str().to_owned(), id)))
                        .collect(),
                )
                .await?;
            self.cursor.persist(offset);
        }

        self.metrics
            .admin_consumption_cycle_duration_ms
            .with_label_values(&[&cluster])
            .observe(cycle_start.elapsed().as_millis() as f64);
        self.metrics
            .admin_consumption_failed_offset
            .with_label_values(&[&cluster])
            .set(self.progress.failing_offset().unwrap_or(0) as i64);

        Ok(())
    }

    fn reset_volatile_state(&mut self) {
        self.div.reset();
        self.dispatcher.clear();
        self.progress.reset_volatile();
        self.cursor.clear_buffer();
    }

    pub fn skip_message_with_offset(&mut self, offset: u64) -> Result<(), crate::error::ProgressError> {
        self.progress.skip_message_with_offset(offset)
    }

    pub fn skip_message_div_with_offset(&mut self, offset: u64) -> Result<(), crate::error::ProgressError> {
        self.progress.skip_message_div_with_offset(offset)
    }
}
