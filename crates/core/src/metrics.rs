//! Central `prometheus` metrics registry, exposing exactly the surface named
//! in spec.md §6 plus the per-op read-path breakdown implied by §4.G/§4.I.
//!
//! Grounded on the teacher's convention of a single `Metrics` struct built
//! once at startup and threaded through by `Arc`, rather than a global
//! `lazy_static` registry (spec.md §9 rules out module-level globals here).

use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};

pub struct Metrics {
    pub registry: Registry,

    /// `adminConsumptionFailedOffset`: the cluster's current `failingOffset`, or 0 if unset.
    pub admin_consumption_failed_offset: IntGaugeVec,
    /// `pendingAdminMessagesCount`: total queued-but-unapplied admin operations, per cluster.
    pub pending_admin_messages_count: IntGaugeVec,
    /// `storesWithPendingAdminMessagesCount`.
    pub stores_with_pending_admin_messages_count: IntGaugeVec,
    /// `adminConsumptionCycleDurationMs`.
    pub admin_consumption_cycle_duration_ms: HistogramVec,
    /// `adminTopicDIVErrorReportCount`.
    pub admin_topic_div_error_report_count: IntCounterVec,

    /// Per read-op-kind request counter.
    pub read_requests_total: IntCounterVec,
    /// Submission-wait latency attached to each read response, spec.md §4.G.
    pub read_submission_wait_seconds: HistogramVec,
    /// Queue depth sampled at submission time.
    pub read_queue_depth: IntGaugeVec,
    /// Storage-engine get latency.
    pub read_storage_lookup_seconds: Histogram,
    /// Compute-pipeline evaluation latency, excluding serialization.
    pub read_compute_seconds: Histogram,
    /// Result-record serialization latency.
    pub read_compute_serialization_seconds: Histogram,
    /// Per-compute-operation success counter, spec.md §4.I step 4.
    pub compute_op_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let admin_consumption_failed_offset =
            IntGaugeVec::new(Opts::new("admin_consumption_failed_offset", "current failingOffset, 0 if unset"), &["cluster"]).unwrap();
        let pending_admin_messages_count = IntGaugeVec::new(
            Opts::new("pending_admin_messages_count", "queued unapplied admin operations"),
            &["cluster"],
        )
        .unwrap();
        let stores_with_pending_admin_messages_count = IntGaugeVec::new(
            Opts::new(
                "stores_with_pending_admin_messages_count",
                "number of stores with a non-empty pending queue",
            ),
            &["cluster"],
        )
        .unwrap();
        let admin_consumption_cycle_duration_ms = HistogramVec::new(
            HistogramOpts::new("admin_consumption_cycle_duration_ms", "admin execution cycle wall time"),
            &["cluster"],
        )
        .unwrap();
        let admin_topic_div_error_report_count = IntCounterVec::new(
            Opts::new("admin_topic_div_error_report_count", "DIV gap occurrences"),
            &["cluster"],
        )
        .unwrap();

        let read_requests_total =
            IntCounterVec::new(Opts::new("read_requests_total", "read requests accepted, per kind"), &["kind"]).unwrap();
        let read_submission_wait_seconds = HistogramVec::new(
            HistogramOpts::new("read_submission_wait_seconds", "time from accept to worker pickup"),
            &["kind"],
        )
        .unwrap();
        let read_queue_depth =
            IntGaugeVec::new(Opts::new("read_queue_depth", "pending tasks in a worker pool"), &["pool"]).unwrap();
        let read_storage_lookup_seconds = Histogram::with_opts(HistogramOpts::new(
            "read_storage_lookup_seconds",
            "storage engine get() latency",
        ))
        .unwrap();
        let read_compute_seconds =
            Histogram::with_opts(HistogramOpts::new("read_compute_seconds", "compute pipeline evaluation latency")).unwrap();
        let read_compute_serialization_seconds = Histogram::with_opts(HistogramOpts::new(
            "read_compute_serialization_seconds",
            "result record serialization latency",
        ))
        .unwrap();
        let compute_op_total =
            IntCounterVec::new(Opts::new("compute_op_total", "successful evaluations, per operation kind"), &["op"]).unwrap();

        registry.register(Box::new(admin_consumption_failed_offset.clone())).unwrap();
        registry.register(Box::new(pending_admin_messages_count.clone())).unwrap();
        registry
            .register(Box::new(stores_with_pending_admin_messages_count.clone()))
            .unwrap();
        registry.register(Box::new(admin_consumption_cycle_duration_ms.clone())).unwrap();
        registry.register(Box::new(admin_topic_div_error_report_count.clone())).unwrap();
        registry.register(Box::new(read_requests_total.clone())).unwrap();
        registry.register(Box::new(read_submission_wait_seconds.clone())).unwrap();
        registry.register(Box::new(read_queue_depth.clone())).unwrap();
        registry.register(Box::new(read_storage_lookup_seconds.clone())).unwrap();
        registry.register(Box::new(read_compute_seconds.clone())).unwrap();
        registry
            .register(Box::new(read_compute_serialization_seconds.clone()))
            .unwrap();
        registry.register(Box::new(compute_op_total.clone())).unwrap();

        Self {
            registry,
            admin_consumption_failed_offset,
            pending_admin_messages_count,
            stores_with_pending_admin_messages_count,
            admin_consumption_cycle_duration_ms,
            admin_topic_div_error_report_count,
            read_requests_total,
            read_submission_wait_seconds,
            read_queue_depth,
            read_storage_lookup_seconds,
            read_compute_seconds,
            read_compute_serialization_seconds,
            compute_op_total,
        }
    }

    /// Convenience accessor for a per-cluster failing-offset gauge.
    pub fn failing_offset_gauge(&self, cluster: &str) -> IntGauge {
        self.admin_consumption_failed_offset.with_label_values(&[cluster])
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
