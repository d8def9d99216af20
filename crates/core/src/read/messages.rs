//! Read-path request/response types, grounded on the corpus's typed-message
//! style (client-api-messages). spec.md §3 "Read-path data", §4.G.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::context::StoreName;

/// Cooperative early-termination flag carried by a router request, spec.md
/// §4.G: checked once before a request is queued onto a worker pool and
/// once again when its task starts running, so a request abandoned by its
/// caller never touches storage.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
pub struct PointGetRequest {
    pub store: StoreName,
    pub user_partition: u32,
    pub key: Vec<u8>,
    pub early_termination: CancellationToken,
}

#[derive(Debug, Clone)]
pub struct BatchGetKey {
    pub partition_id: u32,
    pub key_bytes: Vec<u8>,
    /// Index into the caller's original key list, used to correlate
    /// responses (and, for streaming requests, to report a missing key).
    pub key_index: i64,
}

#[derive(Debug, Clone)]
pub struct BatchGetRequest {
    pub store: StoreName,
    pub keys: Vec<BatchGetKey>,
    /// Streaming requests tolerate a per-key sentinel for missing keys
    /// (negated `key_index`, empty value) rather than failing the batch.
    pub streaming: bool,
    pub early_termination: CancellationToken,
}

/// One named compute operation in a `ComputeRequest` pipeline, spec.md §3.
#[derive(Debug, Clone)]
pub enum ComputeOp {
    DotProduct { input_field: String, result_field: String, with: Vec<f32> },
    CosineSimilarity { input_field: String, result_field: String, with: Vec<f32> },
    HadamardProduct { input_field: String, result_field: String, with: Vec<f32> },
    Count { input_field: String, result_field: String },
}

impl ComputeOp {
    pub fn input_field(&self) -> &str {
        match self {
            Self::DotProduct { input_field, .. }
            | Self::CosineSimilarity { input_field, .. }
            | Self::HadamardProduct { input_field, .. }
            | Self::Count { input_field, .. } => input_field,
        }
    }

    pub fn result_field(&self) -> &str {
        match self {
            Self::DotProduct { result_field, .. }
            | Self::CosineSimilarity { result_field, .. }
            | Self::HadamardProduct { result_field, .. }
            | Self::Count { result_field, .. } => result_field,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::DotProduct { .. } => "dot_product",
            Self::CosineSimilarity { .. } => "cosine_similarity",
            Self::HadamardProduct { .. } => "hadamard_product",
            Self::Count { .. } => "count",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ComputeRequest {
    pub store: StoreName,
    pub keys: Vec<BatchGetKey>,
    pub value_schema_id: u32,
    pub result_schema: String,
    pub operations: Vec<ComputeOp>,
    pub streaming: bool,
    pub early_termination: CancellationToken,
}

#[derive(Debug, Clone)]
pub enum ReadRequest {
    PointGet(PointGetRequest),
    BatchGet(BatchGetRequest),
    Compute(ComputeRequest),
    HealthCheck,
    DictionaryFetch { store: StoreName },
    Admin,
}

#[derive(Debug, Clone)]
pub struct KeyedValue {
    pub key_index: i64,
    /// `None` signals a missing key; only valid on a streaming response.
    pub value: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default)]
pub struct ReadResponseMeta {
    pub queue_depth: usize,
    pub submission_wait: std::time::Duration,
}

#[derive(Debug, Clone)]
pub enum ReadResponse {
    Value(Option<Vec<u8>>),
    Batch(Vec<KeyedValue>),
    Compute(Vec<KeyedValue>),
    Health(crate::external::disk_health::HealthStatus),
    Dictionary(Option<Vec<u8>>),
    Admin(String),
    Error { status: ErrorStatus, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStatus {
    BadRequest,
    EarlyTerminated,
    StorageError,
}
