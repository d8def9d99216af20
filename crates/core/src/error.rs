//! Error taxonomy: one `thiserror` enum per component, aggregated here.
//! `anyhow` is reserved for process-boundary call sites (the `server` bin);
//! nothing in this crate's public API returns `anyhow::Error`.

use std::path::PathBuf;

use thiserror::Error;

use crate::context::StoreName;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config file {path}")]
    Io { path: PathBuf, #[source] source: std::io::Error },
    #[error("parsing config file {path}")]
    Parse { path: PathBuf, #[source] source: toml::de::Error },
}

/// Errors from the log cursor (component A), spec.md §4.A / §7 "Transport error".
#[derive(Debug, Error)]
pub enum CursorError {
    #[error("admin log transport error during poll")]
    Transport(#[source] anyhow::Error),
    #[error("admin log transport error during subscribe")]
    Subscribe(#[source] anyhow::Error),
    #[error("failed to persist offset {offset}")]
    Persist { offset: u64, #[source] source: anyhow::Error },
}

/// Errors from the DIV validator (component B), spec.md §4.B.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DivError {
    #[error("execution id gap at offset {offset}: expected {expected}, got {incoming}")]
    Gap { offset: u64, expected: i64, incoming: i64 },
}

/// Result of a DIV check that does not necessarily indicate an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DivOutcome {
    Accepted,
    Duplicate,
    Gap,
}

/// Errors from the per-store dispatcher (component C), spec.md §4.C.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("record at offset {offset} targets a different admin topic/partition")]
    WrongPartition { offset: u64 },
    #[error("record at offset {offset} has non-PUT message type")]
    NotPut { offset: u64 },
    #[error("failed to deserialize admin operation at offset {offset}")]
    Deserialize { offset: u64, #[source] source: anyhow::Error },
    #[error("admin operation at offset {offset} is missing a store name")]
    MissingStoreName { offset: u64 },
    #[error(transparent)]
    Div(#[from] DivError),
}

/// Errors surfaced by the admin handler collaborator, applied to a single operation.
#[derive(Debug, Error)]
#[error("admin handler failed to apply operation for store {store}")]
pub struct HandlerError {
    pub store: StoreName,
    #[source]
    pub source: anyhow::Error,
}

/// Errors from the progress tracker / skip controls (component E), spec.md §4.E.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ProgressError {
    #[error("skip offset {requested} does not match current failing offset {actual:?}")]
    SkipMismatch { requested: u64, actual: Option<u64> },
    #[error("failed to persist progress to the coordination store")]
    PersistFailed,
}

/// Errors from the read dispatcher (component G), spec.md §4.G / §7.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("request shape is invalid: {reason}")]
    BadRequest { reason: String },
    #[error("request was terminated early before storage work began")]
    EarlyTermination,
    #[error(transparent)]
    Chunk(#[from] ChunkError),
    #[error(transparent)]
    Compute(#[from] ComputeError),
}

/// Errors from the chunk assembler (component H), spec.md §4.H.
#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("storage engine read failed")]
    StorageRead(#[source] anyhow::Error),
    #[error("value or manifest record missing for the requested key")]
    Missing,
    #[error("chunk {index} of {total} missing from manifest")]
    MissingChunk { index: usize, total: usize },
    #[error("failed to decode manifest or reassembled value")]
    Decode(#[source] anyhow::Error),
}

/// Errors from the compute evaluator (component I), spec.md §4.I.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("unknown value schema id {schema_id}")]
    UnknownValueSchema { schema_id: u32 },
    #[error("result schema does not align with value schema and operations")]
    InvalidResultSchema { reason: String },
    #[error("input field {field} not found on value record")]
    MissingInputField { field: String },
    #[error(transparent)]
    Chunk(#[from] ChunkError),
}

/// Top-level aggregation, used where a function can fail for more than one reason.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Cursor(#[from] CursorError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Handler(#[from] HandlerError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Read(#[from] ReadError),
}
