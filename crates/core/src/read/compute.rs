//! Compute evaluator (component I), spec.md §4.I: fetches a value record,
//! decodes it against its value schema, and evaluates a small pipeline of
//! vector operations into a result record.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value as Json;

use crate::error::{ChunkError, ComputeError};
use crate::external::schema_registry::{FieldKind, ValueSchema};
use crate::read::chunk::{ByteRecordAdapter, ChunkAssembler};
use crate::read::messages::{ComputeOp, KeyedValue};
use crate::read::object_cache::WorkerObjectCache;

/// A single decoded field value, enough to evaluate the operators in
/// `ComputeOp`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    F32Vector(Vec<f32>),
    I64(i64),
    F64(f64),
    Bytes(Vec<u8>),
    String(String),
}

pub type DecodedRecord = HashMap<String, FieldValue>;

/// Decodes a JSON-encoded record (the storage layer's wire format for
/// computed stores) against its schema, producing only the fields the
/// schema declares.
pub fn decode_record(bytes: &[u8], schema: &ValueSchema) -> Result<DecodedRecord, ComputeError> {
    let json: Json = serde_json::from_slice(bytes).map_err(|e| ComputeError::Chunk(ChunkError::Decode(e.into())))?;
    let Json::Object(map) = json else {
        return Err(ComputeError::Chunk(ChunkError::Decode(anyhow::anyhow!("record is not a JSON object"))));
    };

    let mut out = DecodedRecord::with_capacity(schema.fields.len());
    for field in &schema.fields {
        let Some(raw) = map.get(&field.name) else {
            if field.nullable {
                continue;
            }
            return Err(ComputeError::MissingInputField { field: field.name.clone() });
        };
        let value = match field.kind {
            FieldKind::F32Vector => FieldValue::F32Vector(
                raw.as_array()
                    .ok_or_else(|| ChunkError::Decode(anyhow::anyhow!("field {} is not an array", field.name)))?
                    .iter()
                    .map(|v| v.as_f64().unwrap_or_default() as f32)
                    .collect(),
            ),
            FieldKind::I64 => FieldValue::I64(raw.as_i64().unwrap_or_default()),
            FieldKind::F64 => FieldValue::F64(raw.as_f64().unwrap_or_default()),
            FieldKind::Bytes => FieldValue::Bytes(raw.as_str().unwrap_or_default().as_bytes().to_vec()),
            FieldKind::String => FieldValue::String(raw.as_str().unwrap_or_default().to_owned()),
        };
        out.insert(field.name.clone(), value);
    }
    Ok(out)
}

/// Reserved result-record field that collects per-field evaluation errors,
/// spec.md §4.I step 4-5.
const COMPUTATION_ERROR_MAP_FIELD: &str = "computationErrorMap";

fn field_value_to_json(value: &FieldValue) -> Json {
    match value {
        FieldValue::F32Vector(v) => Json::from(v.iter().map(|f| *f as f64).collect::<Vec<_>>()),
        FieldValue::I64(i) => Json::from(*i),
        FieldValue::F64(f) => Json::from(*f),
        FieldValue::Bytes(b) => Json::from(String::from_utf8_lossy(b).into_owned()),
        FieldValue::String(s) => Json::from(s.clone()),
    }
}

fn default_result_for(op: &ComputeOp) -> Json {
    match op {
        ComputeOp::DotProduct { .. } | ComputeOp::CosineSimilarity { .. } => Json::from(0.0),
        ComputeOp::HadamardProduct { .. } => Json::from(Vec::<f32>::new()),
        ComputeOp::Count { .. } => Json::from(0i64),
    }
}

/// A pipeline that has already been checked against its value schema: every
/// operation's input field exists and has the kind the operator requires,
/// and no two operations write the same result field. Cached by a key
/// derived from `(store, value_schema_id, result_schema name)` so repeat
/// requests for the same pipeline shape skip re-validation.
pub struct ValidatedPipeline {
    operations: Vec<ComputeOp>,
    /// Declared result-schema field names, standing in for the value
    /// schema's own fields extended with the operations' result fields
    /// (spec.md §4.I step 5: "result schemas are extensions of the value
    /// schema plus computed fields plus the error map").
    result_fields: Vec<String>,
}

impl ValidatedPipeline {
    fn validate(schema: &ValueSchema, operations: Vec<ComputeOp>) -> Result<Self, ComputeError> {
        let mut seen_result_fields = std::collections::HashSet::new();
        for op in &operations {
            let field = schema.field(op.input_field()).ok_or_else(|| ComputeError::MissingInputField {
                field: op.input_field().to_owned(),
            })?;
            let requires_vector = !matches!(op, ComputeOp::Count { .. });
            if requires_vector && field.kind != FieldKind::F32Vector {
                return Err(ComputeError::InvalidResultSchema {
                    reason: format!("operation {} requires a vector field, got {:?}", op.name(), field.kind),
                });
            }
            if !seen_result_fields.insert(op.result_field().to_owned()) {
                return Err(ComputeError::InvalidResultSchema {
                    reason: format!("duplicate result field {}", op.result_field()),
                });
            }
        }
        let mut result_fields: Vec<String> = schema.fields.iter().map(|f| f.name.clone()).collect();
        for op in &operations {
            if !result_fields.contains(&op.result_field().to_owned()) {
                result_fields.push(op.result_field().to_owned());
            }
        }
        Ok(Self { operations, result_fields })
    }

    /// Runs every operation, pre-populating the result record from the
    /// declared result schema and projecting through any value-schema field
    /// that is neither the target of an operation nor the reserved error-map
    /// field. A nullable-and-null input field degrades that single
    /// operation into a per-field entry in `computationErrorMap` rather than
    /// failing the whole record (spec.md §4.I steps 3-5).
    fn evaluate(&self, record: &DecodedRecord) -> Result<HashMap<String, Json>, ComputeError> {
        let mut result: HashMap<String, Json> = HashMap::with_capacity(self.result_fields.len());
        let mut error_map: HashMap<String, String> = HashMap::new();
        let mut touched = std::collections::HashSet::new();

        for op in &self.operations {
            touched.insert(op.result_field().to_owned());
            let field = op.input_field();
            let Some(value) = record.get(field) else {
                error_map.insert(field.to_owned(), "nullable input field was null".to_owned());
                result.insert(op.result_field().to_owned(), default_result_for(op));
                continue;
            };
            let computed = match (op, value) {
                (ComputeOp::DotProduct { with, .. }, FieldValue::F32Vector(v)) => Json::from(dot(v, with)),
                (ComputeOp::CosineSimilarity { with, .. }, FieldValue::F32Vector(v)) => Json::from(cosine_similarity(v, with)),
                (ComputeOp::HadamardProduct { with, .. }, FieldValue::F32Vector(v)) => Json::from(hadamard(v, with)),
                (ComputeOp::Count { .. }, FieldValue::F32Vector(v)) => Json::from(v.len() as i64),
                (ComputeOp::Count { .. }, _) => Json::from(0i64),
                _ => {
                    return Err(ComputeError::InvalidResultSchema {
                        reason: format!("field {field} is not a vector"),
                    })
                }
            };
            result.insert(op.result_field().to_owned(), computed);
        }

        for field in &self.result_fields {
            if field == COMPUTATION_ERROR_MAP_FIELD || touched.contains(field) {
                continue;
            }
            let projected = record.get(field).map(field_value_to_json).unwrap_or(Json::Null);
            result.insert(field.clone(), projected);
        }

        if !error_map.is_empty() {
            result.insert(
                COMPUTATION_ERROR_MAP_FIELD.to_owned(),
                serde_json::to_value(&error_map).expect("string map always serializes"),
            );
        }

        Ok(result)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (*x as f64) * (*y as f64)).sum()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let num = dot(a, b);
    let norm_a = dot(a, a).sqrt();
    let norm_b = dot(b, b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    num / (norm_a * norm_b)
}

fn hadamard(a: &[f32], b: &[f32]) -> Vec<f32> {
    a.iter().zip(b).map(|(x, y)| x * y).collect()
}

pub struct ComputeEvaluator<'a> {
    chunk_assembler: ChunkAssembler<'a>,
}

impl<'a> ComputeEvaluator<'a> {
    pub fn new(storage: &'a dyn crate::external::StorageEngine) -> Self {
        Self { chunk_assembler: ChunkAssembler::new(storage) }
    }

    fn pipeline_for(
        cache: &mut WorkerObjectCache,
        cache_key: &str,
        schema: &ValueSchema,
        operations: &[ComputeOp],
    ) -> Result<Arc<ValidatedPipeline>, ComputeError> {
        if let Some(pipeline) = cache.pipeline(cache_key) {
            return Ok(pipeline);
        }
        let pipeline = Arc::new(ValidatedPipeline::validate(schema, operations.to_vec())?);
        cache.put_pipeline(cache_key, pipeline.clone());
        Ok(pipeline)
    }

    /// Evaluates one key: reassembles the value record (chunked or not),
    /// decodes it, and runs the validated pipeline. `None` means the key
    /// was not found; callers decide whether that's an error (batch mode)
    /// or a sentinel (streaming mode). The validated pipeline is drawn from
    /// `cache`, a per-worker object cache checked out from the dispatcher's
    /// pool for the lifetime of the dispatched task (spec.md §4.K), so a
    /// repeat pipeline shape across requests handled by the same worker slot
    /// skips re-validation.
    pub async fn evaluate_one(
        &self,
        cache_key: &str,
        partition: u32,
        key: &[u8],
        key_index: i64,
        value_schema: &ValueSchema,
        operations: &[ComputeOp],
        chunked: bool,
        cache: &mut WorkerObjectCache,
    ) -> Result<KeyedValue, ComputeError> {
        let pipeline = Self::pipeline_for(cache, cache_key, value_schema, operations)?;

        let raw = self
            .chunk_assembler
            .get(&ByteRecordAdapter, partition, key, value_schema.schema_id, chunked)
            .await?;
        let Some(bytes) = raw else {
            return Ok(KeyedValue { key_index, value: None });
        };

        let record = decode_record(&bytes, value_schema)?;
        let result = pipeline.evaluate(&record)?;
        let encoded = serde_json::to_vec(&result).map_err(|e| ComputeError::Chunk(ChunkError::Decode(e.into())))?;
        Ok(KeyedValue { key_index, value: Some(encoded) })
    }
}
