//! Property tests for the two pieces of this crate with the clearest
//! invariants to state generatively: DIV classification (component B) and
//! chunked-value reassembly (component H).

use std::collections::HashMap;

use proptest::collection::vec as pvec;
use proptest::prelude::*;

use vkv_core::admin::div::DivValidator;
use vkv_core::error::DivError;
use vkv_core::external::StorageEngine;
use vkv_core::read::chunk::{ByteRecordAdapter, ChunkAssembler, ChunkedValueManifest};

/// A strictly increasing run of execution ids, delivered with no gaps,
/// must always classify as Accepted and leave the baseline at the last id.
proptest! {
    #[test]
    fn consecutive_run_is_always_accepted(start in 1i64..1000, len in 1usize..200) {
        let mut div = DivValidator::new();
        let mut offset = 0u64;
        for execution_id in start..start + len as i64 {
            let outcome = div.check(execution_id, offset).unwrap();
            prop_assert_eq!(outcome, vkv_core::error::DivOutcome::Accepted);
            offset += 1;
        }
        prop_assert_eq!(div.last_delegated_execution_id(), Some(start + len as i64 - 1));
    }

    /// Re-delivering any prefix of an already-accepted run is always a
    /// duplicate, never a gap or an error.
    #[test]
    fn replaying_any_already_seen_id_is_duplicate(start in 1i64..1000, len in 2usize..200, replay_idx in 0usize..200) {
        let replay_idx = replay_idx % len;
        let mut div = DivValidator::new();
        for (i, execution_id) in (start..start + len as i64).enumerate() {
            div.check(execution_id, i as u64).unwrap();
        }
        let replayed_id = start + replay_idx as i64;
        let outcome = div.check(replayed_id, len as u64).unwrap();
        prop_assert_eq!(outcome, vkv_core::error::DivOutcome::Duplicate);
    }

    /// Any execution id more than one past the baseline is always a gap,
    /// and a gap never advances the baseline.
    #[test]
    fn jump_past_next_is_always_a_gap(start in 1i64..1000, jump in 2i64..500) {
        let mut div = DivValidator::new();
        div.check(start, 0).unwrap();
        let err = div.check(start + jump, 1).unwrap_err();
        prop_assert!(matches!(err, DivError::Gap { expected, incoming, .. } if expected == start + 1 && incoming == start + jump));
        prop_assert_eq!(div.last_delegated_execution_id(), Some(start));
    }
}

#[derive(Default)]
struct FakeStorage {
    records: parking_lot::Mutex<HashMap<Vec<u8>, Vec<u8>>>,
}

#[async_trait::async_trait]
impl StorageEngine for FakeStorage {
    async fn get(&self, _partition: u32, key: &[u8]) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.records.lock().get(key).cloned())
    }
}

proptest! {
    /// Splitting an arbitrary payload into arbitrary-sized chunks and
    /// reassembling it through the manifest must always recover the
    /// original bytes, for any chunk count from 1 up to the payload length.
    #[test]
    fn arbitrary_payload_round_trips_through_chunk_assembler(
        payload in pvec(any::<u8>(), 0..4096),
        num_chunks in 1usize..17,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let storage = FakeStorage::default();
            let chunk_size = (payload.len() / num_chunks).max(1);
            let chunks: Vec<Vec<u8>> = if payload.is_empty() {
                vec![Vec::new()]
            } else {
                payload.chunks(chunk_size).map(|c| c.to_vec()).collect()
            };
            let chunk_keys: Vec<Vec<u8>> = (0..chunks.len()).map(|i| format!("chunk-{i}").into_bytes()).collect();
            let manifest = ChunkedValueManifest {
                chunk_keys: chunk_keys.clone(),
                total_size: payload.len(),
                schema_id: 3,
            };
            {
                let mut records = storage.records.lock();
                records.insert(b"manifest".to_vec(), serde_json::to_vec(&manifest).unwrap());
                for (key, bytes) in chunk_keys.iter().zip(chunks.iter()) {
                    records.insert(key.clone(), bytes.clone());
                }
            }

            let assembler = ChunkAssembler::new(&storage);
            let reassembled = assembler.get(&ByteRecordAdapter, 0, b"manifest", 3, true).await.unwrap().unwrap();
            prop_assert_eq!(reassembled, payload);
            Ok(())
        })?;
    }
}
