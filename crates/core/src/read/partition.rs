//! Partition resolver (component J), spec.md §4.J.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// Maps a key to a sub-partition index within `[0, amplification_factor)`.
/// Implementations are looked up by name from `PartitionerRegistry`.
pub trait Partitioner: Send + Sync {
    fn partition(&self, key: &[u8], amplification_factor: u32) -> u32;
}

/// The corpus-standard fallback: a CRC32C hash of the key, reduced mod the
/// amplification factor. Used whenever a store has no partitioner
/// configured, or its configuration fails to resolve.
pub struct Crc32cPartitioner;

impl Partitioner for Crc32cPartitioner {
    fn partition(&self, key: &[u8], amplification_factor: u32) -> u32 {
        if amplification_factor <= 1 {
            return 0;
        }
        crc32c::crc32c(key) % amplification_factor
    }
}

#[derive(Debug, Clone)]
pub struct PartitionerConfig {
    pub amplification_factor: u32,
    pub partitioner_class: String,
}

impl Default for PartitionerConfig {
    fn default() -> Self {
        Self {
            amplification_factor: 1,
            partitioner_class: "crc32c".to_owned(),
        }
    }
}

/// Resolves `(userPartition, key)` to a sub-partition, spec.md §4.J.
/// Partitioner instances are cached per resource name; a cache miss
/// instantiates the configured class, falling back to the default
/// (amplification_factor = 1) if the config is missing or names an unknown
/// class.
pub struct PartitionResolver {
    configs: Mutex<HashMap<String, PartitionerConfig>>,
    cache: Mutex<HashMap<String, Arc<dyn Partitioner>>>,
}

impl Default for PartitionResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl PartitionResolver {
    pub fn new() -> Self {
        Self {
            configs: Mutex::new(HashMap::new()),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_config(&self, resource: impl Into<String>, config: PartitionerConfig) {
        let resource = resource.into();
        self.configs.lock().insert(resource.clone(), config);
        self.cache.lock().remove(&resource);
    }

    fn partitioner_for(&self, resource: &str) -> (Arc<dyn Partitioner>, u32) {
        let config = self.configs.lock().get(resource).cloned().unwrap_or_default();
        let mut cache = self.cache.lock();
        let partitioner = cache
            .entry(resource.to_owned())
            .or_insert_with(|| instantiate(&config.partitioner_class))
            .clone();
        (partitioner, config.amplification_factor)
    }

    /// spec.md §4.J: if `amplification_factor == 1`, `user_partition` is the
    /// sub-partition; otherwise `user_partition * amplification_factor +
    /// partitioner(key) mod amplification_factor`.
    pub fn resolve(&self, resource: &str, user_partition: u32, key: &[u8]) -> u32 {
        let (partitioner, amplification_factor) = self.partitioner_for(resource);
        if amplification_factor <= 1 {
            return user_partition;
        }
        let offset = partitioner.partition(key, amplification_factor) % amplification_factor;
        user_partition * amplification_factor + offset
    }
}

fn instantiate(class: &str) -> Arc<dyn Partitioner> {
    match class {
        "crc32c" => Arc::new(Crc32cPartitioner),
        _ => Arc::new(Crc32cPartitioner),
    }
}
