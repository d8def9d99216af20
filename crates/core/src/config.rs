//! Typed configuration, loaded from `config.toml` plus environment overrides.
//!
//! Grounded on the teacher's `SpacetimeDbFiles`/file-backed config-reading
//! pattern: a small `toml`-deserialized struct, with a thin loader that
//! tolerates the file being absent (falling back to defaults) and errors
//! loudly if it's present-but-malformed.

use std::path::Path;

use serde::Deserialize;
use tracing_subscriber::filter::LevelFilter;

use crate::error::ConfigError;

/// Top-level config file shape. Mirrors the ambient sections named in
/// `SPEC_FULL.md` §2 (L. Configuration): cluster identity, admin-loop
/// tuning, read-path pool sizing, and logging.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub cluster: ClusterConfig,
    pub admin: AdminConfig,
    pub read: ReadConfig,
    pub logs: LogConfig,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            cluster: ClusterConfig::default(),
            admin: AdminConfig::default(),
            read: ReadConfig::default(),
            logs: LogConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub id: String,
    /// Topic of the admin log partition this cluster's controller consumes.
    pub admin_topic: String,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            id: "default".to_owned(),
            admin_topic: "admin-log".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Delay between outer-loop ticks (`READ_CYCLE_DELAY` in spec.md §5).
    pub cycle_delay_ms: u64,
    /// `processingCycleTimeoutInMs` in spec.md §4.D.
    pub cycle_timeout_ms: u64,
    /// Bound on the per-store execution worker pool, spec.md §5.
    pub max_workers: usize,
    /// Replication factor used when this controller creates the admin topic.
    pub topic_replication_factor: u32,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            cycle_delay_ms: 1_000,
            cycle_timeout_ms: 30_000,
            max_workers: 16,
            topic_replication_factor: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ReadConfig {
    /// Worker pool size for point/batch get requests.
    pub get_pool_size: usize,
    /// Worker pool size for compute requests.
    pub compute_pool_size: usize,
    /// Key count per sub-task when a batch-get request is split.
    pub parallel_chunk_size: usize,
    /// Capacity of each worker's result/value prototype LRU (spec.md §4.K).
    pub prototype_cache_capacity: usize,
}

impl Default for ReadConfig {
    fn default() -> Self {
        Self {
            get_pool_size: 32,
            compute_pool_size: 16,
            parallel_chunk_size: 64,
            prototype_cache_capacity: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    #[serde(with = "level_filter_serde")]
    pub level: LevelFilter,
    pub directives: Vec<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            directives: Vec::new(),
        }
    }
}

mod level_filter_serde {
    use serde::{Deserialize, Deserializer};
    use tracing_subscriber::filter::LevelFilter;

    pub fn deserialize<'de, D>(de: D) -> Result<LevelFilter, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(de)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl ConfigFile {
    /// Reads and parses `path`. Returns `Ok(None)` if the file does not
    /// exist (callers should then use `ConfigFile::default()`).
    pub fn read(path: &Path) -> Result<Option<Self>, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                let parsed = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                    path: path.to_owned(),
                    source,
                })?;
                Ok(Some(parsed))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ConfigError::Io {
                path: path.to_owned(),
                source,
            }),
        }
    }

    /// Loads from `path`, falling back to defaults if absent.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        Ok(Self::read(path)?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_none() {
        let result = ConfigFile::read(Path::new("/nonexistent/path/config.toml")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[cluster]\nid = \"prod-1\"\n").unwrap();
        let conf = ConfigFile::read(&path).unwrap().unwrap();
        assert_eq!(conf.cluster.id, "prod-1");
        assert_eq!(conf.admin.max_workers, AdminConfig::default().max_workers);
    }
}
