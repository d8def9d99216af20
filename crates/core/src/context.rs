//! Lightweight identifiers and per-request context threaded through both the
//! admin and read paths, generalized from the teacher's `ExecutionContext`
//! (reducer/sql/internal) to this system's own request kinds.

use std::fmt;
use std::sync::Arc;

use derive_more::Display;

/// The cluster a piece of admin or read state belongs to.
///
/// A newtype rather than a bare `String` so that progress-map keys, metric
/// label values, and log-transport topic derivation cannot be accidentally
/// crossed with an arbitrary string at a call site.
#[derive(Clone, Debug, Display, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterId(Arc<str>);

impl ClusterId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ClusterId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ClusterId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// The name of a store (a versioned key-value resource), derived from admin
/// operations per the tag-driven rule in `AdminOperation`, or supplied
/// directly by a read request.
#[derive(Clone, Debug, Display, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreName(Arc<str>);

impl StoreName {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StoreName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StoreName {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// A parsed `<store>_v<n>` storage version identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StorageVersionId {
    pub store: StoreName,
    pub version: u32,
}

impl StorageVersionId {
    /// Parses `<store>_v<n>`. Used both to derive a store name from the
    /// `KILL_OFFLINE_PUSH` topic and to name storage-engine resources on
    /// the read path.
    pub fn parse(topic: &str) -> Option<Self> {
        let (store, version) = topic.rsplit_once("_v")?;
        if store.is_empty() {
            return None;
        }
        let version: u32 = version.parse().ok()?;
        Some(Self {
            store: StoreName::new(store.to_owned()),
            version,
        })
    }
}

impl fmt::Display for StorageVersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_v{}", self.store, self.version)
    }
}

/// Classifies a unit of work on the read path, generalizing the teacher's
/// `TransactionType` (Reducer/Sql/Internal) to this system's request kinds.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum RequestKind {
    PointGet,
    BatchGet,
    Compute,
    HealthCheck,
    DictionaryFetch,
    Admin,
}

/// Context carried through a single read-path request, used for logging and
/// metric labeling. Cheap to clone: every field is a small id or enum.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub cluster: ClusterId,
    pub store: Option<StoreName>,
    pub kind: RequestKind,
}

impl RequestContext {
    pub fn new(cluster: ClusterId, store: Option<StoreName>, kind: RequestKind) -> Self {
        Self { cluster, store, kind }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_store_version_id() {
        let id = StorageVersionId::parse("my_store_v3").unwrap();
        assert_eq!(id.store.as_str(), "my_store");
        assert_eq!(id.version, 3);
        assert_eq!(id.to_string(), "my_store_v3");
    }

    #[test]
    fn rejects_missing_version() {
        assert!(StorageVersionId::parse("my_store").is_none());
    }

    #[test]
    fn rejects_empty_store() {
        assert!(StorageVersionId::parse("_v3").is_none());
    }
}
