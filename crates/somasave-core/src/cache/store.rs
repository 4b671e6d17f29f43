use async_trait::async_trait;
use thiserror::Error;

use super::Snapshot;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt cache entry {path}: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode cache entry: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Named key-value stores of response snapshots.
///
/// Writing to a store that does not exist yet creates it. There is no
/// locking across entries; concurrent writes to one key leave whichever
/// landed last.
#[async_trait]
pub trait CacheStorage: Send + Sync + 'static {
    /// Names of every store currently present, in any generation.
    async fn store_names(&self) -> Result<Vec<String>, CacheError>;

    /// Create an empty store if it does not exist.
    async fn open(&self, store: &str) -> Result<(), CacheError>;

    /// Drop a whole store. Returns whether it existed.
    async fn delete_store(&self, store: &str) -> Result<bool, CacheError>;

    async fn get(&self, store: &str, key: &str) -> Result<Option<Snapshot>, CacheError>;

    async fn put(&self, store: &str, key: &str, snapshot: Snapshot) -> Result<(), CacheError>;

    async fn delete(&self, store: &str, key: &str) -> Result<bool, CacheError>;

    async fn keys(&self, store: &str) -> Result<Vec<String>, CacheError>;
}
