use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CacheError, CacheStorage, Snapshot};

type Store = BTreeMap<String, Snapshot>;

/// In-process storage. Contents live as long as the value.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    stores: RwLock<BTreeMap<String, Store>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn store_names(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.stores.read().await.keys().cloned().collect())
    }

    async fn open(&self, store: &str) -> Result<(), CacheError> {
        self.stores.write().await.entry(store.to_string()).or_default();
        Ok(())
    }

    async fn delete_store(&self, store: &str) -> Result<bool, CacheError> {
        Ok(self.stores.write().await.remove(store).is_some())
    }

    async fn get(&self, store: &str, key: &str) -> Result<Option<Snapshot>, CacheError> {
        Ok(self
            .stores
            .read()
            .await
            .get(store)
            .and_then(|s| s.get(key))
            .cloned())
    }

    async fn put(&self, store: &str, key: &str, snapshot: Snapshot) -> Result<(), CacheError> {
        self.stores
            .write()
            .await
            .entry(store.to_string())
            .or_default()
            .insert(key.to_string(), snapshot);
        Ok(())
    }

    async fn delete(&self, store: &str, key: &str) -> Result<bool, CacheError> {
        Ok(self
            .stores
            .write()
            .await
            .get_mut(store)
            .map(|s| s.remove(key).is_some())
            .unwrap_or(false))
    }

    async fn keys(&self, store: &str) -> Result<Vec<String>, CacheError> {
        Ok(self
            .stores
            .read()
            .await
            .get(store)
            .map(|s| s.keys().cloned().collect())
            .unwrap_or_default())
    }
}
