//! Disk-backed cache storage.
//!
//! Layout:
//!
//! ```text
//! <root>/
//!   somasave-api-v2/
//!     9f86d081884c7d65.json   # {"key": "...", "snapshot": {...}}
//!   somasave-static-v2/
//!     ...
//! ```
//!
//! File names are a hash of the key; the key itself is stored in the file
//! and checked on read.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};

use super::{CacheError, CacheStorage, Snapshot};

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    key: String,
    snapshot: Snapshot,
}

pub struct DiskStorage {
    root: PathBuf,
}

/// FNV-1a, 64 bit. Stable across builds, unlike `DefaultHasher`.
fn entry_file_name(key: &str) -> String {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in key.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    format!("{:016x}.json", hash)
}

/// Distinguishes temp files of writes in flight, including writes to the
/// same key.
static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

fn temp_file_name(file_name: &str) -> String {
    let seq = WRITE_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{}.{}-{}.tmp", file_name, std::process::id(), seq)
}

/// Store names become directory names; anything path-like is refused.
fn is_safe_store_name(store: &str) -> bool {
    !store.is_empty()
        && store
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && store != "."
        && store != ".."
}

impl DiskStorage {
    pub fn new(root: PathBuf) -> Result<Self, CacheError> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn store_dir(&self, store: &str) -> Result<PathBuf, CacheError> {
        if !is_safe_store_name(store) {
            return Err(CacheError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid store name: {:?}", store),
            )));
        }
        Ok(self.root.join(store))
    }

    fn entry_path(&self, store: &str, key: &str) -> Result<PathBuf, CacheError> {
        Ok(self.store_dir(store)?.join(entry_file_name(key)))
    }

    async fn read_entry(path: &Path) -> Result<Option<StoredEntry>, CacheError> {
        let contents = match fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| CacheError::Corrupt {
                path: path.display().to_string(),
                source,
            })
    }
}

#[async_trait]
impl CacheStorage for DiskStorage {
    async fn store_names(&self) -> Result<Vec<String>, CacheError> {
        let mut names = Vec::new();
        let mut dir = fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn open(&self, store: &str) -> Result<(), CacheError> {
        fs::create_dir_all(self.store_dir(store)?).await?;
        Ok(())
    }

    async fn delete_store(&self, store: &str) -> Result<bool, CacheError> {
        let dir = self.store_dir(store)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, store: &str, key: &str) -> Result<Option<Snapshot>, CacheError> {
        let path = self.entry_path(store, key)?;
        match Self::read_entry(&path).await? {
            Some(entry) if entry.key == key => Ok(Some(entry.snapshot)),
            Some(entry) => {
                debug!(wanted = key, found = %entry.key, "Cache file name collision, treating as miss");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, store: &str, key: &str, snapshot: Snapshot) -> Result<(), CacheError> {
        let dir = self.store_dir(store)?;
        fs::create_dir_all(&dir).await?;
        let entry = StoredEntry {
            key: key.to_string(),
            snapshot,
        };
        let contents = serde_json::to_string(&entry).map_err(CacheError::Encode)?;
        // Each write gets its own temp file; the rename is atomic, so the
        // last rename wins and readers only see whole entries.
        let file_name = entry_file_name(key);
        let path = dir.join(&file_name);
        let tmp = dir.join(temp_file_name(&file_name));
        let written = match fs::write(&tmp, contents).await {
            Ok(()) => fs::rename(&tmp, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(&tmp).await {
                debug!(path = %tmp.display(), error = %cleanup, "Temp cache file not removed");
            }
            return Err(e.into());
        }
        Ok(())
    }

    async fn delete(&self, store: &str, key: &str) -> Result<bool, CacheError> {
        let path = self.entry_path(store, key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn keys(&self, store: &str) -> Result<Vec<String>, CacheError> {
        let dir = self.store_dir(store)?;
        let mut reader = match fs::read_dir(&dir).await {
            Ok(r) => r,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_entry(&path).await {
                Ok(Some(stored)) => keys.push(stored.key),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable cache entry"),
            }
        }
        keys.sort();
        Ok(keys)
    }
}
