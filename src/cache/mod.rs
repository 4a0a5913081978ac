//! Artifact acquisition from a local key/value cache.
//!
//! This module provides:
//! - `ArtifactCache`: async byte lookup by opaque key
//! - `MemoryCache` / `FsCache`: in-process and directory-backed caches
//! - `ArtifactSource`: anything able to produce a `ModelArtifactBundle`
//! - `CacheArtifactLoader`: the source reading a topology key and a weights key

mod fs;
mod loader;

pub use fs::FsCache;
pub use loader::{ArtifactSource, CacheArtifactLoader};

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::RwLock;

/// Local byte-oriented key/value store
pub trait ArtifactCache: Send + Sync {
    /// Bytes stored under `key`, `None` if nothing was stored
    fn get(&self, key: &str) -> impl Future<Output = crate::Result<Option<Vec<u8>>>> + Send;
}

/// In-memory cache. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store bytes under a key, returning the previous value
    pub async fn insert(&self, key: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Option<Vec<u8>> {
        self.entries.write().await.insert(key.into(), bytes.into())
    }

    pub async fn remove(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.write().await.remove(key)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl ArtifactCache for MemoryCache {
    async fn get(&self, key: &str) -> crate::Result<Option<Vec<u8>>> {
        Ok(self.entries.read().await.get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_cache_shares_storage() {
        let cache = MemoryCache::new();
        let other = cache.clone();

        assert!(cache.insert("model.json", b"{}".to_vec()).await.is_none());
        assert_eq!(other.get("model.json").await.unwrap().as_deref(), Some(&b"{}"[..]));
        assert_eq!(other.len().await, 1);

        assert!(other.remove("model.json").await.is_some());
        assert!(cache.get("model.json").await.unwrap().is_none());
        assert!(cache.is_empty().await);
    }
}
