//! Directory-backed artifact cache.

use std::path::{Component, Path, PathBuf};

use super::ArtifactCache;

/// Cache storing each key as a file below a root directory.
///
/// Keys may carry a `scheme://` prefix, which is ignored. The remainder must
/// be a relative path that stays inside the root.
#[derive(Debug, Clone)]
pub struct FsCache {
    root: PathBuf,
}

impl FsCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path backing a key
    pub fn key_path(&self, key: &str) -> crate::Result<PathBuf> {
        let relative = key.split_once("://").map_or(key, |(_, rest)| rest);
        let path = Path::new(relative);

        let escapes = path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if relative.is_empty() || escapes {
            return Err(crate::GraphModelError::Validation(format!(
                "cache key '{}' does not name a path inside the cache",
                key
            )));
        }

        Ok(self.root.join(path))
    }

    /// Write bytes under a key, creating parent directories as needed
    pub async fn put(&self, key: &str, bytes: &[u8]) -> crate::Result<()> {
        let path = self.key_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok(())
    }
}

impl ArtifactCache for FsCache {
    async fn get(&self, key: &str) -> crate::Result<Option<Vec<u8>>> {
        let path = self.key_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
