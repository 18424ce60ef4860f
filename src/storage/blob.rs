use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::error::{Error, Result};

/// Object storage for attachment bytes, addressed by relative path.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Stores `data` at `path`. Never overwrites an existing object.
    async fn put(&self, path: &str, data: Bytes) -> Result<()>;

    async fn get(&self, path: &str) -> Result<Bytes>;
}

/// Rejects absolute paths and `..` so objects stay under the storage root.
fn checked_relative(path: &str) -> Result<PathBuf> {
    let candidate = Path::new(path);
    let safe = !path.is_empty()
        && candidate
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if safe {
        Ok(candidate.to_path_buf())
    } else {
        Err(Error::Forbidden(format!("invalid storage path `{}`", path)))
    }
}

/// Stores objects as files below a root directory.
#[derive(Clone)]
pub struct LocalBlobStorage {
    root: PathBuf,
}

impl LocalBlobStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl BlobStorage for LocalBlobStorage {
    async fn put(&self, path: &str, data: Bytes) -> Result<()> {
        let full = self.root.join(checked_relative(path)?);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => {
                    Error::Storage(format!("object `{}` already exists", path))
                }
                _ => {
                    tracing::error!("Failed to create object {}: {}", path, e);
                    Error::Storage(format!("Failed to save file: {}", e))
                }
            })?;
        file.write_all(&data).await?;
        file.flush().await?;
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Bytes> {
        let full = self.root.join(checked_relative(path)?);
        match fs::read(&full).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("object `{}` not found", path)))
            }
            Err(e) => Err(Error::Io(e)),
        }
    }
}

/// Keeps objects in memory; for tests and demos.
#[derive(Default)]
pub struct MemoryBlobStorage {
    objects: RwLock<HashMap<String, Bytes>>,
}

impl MemoryBlobStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStorage for MemoryBlobStorage {
    async fn put(&self, path: &str, data: Bytes) -> Result<()> {
        checked_relative(path)?;
        let mut objects = self.objects.write().await;
        if objects.contains_key(path) {
            return Err(Error::Storage(format!("object `{}` already exists", path)));
        }
        objects.insert(path.to_string(), data);
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Bytes> {
        self.objects
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("object `{}` not found", path)))
    }
}
