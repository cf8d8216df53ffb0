//! Content-addressed blob store (§4.8): `store(bytes) -> sha256`, `load(sha256) -> bytes | None`.

use async_trait::async_trait;
use dashmap::DashMap;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

use crate::error::{AceError, AceResult};
use crate::model::BlobHandle;

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn store(&self, bytes: Vec<u8>) -> AceResult<BlobHandle>;
    async fn load(&self, handle: &BlobHandle) -> AceResult<Option<Vec<u8>>>;
}

/// Disk-backed store, laid out under `ACE_STORAGE_ROOT` as
/// `<first-2-hex>/<sha256>` (§6) so no single directory accumulates an
/// unbounded number of entries.
pub struct DiskBlobStore {
    root: PathBuf,
}

impl DiskBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, handle: &BlobHandle) -> PathBuf {
        let (prefix, full) = handle.storage_subpath();
        self.root.join(prefix).join(full)
    }
}

#[async_trait]
impl BlobStore for DiskBlobStore {
    async fn store(&self, bytes: Vec<u8>) -> AceResult<BlobHandle> {
        let handle = BlobHandle::from_bytes(&bytes);
        let path = self.path_for(&handle);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AceError::unavailable(format!("could not create blob directory: {e}")))?;
        }
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| AceError::unavailable(format!("could not create blob file: {e}")))?;
        file.write_all(&bytes).await.map_err(|e| AceError::unavailable(format!("could not write blob: {e}")))?;
        Ok(handle)
    }

    async fn load(&self, handle: &BlobHandle) -> AceResult<Option<Vec<u8>>> {
        match tokio::fs::read(self.path_for(handle)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AceError::unavailable(format!("could not read blob: {e}"))),
        }
    }
}

/// In-process store for unit/integration tests that don't want filesystem
/// side effects.
#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: DashMap<BlobHandle, Vec<u8>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn store(&self, bytes: Vec<u8>) -> AceResult<BlobHandle> {
        let handle = BlobHandle::from_bytes(&bytes);
        self.blobs.insert(handle.clone(), bytes);
        Ok(handle)
    }

    async fn load(&self, handle: &BlobHandle) -> AceResult<Option<Vec<u8>>> {
        Ok(self.blobs.get(handle).map(|b| b.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_store_round_trips() {
        let store = InMemoryBlobStore::new();
        let handle = store.store(b"hello".to_vec()).await.unwrap();
        assert_eq!(store.load(&handle).await.unwrap(), Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn missing_blob_is_none_not_an_error() {
        let store = InMemoryBlobStore::new();
        let handle = BlobHandle::from_bytes(b"never stored");
        assert_eq!(store.load(&handle).await.unwrap(), None);
    }

    #[tokio::test]
    async fn disk_store_lays_out_by_hex_prefix() {
        let dir = std::env::temp_dir().join(format!("ace-core-blob-test-{}", uuid::Uuid::new_v4()));
        let store = DiskBlobStore::new(&dir);
        let handle = store.store(b"hello".to_vec()).await.unwrap();
        let (prefix, full) = handle.storage_subpath();
        assert!(dir.join(&prefix).join(&full).exists());
        assert_eq!(store.load(&handle).await.unwrap(), Some(b"hello".to_vec()));
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
