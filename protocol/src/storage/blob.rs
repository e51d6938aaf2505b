//! # Blob Store Interface
//!
//! The privacy layer's only view of persistence: flat string keys mapped
//! to opaque byte blobs, with prefix enumeration. The production driver
//! (durable object storage) lives outside this crate; everything here is
//! written against [`BlobStore`] so backends swap without touching the
//! adapter.
//!
//! Two implementations ship in-crate:
//!
//! - [`MemoryBlobStore`] — a `BTreeMap` behind an async `RwLock`. Tests
//!   and ephemeral nodes.
//! - [`SledBlobStore`] — a sled tree. Durable single-node deployments.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors surfaced by a blob backend.
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<sled::Error> for BlobError {
    fn from(e: sled::Error) -> Self {
        BlobError::Backend(e.to_string())
    }
}

/// A flat namespaced blob store.
///
/// Every method is an awaitable I/O boundary. Keys are UTF-8 strings;
/// values are opaque bytes (the adapter stores canonical JSON).
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write a blob, overwriting any existing value.
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), BlobError>;

    /// Read a blob. `None` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BlobError>;

    /// Existence check without fetching the value.
    async fn head(&self, key: &str) -> Result<bool, BlobError>;

    /// Delete a blob. Deleting an absent key is a no-op.
    async fn delete(&self, key: &str) -> Result<(), BlobError>;

    /// List all keys with the given prefix, in lexicographic order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, BlobError>;
}

// ---------------------------------------------------------------------------
// MemoryBlobStore
// ---------------------------------------------------------------------------

/// An in-memory blob store over a sorted map.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects. Test helper.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Whether the store holds no objects.
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), BlobError> {
        self.objects.write().await.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BlobError> {
        Ok(self.objects.read().await.get(key).cloned())
    }

    async fn head(&self, key: &str) -> Result<bool, BlobError> {
        Ok(self.objects.read().await.contains_key(key))
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        self.objects.write().await.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, BlobError> {
        Ok(self
            .objects
            .read()
            .await
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

// ---------------------------------------------------------------------------
// SledBlobStore
// ---------------------------------------------------------------------------

/// A durable blob store over a sled database.
///
/// sled is thread-safe internally; the handle can be shared across tasks
/// without external synchronization. Writes flush before returning so a
/// completed `put` survives a crash.
#[derive(Debug, Clone)]
pub struct SledBlobStore {
    db: sled::Db,
}

impl SledBlobStore {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, BlobError> {
        Ok(Self {
            db: sled::open(path)?,
        })
    }

    /// Create a temporary database cleaned up on drop. Test helper.
    pub fn temporary() -> Result<Self, BlobError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }
}

#[async_trait]
impl BlobStore for SledBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), BlobError> {
        self.db.insert(key.as_bytes(), bytes)?;
        self.db.flush_async().await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BlobError> {
        Ok(self.db.get(key.as_bytes())?.map(|v| v.to_vec()))
    }

    async fn head(&self, key: &str) -> Result<bool, BlobError> {
        Ok(self.db.contains_key(key.as_bytes())?)
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        self.db.remove(key.as_bytes())?;
        self.db.flush_async().await?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, BlobError> {
        let mut keys = Vec::new();
        for entry in self.db.scan_prefix(prefix.as_bytes()) {
            let (key, _) = entry?;
            keys.push(String::from_utf8_lossy(&key).into_owned());
        }
        Ok(keys)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    async fn exercise(store: &dyn BlobStore) {
        // Put / get / head.
        store.put("ns/a.json", b"alpha".to_vec()).await.unwrap();
        store.put("ns/b.json", b"beta".to_vec()).await.unwrap();
        store.put("other/c.json", b"gamma".to_vec()).await.unwrap();

        assert_eq!(store.get("ns/a.json").await.unwrap().unwrap(), b"alpha");
        assert!(store.head("ns/b.json").await.unwrap());
        assert!(!store.head("ns/missing.json").await.unwrap());
        assert!(store.get("ns/missing.json").await.unwrap().is_none());

        // Prefix listing is scoped and ordered.
        let keys = store.list("ns/").await.unwrap();
        assert_eq!(keys, vec!["ns/a.json".to_string(), "ns/b.json".to_string()]);

        // Overwrite.
        store.put("ns/a.json", b"alpha2".to_vec()).await.unwrap();
        assert_eq!(store.get("ns/a.json").await.unwrap().unwrap(), b"alpha2");

        // Delete is idempotent.
        store.delete("ns/a.json").await.unwrap();
        store.delete("ns/a.json").await.unwrap();
        assert!(!store.head("ns/a.json").await.unwrap());
    }

    #[tokio::test]
    async fn memory_store_contract() {
        let store = MemoryBlobStore::new();
        exercise(&store).await;
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn sled_store_contract() {
        let store = SledBlobStore::temporary().unwrap();
        exercise(&store).await;
    }

    #[tokio::test]
    async fn sled_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SledBlobStore::open(dir.path()).unwrap();
            store.put("k", b"v".to_vec()).await.unwrap();
        }
        let store = SledBlobStore::open(dir.path()).unwrap();
        assert_eq!(store.get("k").await.unwrap().unwrap(), b"v");
    }

    #[tokio::test]
    async fn empty_prefix_lists_everything() {
        let store = MemoryBlobStore::new();
        store.put("x", vec![1]).await.unwrap();
        store.put("y", vec![2]).await.unwrap();
        assert_eq!(store.list("").await.unwrap().len(), 2);
    }
}
