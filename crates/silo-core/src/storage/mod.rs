//! Storage backend abstraction for object storage (S3, local, in-memory).
//!
//! This module defines the object-store contract the pipeline consumes:
//! prefix listing with transparent pagination, whole-object get/put, batched
//! delete, and a reachability check. Backends are constructed explicitly per
//! pipeline invocation and passed down; there is no process-wide cached
//! client.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{Error, Result};

mod s3;

pub use s3::{S3Backend, S3Options};

/// Metadata about a stored object, as returned by listing.
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    /// Object key.
    pub key: String,
    /// Object size in bytes.
    pub size: u64,
    /// Last modification timestamp.
    pub last_modified: Option<DateTime<Utc>>,
}

/// Object storage contract consumed by the pipeline.
///
/// All backends (S3, memory) implement this trait. Handles are immutable
/// and cheap to share; concurrent extraction tasks each own a clone of the
/// `Arc` wrapping the backend.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Reads an entire object into memory.
    ///
    /// Returns `Error::NotFound` if the object doesn't exist.
    async fn get(&self, key: &str) -> Result<Bytes>;

    /// Writes an object unconditionally.
    ///
    /// `content_type` is attached when the backend supports it.
    async fn put(&self, key: &str, data: Bytes, content_type: Option<&str>) -> Result<()>;

    /// Lists all objects under the given prefix, paginating transparently.
    ///
    /// Returns an empty vec if no objects match. **Ordering**: results are
    /// returned in backend listing order, which carries no semantic meaning.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>>;

    /// Deletes a batch of objects in one request.
    ///
    /// Callers are responsible for chunking to the backend's batch limit.
    /// Succeeds even if some objects don't exist (idempotent).
    async fn delete_many(&self, keys: &[String]) -> Result<()>;

    /// Checks that the backing store is reachable.
    ///
    /// Called once at construction time, before any pipeline run touches
    /// the store.
    async fn check_reachable(&self) -> Result<()>;
}

/// In-memory storage backend for testing.
///
/// Thread-safe via `RwLock`. Not suitable for production.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    last_modified: DateTime<Utc>,
}

impl MemoryBackend {
    /// Creates a new empty memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored objects (test helper).
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns true if the backend holds no objects (test helper).
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Bytes> {
        let objects = self.objects.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        objects
            .get(key)
            .map(|o| o.data.clone())
            .ok_or_else(|| Error::NotFound(format!("object not found: {key}")))
    }

    async fn put(&self, key: &str, data: Bytes, _content_type: Option<&str>) -> Result<()> {
        let mut objects = self.objects.write().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        objects.insert(
            key.to_string(),
            StoredObject {
                data,
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let objects = self.objects.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        Ok(objects
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(key, obj)| ObjectMeta {
                key: key.clone(),
                size: obj.data.len() as u64,
                last_modified: Some(obj.last_modified),
            })
            .collect())
    }

    async fn delete_many(&self, keys: &[String]) -> Result<()> {
        let mut objects = self.objects.write().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        for key in keys {
            objects.remove(key);
        }
        Ok(())
    }

    async fn check_reachable(&self) -> Result<()> {
        Ok(())
    }
}
