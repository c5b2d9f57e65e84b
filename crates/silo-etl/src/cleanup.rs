//! Cleanup coordination: delete consumed raw objects after publication.
//!
//! Invoked only after the consolidated artifact was durably published.
//! When the merge-or-publish step fails, the caller skips this entirely so
//! raw inputs survive for the next scheduled retry.

use std::sync::Arc;

use silo_core::storage::StorageBackend;

use crate::error::Result;

/// Maximum keys per delete-objects request (S3 batch limit).
pub const DELETE_BATCH_LIMIT: usize = 1000;

/// Deletes the consumed raw objects from the source store, chunked to the
/// store's batch limit. An empty key list is a no-op.
///
/// # Errors
///
/// Returns an error if a delete request fails; the artifact is already
/// published at that point, so leftover raw objects are re-consumed (and
/// re-published) by the next run rather than lost.
pub async fn cleanup(storage: &Arc<dyn StorageBackend>, keys: &[String]) -> Result<usize> {
    if keys.is_empty() {
        return Ok(0);
    }

    for chunk in keys.chunks(DELETE_BATCH_LIMIT) {
        storage.delete_many(chunk).await?;
    }

    tracing::info!(count = keys.len(), "successfully deleted source objects");
    Ok(keys.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use silo_core::storage::MemoryBackend;

    #[tokio::test]
    async fn deletes_all_named_keys() {
        let backend = Arc::new(MemoryBackend::new());
        for key in ["in/a.jsonl", "in/b.jsonl"] {
            backend.put(key, Bytes::from("x"), None).await.unwrap();
        }
        let storage: Arc<dyn StorageBackend> = backend.clone();

        let deleted = cleanup(&storage, &["in/a.jsonl".to_string(), "in/b.jsonl".to_string()])
            .await
            .expect("cleanup");

        assert_eq!(deleted, 2);
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn empty_key_list_is_noop() {
        let backend = Arc::new(MemoryBackend::new());
        backend.put("in/keep.jsonl", Bytes::from("x"), None).await.unwrap();
        let storage: Arc<dyn StorageBackend> = backend.clone();

        let deleted = cleanup(&storage, &[]).await.expect("cleanup");
        assert_eq!(deleted, 0);
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn chunks_beyond_batch_limit() {
        let backend = Arc::new(MemoryBackend::new());
        let keys: Vec<String> = (0..DELETE_BATCH_LIMIT + 5)
            .map(|i| format!("in/{i}.jsonl"))
            .collect();
        for key in &keys {
            backend.put(key, Bytes::from("x"), None).await.unwrap();
        }
        let storage: Arc<dyn StorageBackend> = backend.clone();

        let deleted = cleanup(&storage, &keys).await.expect("cleanup");
        assert_eq!(deleted, DELETE_BATCH_LIMIT + 5);
        assert!(backend.is_empty());
    }
}
