//! Concurrent fetch orchestration: fan out extraction across raw objects.
//!
//! One independent task per key, all spawned up front, joined behind a
//! single barrier. A slow or failing object never blocks or cancels its
//! siblings, but consolidation cannot start until every task has settled.

use std::sync::Arc;

use futures::future::join_all;
use silo_core::storage::StorageBackend;

use crate::extract;
use crate::schema::TabularBatch;

/// Extracts all keys concurrently and collects the valid batches.
///
/// Each task owns its own clone of the storage handle. Per-object failures
/// were already logged by the extractor; a panicked task is logged here and
/// treated the same way. No ordering guarantee is made among the returned
/// batches.
pub async fn fetch_all(storage: &Arc<dyn StorageBackend>, keys: &[String]) -> Vec<TabularBatch> {
    let handles: Vec<_> = keys
        .iter()
        .cloned()
        .map(|key| {
            let store = Arc::clone(storage);
            tokio::spawn(async move { extract::extract(&store, &key).await })
        })
        .collect();

    // Join barrier: every task settles before any result is consumed.
    let results = join_all(handles).await;

    let mut batches = Vec::new();
    for (result, key) in results.into_iter().zip(keys) {
        match result {
            Ok(Some(batch)) => batches.push(batch),
            Ok(None) => {}
            Err(err) => {
                tracing::error!(key = %key, error = %err, "extraction task failed");
            }
        }
    }
    batches
}
