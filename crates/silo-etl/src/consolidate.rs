//! Consolidation: merge valid batches and publish one Parquet artifact.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use silo_core::keys;
use silo_core::storage::StorageBackend;

use crate::error::Result;
use crate::schema::{self, ConsolidatedDataset, TabularBatch};

/// Merges batches into one dataset, preserving each batch's internal row
/// order. Callers must have checked that `batches` is non-empty; an empty
/// run short-circuits before consolidation.
#[must_use]
pub fn consolidate(batches: Vec<TabularBatch>) -> ConsolidatedDataset {
    ConsolidatedDataset::from_batches(batches)
}

/// Serializes the dataset and uploads it under a timestamped artifact key.
///
/// Publication is atomic from the caller's perspective: either the whole
/// artifact lands under the returned key, or the error propagates and the
/// run's cleanup is skipped.
///
/// # Errors
///
/// Returns an error if Parquet serialization or the store write fails;
/// both are fatal for the run.
pub async fn publish(
    storage: &Arc<dyn StorageBackend>,
    destination_prefix: &str,
    dataset: &ConsolidatedDataset,
    at: DateTime<Utc>,
) -> Result<String> {
    let bytes = schema::write_dataset(dataset)?;
    let key = keys::artifact_key(destination_prefix, at);

    storage.put(&key, bytes, None).await?;
    tracing::info!(key = %key, rows = dataset.num_rows(), "successfully uploaded artifact");

    Ok(key)
}
