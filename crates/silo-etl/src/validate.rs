//! Data-quality checks over published artifacts.
//!
//! Checks are pure functions over one immutable dataset snapshot. Each
//! inspects the full dataset and reports through the log; no check can
//! halt or alter another. Adding a check means appending a function to
//! [`CHECKS`] — no other change is required.

use std::sync::Arc;

use futures::future::join_all;
use silo_core::storage::StorageBackend;

use crate::schema::{self, ConsolidatedDataset, SaleRecord};

/// A data-quality check: inspects the dataset, logs the outcome.
pub type Check = fn(&ConsolidatedDataset);

/// The ordered list of checks run by the validation pass.
pub const CHECKS: &[Check] = &[check_nulls, check_quantity_positive];

/// Warns when any column contains a null value anywhere in the dataset.
pub fn check_nulls(dataset: &ConsolidatedDataset) {
    let nulls = null_count(dataset);
    if nulls > 0 {
        tracing::warn!(nulls, "found rows with null values");
    } else {
        tracing::info!("null check passed");
    }
}

/// Warns when the `quantity` column is not strictly positive everywhere.
pub fn check_quantity_positive(dataset: &ConsolidatedDataset) {
    let nonpositive = nonpositive_quantity_count(dataset);
    if nonpositive > 0 {
        tracing::warn!(nonpositive, "column 'quantity' has values at or below zero");
    } else {
        tracing::info!("positive quantity check passed");
    }
}

fn null_count(dataset: &ConsolidatedDataset) -> usize {
    dataset
        .rows
        .iter()
        .map(|r| {
            usize::from(r.store_id.is_none())
                + usize::from(r.transaction_id.is_none())
                + usize::from(r.product_id.is_none())
                + usize::from(r.quantity.is_none())
                + usize::from(r.datetime.is_none())
        })
        .sum()
}

fn nonpositive_quantity_count(dataset: &ConsolidatedDataset) -> usize {
    dataset
        .rows
        .iter()
        .filter(|r| matches!(r.quantity, Some(q) if q <= 0))
        .count()
}

/// Concurrently fetches and decodes published artifacts.
///
/// Same fan-out barrier as raw extraction; an unreadable artifact is
/// logged as an error and contributes nothing, without aborting siblings.
pub async fn fetch_artifacts(
    storage: &Arc<dyn StorageBackend>,
    keys: &[String],
) -> Vec<Vec<SaleRecord>> {
    let handles: Vec<_> = keys
        .iter()
        .cloned()
        .map(|key| {
            let store = Arc::clone(storage);
            tokio::spawn(async move { read_one(&store, &key).await })
        })
        .collect();

    let results = join_all(handles).await;

    let mut decoded = Vec::new();
    for (result, key) in results.into_iter().zip(keys) {
        match result {
            Ok(Some(rows)) => decoded.push(rows),
            Ok(None) => {}
            Err(err) => {
                tracing::error!(key = %key, error = %err, "artifact read task failed");
            }
        }
    }
    decoded
}

async fn read_one(storage: &Arc<dyn StorageBackend>, key: &str) -> Option<Vec<SaleRecord>> {
    tracing::debug!(key = %key, "reading artifact");
    let result = async {
        let bytes = storage.get(key).await?;
        schema::read_artifact(&bytes)
    }
    .await;

    match result {
        Ok(rows) => Some(rows),
        Err(err) => {
            tracing::error!(key = %key, error = %err, "critical error while reading artifact");
            None
        }
    }
}
