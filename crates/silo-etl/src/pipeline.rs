//! Pipeline entry points: the consolidation run and the validation pass.
//!
//! `run_etl` and `run_validation` are invoked by an external scheduler,
//! serialized with overlap prevention. Both take explicitly constructed
//! storage backends scoped to one invocation; nothing is cached across
//! runs. Control flow for a consolidation run:
//!
//! ```text
//! discover -> concurrent fetch+parse -> merge -> publish -> cleanup
//! ```
//!
//! Cleanup happens if and only if publication succeeded. The validation
//! pass is a separate, idempotent, read-only pipeline over the published
//! artifacts.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use silo_core::keys;
use silo_core::observability::pipeline_span;
use silo_core::storage::StorageBackend;
use tracing::Instrument;

use crate::error::Result;
use crate::schema::ConsolidatedDataset;
use crate::{cleanup, consolidate, fetch, validate};

/// Prefix configuration for one pipeline invocation.
///
/// Prefixes are used verbatim; environment scoping is encoded by whoever
/// computes them.
#[derive(Debug, Clone)]
pub struct EtlConfig {
    /// Prefix under which raw input objects are discovered.
    pub source_prefix: String,
    /// Prefix under which consolidated artifacts are published.
    pub destination_prefix: String,
}

/// Net effect of one consolidation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EtlOutcome {
    /// No raw objects were found, or none produced a valid batch.
    NothingToDo,
    /// One artifact was published and the consumed inputs deleted.
    Published {
        /// Key of the published artifact.
        artifact_key: String,
        /// Number of valid batches merged.
        batches: usize,
        /// Total rows in the artifact.
        rows: usize,
        /// Number of source objects deleted afterwards.
        sources_deleted: usize,
    },
}

/// Net effect of one validation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// No readable artifacts were found under the destination prefix.
    NothingToDo,
    /// All checks ran over the concatenated dataset.
    Checked {
        /// Number of artifacts that decoded successfully.
        artifacts: usize,
        /// Total rows inspected.
        rows: usize,
        /// Number of checks run.
        checks: usize,
    },
}

/// Runs one consolidation pass: discover, fetch, merge, publish, cleanup.
///
/// # Errors
///
/// Returns an error when discovery fails (before any fetch begins) or when
/// consolidation/publication fails — in which case cleanup is skipped and
/// every raw input is preserved for the next scheduled run. All other
/// failures are recovered locally and logged.
pub async fn run_etl(
    source: &Arc<dyn StorageBackend>,
    destination: &Arc<dyn StorageBackend>,
    config: &EtlConfig,
) -> Result<EtlOutcome> {
    etl_run(source, destination, config)
        .instrument(pipeline_span("run_etl"))
        .await
}

async fn etl_run(
    source: &Arc<dyn StorageBackend>,
    destination: &Arc<dyn StorageBackend>,
    config: &EtlConfig,
) -> Result<EtlOutcome> {
    let started = Instant::now();

    let pending = list_keys(source, &config.source_prefix, keys::is_raw_object).await?;
    if pending.is_empty() {
        tracing::info!(prefix = %config.source_prefix, "no raw objects found, nothing to do");
        return Ok(EtlOutcome::NothingToDo);
    }

    tracing::info!(count = pending.len(), "found raw objects, processing concurrently");
    let batches = fetch::fetch_all(source, &pending).await;
    if batches.is_empty() {
        tracing::info!("no valid batches were created, nothing to do");
        return Ok(EtlOutcome::NothingToDo);
    }

    tracing::info!(batches = batches.len(), "merging valid batches");
    let batch_count = batches.len();
    let dataset = consolidate::consolidate(batches);
    let rows = dataset.num_rows();

    // Publish failure propagates here, skipping cleanup entirely: raw
    // inputs are never deleted when the output was not durably published.
    let artifact_key =
        consolidate::publish(destination, &config.destination_prefix, &dataset, Utc::now()).await?;

    let sources_deleted = cleanup::cleanup(source, &pending).await?;

    tracing::info!(
        artifact = %artifact_key,
        batches = batch_count,
        rows,
        sources_deleted,
        duration_secs = started.elapsed().as_secs_f64(),
        "consolidation run completed"
    );

    Ok(EtlOutcome::Published {
        artifact_key,
        batches: batch_count,
        rows,
        sources_deleted,
    })
}

/// Runs one validation pass over the published artifacts.
///
/// Read-only and idempotent: running it twice over the same artifacts
/// produces identical outcomes.
///
/// # Errors
///
/// Returns an error only when listing the destination prefix fails.
pub async fn run_validation(
    destination: &Arc<dyn StorageBackend>,
    config: &EtlConfig,
) -> Result<ValidationOutcome> {
    validation_run(destination, config)
        .instrument(pipeline_span("run_validation"))
        .await
}

async fn validation_run(
    destination: &Arc<dyn StorageBackend>,
    config: &EtlConfig,
) -> Result<ValidationOutcome> {
    let started = Instant::now();

    let artifacts = list_keys(destination, &config.destination_prefix, keys::is_artifact).await?;
    if artifacts.is_empty() {
        tracing::info!(prefix = %config.destination_prefix, "no artifacts found, nothing to do");
        return Ok(ValidationOutcome::NothingToDo);
    }

    let decoded = validate::fetch_artifacts(destination, &artifacts).await;
    if decoded.is_empty() {
        tracing::info!("no artifacts could be read, nothing to do");
        return Ok(ValidationOutcome::NothingToDo);
    }

    let artifact_count = decoded.len();
    let mut dataset = ConsolidatedDataset::default();
    for rows in decoded {
        dataset.rows.extend(rows);
    }

    for check in validate::CHECKS {
        check(&dataset);
    }

    tracing::info!(
        artifacts = artifact_count,
        rows = dataset.num_rows(),
        checks = validate::CHECKS.len(),
        duration_secs = started.elapsed().as_secs_f64(),
        "validation pass completed"
    );

    Ok(ValidationOutcome::Checked {
        artifacts: artifact_count,
        rows: dataset.num_rows(),
        checks: validate::CHECKS.len(),
    })
}

/// Lists all keys under `prefix` matching `filter`, in listing order.
async fn list_keys(
    storage: &Arc<dyn StorageBackend>,
    prefix: &str,
    filter: fn(&str) -> bool,
) -> Result<Vec<String>> {
    let metas = storage.list(prefix).await?;
    Ok(metas
        .into_iter()
        .filter(|m| filter(&m.key))
        .map(|m| m.key)
        .collect())
}
