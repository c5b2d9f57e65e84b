//! Object key conventions for the consolidation pipeline.
//!
//! Raw inputs are line-delimited JSON objects (`.jsonl`) under the source
//! prefix. Published artifacts are Parquet files under the destination
//! prefix, keyed by the UTC publication time at second resolution:
//!
//! ```text
//! {destination-prefix}{%Y_%m_%d_%H_%M_%S}_data.parquet
//! ```
//!
//! Key collisions at second resolution are accepted: the external scheduler
//! runs at most one consolidation at a time.

use chrono::{DateTime, Utc};

/// Suffix identifying pending raw input objects.
pub const RAW_OBJECT_SUFFIX: &str = ".jsonl";

/// Suffix identifying published columnar artifacts.
pub const ARTIFACT_SUFFIX: &str = ".parquet";

/// Returns true if `key` names a pending raw input object.
#[must_use]
pub fn is_raw_object(key: &str) -> bool {
    key.ends_with(RAW_OBJECT_SUFFIX)
}

/// Returns true if `key` names a published artifact.
#[must_use]
pub fn is_artifact(key: &str) -> bool {
    key.ends_with(ARTIFACT_SUFFIX)
}

/// Generates the output key for an artifact published at `at`.
#[must_use]
pub fn artifact_key(destination_prefix: &str, at: DateTime<Utc>) -> String {
    format!(
        "{destination_prefix}{}_data.parquet",
        at.format("%Y_%m_%d_%H_%M_%S")
    )
}
