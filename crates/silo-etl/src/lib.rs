//! # silo-etl
//!
//! Batch consolidation pipeline over object storage.
//!
//! Raw inputs are line-delimited JSON objects produced by an external
//! ingestion endpoint. One consolidation run discovers the pending objects,
//! concurrently extracts and schema-validates them, merges the valid
//! batches into a single Parquet artifact, publishes it under a timestamped
//! key, and deletes the consumed inputs — strictly after the publish
//! succeeded. A separate read-only validation pass re-reads published
//! artifacts and reports data-quality findings.
//!
//! The two entry points, [`pipeline::run_etl`] and
//! [`pipeline::run_validation`], are designed to be driven by an external
//! scheduler that serializes runs.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

pub mod cleanup;
pub mod consolidate;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod payload;
pub mod pipeline;
pub mod schema;
pub mod validate;

pub use error::{EtlError, Result};
pub use pipeline::{run_etl, run_validation, EtlConfig, EtlOutcome, ValidationOutcome};
pub use schema::{ConsolidatedDataset, SaleRecord, TabularBatch};
