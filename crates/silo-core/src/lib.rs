//! # silo-core
//!
//! Shared primitives for the Silo batch consolidation pipeline:
//!
//! - **Storage Backends**: the object-store contract plus in-memory and S3
//!   implementations
//! - **Key Layout**: raw-input and published-artifact key conventions
//! - **Error Types**: shared error definitions and result types
//! - **Observability**: structured logging initialization and span helpers
//!
//! Pipeline logic lives in `silo-etl`; this crate is the only place allowed
//! to define primitives shared across components.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]

pub mod error;
pub mod keys;
pub mod observability;
pub mod storage;

pub use error::{Error, Result};
pub use observability::{init_logging, LogFormat};
pub use storage::{MemoryBackend, ObjectMeta, S3Backend, S3Options, StorageBackend};
