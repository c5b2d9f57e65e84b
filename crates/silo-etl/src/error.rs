//! Error types for pipeline operations.

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, EtlError>;

/// Errors that can occur during a pipeline run.
///
/// Only discovery and publish failures propagate out of a run; line-level
/// and object-level failures are recovered locally and surface as warnings
/// or errors in the log.
#[derive(Debug, Error)]
pub enum EtlError {
    /// A storage operation failed.
    #[error(transparent)]
    Storage(#[from] silo_core::Error),

    /// Parquet encoding or decoding failed.
    #[error("parquet error: {message}")]
    Parquet {
        /// Description of the Parquet failure.
        message: String,
    },

    /// A raw object's content could not be turned into a tabular batch.
    #[error("parse error: {message}")]
    Parse {
        /// Description of the parse failure.
        message: String,
    },
}
