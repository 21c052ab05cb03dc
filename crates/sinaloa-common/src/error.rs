//! Error types shared by the Sinaloa crates.

use thiserror::Error;

use crate::version::SchemaVersion;

/// Top-level error type for data handling outside the tick loop.
#[derive(Debug, Error)]
pub enum SinaloaError {
    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Schema version mismatch
    #[error("Schema version mismatch: expected {expected}, got {actual}")]
    VersionMismatch {
        /// Version this build understands
        expected: SchemaVersion,
        /// Version found in the data
        actual: SchemaVersion,
    },

    /// Structurally valid data with impossible values
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl SinaloaError {
    /// Checks `actual` against the version this build reads.
    pub fn check_version(expected: SchemaVersion, actual: SchemaVersion) -> SinaloaResult<()> {
        if expected.is_compatible_with(&actual) {
            Ok(())
        } else {
            Err(Self::VersionMismatch { expected, actual })
        }
    }
}

/// Result type alias for Sinaloa operations.
pub type SinaloaResult<T> = Result<T, SinaloaError>;
