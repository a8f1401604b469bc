//! Unified error types for the Backhaul workspace.
//!
//! Each higher-level crate wraps these variants when appropriate rather
//! than defining its own error enum.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum BackhaulError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A resource was registered twice under the same logical id.
    #[error("duplicate logical id: {logical_id}")]
    DuplicateResource {
        /// The logical id that was registered more than once.
        logical_id: String,
    },

    /// The resource dependency graph contains a cycle.
    #[error("cyclic dependency in resource graph: {message}")]
    CyclicDependency {
        /// Description of the cycle.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, BackhaulError>;
