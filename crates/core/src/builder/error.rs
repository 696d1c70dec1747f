//! Error types for the builder module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while building an item.
#[derive(Debug, Error)]
pub enum BuilderError {
    /// Metadata is missing something the builder requires.
    #[error("Malformed metadata: {0}")]
    MalformedMetadata(String),

    /// Failed to inspect an asset file.
    #[error("Failed to read asset {path}")]
    Asset {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A field could not be converted into the document format.
    #[error("Failed to convert field `{field}`: {reason}")]
    Field { field: String, reason: String },

    /// Any other failure reported by a builder implementation.
    #[error("{0}")]
    Other(String),
}
