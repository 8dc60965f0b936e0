//! Error types for description loading

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for description operations
pub type Result<T> = std::result::Result<T, DescError>;

/// Errors raised while loading or validating a description file
#[derive(Debug, Error)]
pub enum DescError {
    /// File not found or cannot be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path that was attempted
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// YAML syntax or structural error
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// Path that was parsed
        path: PathBuf,
        /// Underlying YAML error
        #[source]
        source: serde_yaml::Error,
    },

    /// A field had an unrecognized or ill-typed value
    #[error("configuration error in `{field}`: {reason}")]
    Config {
        /// The offending field, e.g. `core.attributes.buffer_position`
        field: String,
        /// What went wrong
        reason: String,
    },

    /// A `name[lo..hi]` instance range could not be parsed
    #[error("bad instance range in name `{name}` (expected `base[lo..hi]`)")]
    Range {
        /// The name as written
        name: String,
    },

    /// A reference to a neuron, group, tile or core that does not exist
    #[error("unknown reference `{reference}`: {reason}")]
    UnknownReference {
        /// The reference as written, e.g. `layer0.7`
        reference: String,
        /// What was expected
        reason: String,
    },
}

impl DescError {
    /// Create a configuration error for a named field
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config { field: field.into(), reason: reason.into() }
    }

    /// Create an unknown-reference error
    pub fn unknown(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnknownReference { reference: reference.into(), reason: reason.into() }
    }
}
