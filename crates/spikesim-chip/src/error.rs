//! Error types for chip construction, mapping and simulation

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for kernel operations
pub type Result<T> = std::result::Result<T, SimError>;

/// Errors that can occur while building or running a chip.
///
/// Everything here is detected at load time; invariant violations inside
/// the timestep loop are bugs and assert instead.
#[derive(Debug, Error)]
pub enum SimError {
    /// A description field had a bad or missing value
    #[error("configuration error in `{field}`: {reason}")]
    Config {
        /// The offending field
        field: String,
        /// What went wrong
        reason: String,
    },

    /// A neuron, connection or axon could not be placed on the hardware
    #[error("mapping error for `{subject}`: {reason}")]
    Mapping {
        /// What was being mapped, e.g. `layer0.3`
        subject: String,
        /// Why it failed
        reason: String,
    },

    /// No registered model factory under the requested name
    #[error("unknown {kind} model `{name}`")]
    UnknownModel {
        /// Unit kind: `synapse`, `dendrite` or `soma`
        kind: &'static str,
        /// Requested model name
        name: String,
    },

    /// A model factory rejected its configuration
    #[error("model `{name}` rejected configuration: {reason}")]
    ModelConfig {
        /// Model name
        name: String,
        /// Rejection reason
        reason: String,
    },

    /// Trace or summary file could not be created
    #[error("failed to create {path}: {source}")]
    TraceIo {
        /// Path that was attempted
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl SimError {
    /// Create a configuration error for a named field
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config { field: field.into(), reason: reason.into() }
    }

    /// Create a mapping error
    pub fn mapping(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Mapping { subject: subject.into(), reason: reason.into() }
    }

    /// Create a model configuration error
    pub fn model_config(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ModelConfig { name: name.into(), reason: reason.into() }
    }
}
