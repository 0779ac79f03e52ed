//! Error types for Gatekeep.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Resolution errors
    #[error("Unknown parameter '{parameter}' referenced by {source_layer}")]
    UnknownParameter {
        parameter: String,
        source_layer: String,
    },

    #[error("Invalid value '{value}' for parameter '{parameter}', expected one of: {}", allowed.join(", "))]
    InvalidOption {
        parameter: String,
        value: String,
        allowed: Vec<String>,
    },

    #[error("Parameter '{0}' does not allow an empty value")]
    EmptyParameter(String),

    #[error("Parameter '{0}' is read-only and cannot be overridden")]
    ReadOnlyParameter(String),

    // Configuration errors
    #[error("Malformed pattern '{pattern}': {reason}")]
    MalformedPattern { pattern: String, reason: String },

    #[error("Invalid pipeline definition: {0}")]
    InvalidDefinition(String),

    #[error("Patch target not found: {kind} '{name}'")]
    PatchTarget { kind: String, name: String },

    #[error("Trigger not found: {0}")]
    TriggerNotFound(String),

    #[error("Build not found: {0}")]
    BuildNotFound(String),

    // Collaborator errors
    #[error("Execution engine rejected handoff: {0}")]
    Engine(String),

    #[error("Status publishing failed: {0}")]
    Publish(String),

    // Infrastructure errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Unknown-parameter error naming the override layer that referenced it.
    pub fn unknown_parameter(parameter: impl Into<String>, source_layer: impl Into<String>) -> Self {
        Error::UnknownParameter {
            parameter: parameter.into(),
            source_layer: source_layer.into(),
        }
    }

    pub fn malformed(pattern: impl Into<String>, reason: impl ToString) -> Self {
        Error::MalformedPattern {
            pattern: pattern.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
