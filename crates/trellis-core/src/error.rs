//! Error taxonomy shared by every trellis crate.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised while validating a value against a declared property
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Property '{key}' is not nullable")]
    Null { key: String },

    #[error("Property '{key}' expects {expected}, got {found}")]
    TypeMismatch {
        key: String,
        expected: String,
        found: String,
    },
}

/// Core error type for trellis operations
#[derive(Error, Debug)]
pub enum TrellisError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Expected at most one result, got {count}")]
    Multiplicity { count: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Read-only: {0}")]
    ReadOnly(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Expected element of type '{expected}', got '{found}'")]
    WrongElementType { expected: String, found: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TrellisError {
    /// True when the backend reported a missing id, index or entry
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Construct a type mismatch validation error
    pub fn type_mismatch(
        key: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::Validation(ValidationError::TypeMismatch {
            key: key.into(),
            expected: expected.into(),
            found: found.into(),
        })
    }
}

impl From<ConfigError> for TrellisError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<serde_json::Error> for TrellisError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TrellisError>;

/// Convert an `Option` result into `None` when the error is a not-found
pub fn absent_if_not_found<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}
