//! Error types for nb-core

use thiserror::Error;

/// Core error type for Nebula
#[derive(Error, Debug)]
pub enum CoreError {
    /// C001: A base type name could not be resolved
    #[error("[C001] Unknown type: {name}")]
    UnknownType { name: String },

    /// C002: A value does not have the shape its type requires
    #[error("[C002] Invalid value for type {type_name}: {value}")]
    InvalidValueForType { type_name: String, value: String },

    /// C003: A serialized datum does not have the expected form
    #[error("[C003] Malformed datum: expected {expected}, found {found}")]
    MalformedDatum { expected: String, found: String },

    /// C004: Configuration file not found
    #[error("[C004] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// C005: Invalid configuration value
    #[error("[C005] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// C006: IO error with file path context
    #[error("[C006] Failed to read '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },

    /// C007: YAML parse error
    #[error("[C007] Config parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),
}

impl CoreError {
    /// Shorthand for a [`CoreError::MalformedDatum`]
    pub fn malformed(expected: impl Into<String>, found: impl std::fmt::Display) -> Self {
        CoreError::MalformedDatum {
            expected: expected.into(),
            found: found.to_string(),
        }
    }
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;
