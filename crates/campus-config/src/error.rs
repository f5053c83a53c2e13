//! Error types for config loading and validation.

use thiserror::Error;

/// Errors returned while loading or validating engine config.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config layer could not be read from disk.
    #[error("failed to read config layer: {0}")]
    ReadFailed(#[from] std::io::Error),
    /// A config layer is not valid JSON5.
    #[error("failed to parse config layer: {0}")]
    ParseFailed(#[from] json5::Error),
    /// The merged document does not match the config models.
    #[error("failed to decode config: {0}")]
    DecodeFailed(#[from] serde_json::Error),
    /// A specific field failed schema validation (`layer:path`).
    #[error("invalid config at {path}: {message}")]
    InvalidField { path: String, message: String },
    /// A cross-field invariant does not hold.
    #[error("invalid config: {0}")]
    Invalid(String),
}
