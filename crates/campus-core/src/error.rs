//! Error types for the core engine crate.

use campus_config::ConfigError;
use campus_protocol::{ActionError, EventTag};
use thiserror::Error;

/// Errors returned by engine operations.
#[derive(Debug, Error)]
pub enum CampusCoreError {
    /// An action was rejected before reaching the reducer.
    #[error("action rejected: {0}")]
    Action(#[from] ActionError),
    /// Engine configuration is unusable.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    /// Persistence port failure surfaced to the caller.
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
    /// The engine was used after `shutdown`.
    #[error("engine has been shut down")]
    ShutDown,
}

/// Errors raised by event handlers.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler was routed an event it does not understand.
    #[error("handler for {expected} received {actual}")]
    UnexpectedEvent { expected: EventTag, actual: EventTag },
    /// An entity the cascade depends on is not in the store.
    #[error("{kind} not found: {id}")]
    MissingEntity { kind: &'static str, id: String },
    /// A derived action failed validation.
    #[error(transparent)]
    Action(#[from] ActionError),
    /// Free-form handler failure.
    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    pub fn missing(kind: &'static str, id: impl Into<String>) -> Self {
        HandlerError::MissingEntity {
            kind,
            id: id.into(),
        }
    }
}

/// Errors returned by persistence ports.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Backend-specific failure.
    #[error("{0}")]
    Backend(String),
}
