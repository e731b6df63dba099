//! Error types for E2E sessions

use playrun_common::EngineKind;
use thiserror::Error;

use crate::actions::ActionError;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Failed to start {kind} engine: {reason}")]
    EngineStart { kind: EngineKind, reason: String },

    #[error("{kind} engine unavailable: {reason}")]
    EngineUnavailable { kind: EngineKind, reason: String },

    #[error("No {0} engine configured in the registry")]
    EngineNotConfigured(EngineKind),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Test scope already closed: {0}")]
    ScopeClosed(String),

    #[error(transparent)]
    Action(#[from] ActionError),

    #[error("AssertionError: {0}")]
    AssertionFailed(String),

    #[error("Test skipped: {0}")]
    Skipped(String),

    #[error("TimeoutError: {0}")]
    Timeout(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error(transparent)]
    Common(#[from] playrun_common::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl E2eError {
    /// Errors that must stop the whole run rather than fail one test
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            E2eError::EngineStart { .. }
                | E2eError::EngineUnavailable { .. }
                | E2eError::EngineNotConfigured(_)
        )
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
