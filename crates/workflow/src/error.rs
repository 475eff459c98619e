//! Error types for the workflow engine.

use haulflow_core::{LoadId, LoadStatus};
use haulflow_storage::StorageError;
use thiserror::Error;

/// Main error type for workflow operations.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("no caller identity")]
    NotAuthenticated,

    #[error("caller has no driver profile")]
    ProfileNotFound,

    #[error("access denied")]
    AccessDenied,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("operation '{operation}' is not valid from status '{from}'")]
    InvalidTransition {
        from: LoadStatus,
        operation: &'static str,
    },

    /// The delivery sequencer blocked a start-delivery call. The reason
    /// names the blocking load so the driver knows what to do next.
    #[error("delivery order violation: {reason}")]
    OrderViolation {
        reason: String,
        blocking_load: Option<LoadId>,
    },

    #[error("storage failure: {0}")]
    Storage(StorageError),
}

impl EngineError {
    /// Whether the caller should present this as a transient failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Storage(e) if e.is_retryable())
    }
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        match err {
            // Tenant mismatch is an access problem, never "not found".
            StorageError::AccessDenied => EngineError::AccessDenied,
            other => EngineError::Storage(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
