//! Error types for the storage layer.

use thiserror::Error;

/// Storage layer errors.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("record not found: {0}")]
    NotFound(String),

    /// The record exists but under a different tenant. Deliberately
    /// distinct from `NotFound` so callers can report an access problem
    /// instead of a missing record.
    #[error("access denied: record belongs to another tenant")]
    AccessDenied,

    /// Conditional write lost against a concurrent writer.
    #[error("version conflict")]
    Conflict,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Infrastructure failure. Retryable from the caller's point of view.
    #[error("storage i/o error: {0}")]
    Io(String),
}

impl StorageError {
    /// Whether the caller should present this as a transient failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Io(_) | StorageError::Conflict)
    }
}

/// Error from the outbound notifier. Always swallowed by the engine.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("notification channel closed")]
    ChannelClosed,

    #[error("notifier i/o error: {0}")]
    Io(String),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;
