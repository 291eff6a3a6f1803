//! Storage error types.

use thiserror::Error;

/// Storage-specific errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// User not found.
    #[error("user not found: {principal_id}")]
    UserNotFound { principal_id: String },

    /// Group not found.
    #[error("group not found: {name}")]
    GroupNotFound { name: String },

    /// Invalid input error.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// The backend could not serve the request.
    #[error("internal storage error: {message}")]
    Internal { message: String },
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
