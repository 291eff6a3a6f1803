//! Domain error types for directory resolution and authorization.

use thiserror::Error;

/// Domain-specific errors for directory and authorization operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A directory lookup failed (view unavailable, transport failure).
    #[error("directory lookup failed for '{name}': {message}")]
    LookupFailed { name: String, message: String },

    /// A directory record is missing a mandatory field.
    #[error("malformed directory record '{record}': missing {field}")]
    MalformedRecord { record: String, field: String },

    /// A document identifier could not be split into resource and content ids.
    #[error("malformed document id '{value}': {reason}")]
    MalformedDocumentId { value: String, reason: String },

    /// A directory name could not be parsed.
    #[error("invalid directory name: {value}")]
    InvalidName { value: String },

    /// Security metadata for a resource could not be read.
    #[error("security metadata unavailable for resource {resource_id}: {message}")]
    MetadataUnavailable {
        resource_id: String,
        message: String,
    },

    /// Formula evaluation against a directory record failed.
    #[error("formula evaluation failed: {message}")]
    EvaluationFailed { message: String },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
