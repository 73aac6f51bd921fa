/// Structured error types for mushbbs-core.
///
/// Uses `thiserror` so the server crate can map each variant onto an HTTP
/// status without string matching. The binary (mushbbs-cli) wraps these in
/// `anyhow` for convenience.
use thiserror::Error;

use crate::models::ValidationError;

/// Main error type for board, post and faction operations
#[derive(Error, Debug)]
pub enum BbsError {
    /// Board, post or faction lookup miss (or soft-deleted)
    #[error("{resource} '{key}' not found")]
    NotFound { resource: &'static str, key: String },

    /// Malformed board or post key
    #[error("invalid {field} '{value}': {reason}")]
    InvalidFormat {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    /// Access policy denial; `action` completes "you do not have permission to ..."
    #[error("you do not have permission to {action}")]
    Forbidden { action: &'static str },

    /// Unique ordering violation on create or reorder
    #[error("conflict: {0}")]
    Conflict(String),

    /// Request body failed validation before reaching storage
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Storage layer failure (connection loss, bad row, ...)
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Result type alias for mushbbs-core operations
pub type Result<T> = std::result::Result<T, BbsError>;

impl BbsError {
    /// Create a not-found error for a resource key
    pub fn not_found(resource: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            key: key.into(),
        }
    }

    /// Create an invalid-format error
    pub fn invalid_format(field: &'static str, value: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidFormat {
            field,
            value: value.into(),
            reason,
        }
    }

    /// Wrap any storage-layer error
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage(Box::new(err))
    }

    /// Stable machine-readable code, used in API error bodies
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::InvalidFormat { .. } => "invalid_format",
            Self::Forbidden { .. } => "forbidden",
            Self::Conflict(_) => "conflict",
            Self::Validation(_) => "validation_error",
            Self::Storage(_) => "internal_error",
        }
    }
}
