//! Core error types for MAPGEN.

use std::fmt;

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Invalid encoding
    InvalidEncoding {
        /// Underlying reason
        reason: String,
    },

    /// Malformed dependency tag
    InvalidTag {
        /// The offending tag text
        tag: String,
        /// Why it was rejected
        reason: String,
    },

    /// Invalid ID format
    InvalidId {
        /// Why it was rejected
        reason: String,
    },

    /// Invalid generation environment
    InvalidEnv {
        /// Offending field
        field: String,
        /// Why it was rejected
        reason: String,
    },

    /// Validation error
    Validation {
        /// Offending field
        field: String,
        /// Why it was rejected
        reason: String,
    },

    /// Not found
    NotFound {
        /// Kind of entity
        kind: String,
        /// Entity id
        id: String,
    },

    /// Already exists
    AlreadyExists {
        /// Kind of entity
        kind: String,
        /// Entity id
        id: String,
    },

    /// Internal error (for unexpected errors)
    Internal {
        /// Error message
        message: String,
    },
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEncoding { reason } => write!(f, "Invalid encoding: {}", reason),
            Self::InvalidTag { tag, reason } => write!(f, "Invalid tag '{}': {}", tag, reason),
            Self::InvalidId { reason } => write!(f, "Invalid ID: {}", reason),
            Self::InvalidEnv { field, reason } => {
                write!(f, "Invalid environment field {}: {}", field, reason)
            }
            Self::Validation { field, reason } => {
                write!(f, "Validation failed for {}: {}", field, reason)
            }
            Self::NotFound { kind, id } => write!(f, "{} not found: {}", kind, id),
            Self::AlreadyExists { kind, id } => write!(f, "{} already exists: {}", kind, id),
            Self::Internal { message } => write!(f, "Internal error: {}", message),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidEncoding {
            reason: err.to_string(),
        }
    }
}
