//! Validation issues reported by the resolver.

use crate::path::Path;
use serde::{Deserialize, Serialize};

/// What went wrong at a location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueCode {
    /// Object key not declared by the shape
    UnknownKey,
    /// Required value missing and no default available
    MissingField,
    /// Value has the wrong kind
    TypeMismatch,
    /// Number outside the declared range
    OutOfRange,
    /// Number must be an integer
    NotInteger,
    /// Value differs from the literal
    LiteralMismatch,
    /// String not in the allowed set
    NotAllowed,
    /// Union tag names no variant
    UnknownVariant,
    /// Buffer element type differs
    BufferKind,
    /// Buffer has the wrong length
    BufferLength,
    /// Array has too few or too many items
    ArrayLength,
    /// Shape itself is malformed
    InvalidShape,
}

impl IssueCode {
    /// Stable machine-readable code
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnknownKey => "schema.unknown-key",
            Self::MissingField => "schema.missing-field",
            Self::TypeMismatch => "schema.type-mismatch",
            Self::OutOfRange => "schema.out-of-range",
            Self::NotInteger => "schema.not-integer",
            Self::LiteralMismatch => "schema.literal-mismatch",
            Self::NotAllowed => "schema.not-allowed",
            Self::UnknownVariant => "schema.unknown-variant",
            Self::BufferKind => "schema.buffer-kind",
            Self::BufferLength => "schema.buffer-length",
            Self::ArrayLength => "schema.array-length",
            Self::InvalidShape => "schema.invalid-shape",
        }
    }
}

impl std::fmt::Display for IssueCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single validation issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaIssue {
    /// Issue code
    pub code: IssueCode,
    /// Where it happened
    pub path: Path,
    /// Human-readable detail
    pub message: String,
}

impl SchemaIssue {
    /// Create an issue
    #[must_use]
    pub fn new(code: IssueCode, path: Path, message: impl Into<String>) -> Self {
        Self {
            code,
            path,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}: {}", self.code, self.path, self.message)
    }
}

impl std::error::Error for SchemaIssue {}

/// Join several issues into one line
#[must_use]
pub fn summarize(issues: &[SchemaIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
