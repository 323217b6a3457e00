//! Identifiers for pipeline entities.
//!
//! Step ids are plain dotted strings so error messages stay readable.
//! Run ids are name-based UUIDs derived from the compiled plan, so the
//! same plan always runs under the same id.

use crate::error::{CoreError, CoreResult};
use crate::hash::Hash;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Step instance identifier
///
/// Either `<recipe>.<stage>.<step>` or an explicit instance id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(String);

impl StepId {
    /// Derive the id of a step from its recipe, stage and step ids
    #[must_use]
    pub fn derive(recipe: &str, stage: &str, step: &str) -> Self {
        Self(format!("{}.{}.{}", recipe, stage, step))
    }

    /// Use an explicit instance id verbatim
    ///
    /// # Errors
    ///
    /// Returns error if the id is empty or contains whitespace
    pub fn explicit(instance_id: &str) -> CoreResult<Self> {
        if instance_id.is_empty() {
            return Err(CoreError::InvalidId {
                reason: "instance id must not be empty".to_string(),
            });
        }
        if instance_id.chars().any(char::is_whitespace) {
            return Err(CoreError::InvalidId {
                reason: format!("instance id '{}' contains whitespace", instance_id),
            });
        }
        Ok(Self(instance_id.to_string()))
    }

    /// Get as string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StepId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Run identifier - identifies a single generation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Derive the run id from a plan fingerprint
    #[must_use]
    pub fn from_fingerprint(fingerprint: &Hash) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, fingerprint.as_bytes()))
    }

    /// Create from UUID bytes
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Get as UUID
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "run_{}", self.0)
    }
}
