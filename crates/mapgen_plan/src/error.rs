//! Structured compile errors.

use mapgen_core::StepId;
use mapgen_schema::{Path, SchemaIssue};
use serde::Serialize;

/// Error codes raised by the compiler itself
///
/// Schema issues keep their own `schema.*` codes.
pub mod codes {
    /// The generation environment failed validation
    pub const ENV_INVALID: &str = "env.invalid";
    /// The override root is not an object
    pub const OVERRIDES_INVALID: &str = "overrides.invalid";
    /// A top-level override key names no stage
    pub const OVERRIDES_UNKNOWN_STAGE: &str = "overrides.unknown-stage";
    /// A raw step key names no step of the stage
    pub const STAGE_UNKNOWN_STEP_ID: &str = "stage.unknown-step-id";
    /// The stage's surface projection failed
    pub const STAGE_TO_INTERNAL_FAILED: &str = "stage.to-internal-failed";
    /// A step's normalize hook failed
    pub const STEP_NORMALIZE_FAILED: &str = "step.normalize-failed";
    /// An op selection could not be resolved
    pub const OP_RESOLVE_FAILED: &str = "op.resolve-failed";
    /// The plan could not be encoded for fingerprinting
    pub const PLAN_ENCODING_FAILED: &str = "plan.encoding-failed";
}

/// One located compile error
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileError {
    /// Error code
    pub code: String,
    /// JSON pointer into the override document
    pub path: Path,
    /// Stage the error belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_id: Option<String>,
    /// Step the error belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<StepId>,
    /// Human-readable detail
    pub message: String,
}

impl CompileError {
    /// Create an error with no stage or step attribution
    #[must_use]
    pub fn new(code: impl Into<String>, path: Path, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            path,
            stage_id: None,
            step_id: None,
            message: message.into(),
        }
    }

    /// Attribute to a stage
    #[must_use]
    pub fn with_stage(mut self, stage_id: impl Into<String>) -> Self {
        self.stage_id = Some(stage_id.into());
        self
    }

    /// Attribute to a step
    #[must_use]
    pub fn with_step(mut self, step_id: StepId) -> Self {
        self.step_id = Some(step_id);
        self
    }

    /// Wrap a schema issue, keeping its code and path
    #[must_use]
    pub fn from_issue(issue: SchemaIssue) -> Self {
        Self::new(issue.code.as_str(), issue.path, issue.message)
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}", self.code, self.path)?;
        match (&self.stage_id, &self.step_id) {
            (_, Some(step)) => write!(f, " [{}]", step)?,
            (Some(stage), None) => write!(f, " [{}]", stage)?,
            (None, None) => {}
        }
        write!(f, ": {}", self.message)
    }
}

/// Every error found by one compilation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("compilation failed with {} error(s): {}", errors.len(), first_line(errors))]
pub struct CompileFailure {
    /// Errors in discovery order
    pub errors: Vec<CompileError>,
}

fn first_line(errors: &[CompileError]) -> String {
    match errors {
        [] => String::new(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{} (and {} more)", first, rest.len()),
    }
}

impl CompileFailure {
    /// Find the first error with a code
    #[must_use]
    pub fn find(&self, code: &str) -> Option<&CompileError> {
        self.errors.iter().find(|e| e.code == code)
    }

    /// Check if any error has a code
    #[must_use]
    pub fn has_code(&self, code: &str) -> bool {
        self.find(code).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapgen_schema::IssueCode;

    #[test]
    fn test_display_prefers_step() {
        let err = CompileError::new(codes::STAGE_UNKNOWN_STEP_ID, Path::from_segments(["config", "s", "x"]), "no step 'x'")
            .with_stage("s")
            .with_step(StepId::derive("r", "s", "x"));
        assert_eq!(err.to_string(), "stage.unknown-step-id at /config/s/x [r.s.x]: no step 'x'");
    }

    #[test]
    fn test_from_issue_keeps_code() {
        let issue = SchemaIssue::new(IssueCode::UnknownKey, Path::root().child("config"), "unknown key");
        let err = CompileError::from_issue(issue);
        assert_eq!(err.code, "schema.unknown-key");
        assert_eq!(err.path.as_str(), "/config");
    }

    #[test]
    fn test_failure_summary() {
        let failure = CompileFailure {
            errors: vec![
                CompileError::new(codes::ENV_INVALID, Path::root().child("env"), "bad"),
                CompileError::new(codes::OVERRIDES_INVALID, Path::root().child("config"), "bad"),
            ],
        };
        assert!(failure.to_string().contains("2 error(s)"));
        assert!(failure.to_string().contains("and 1 more"));
        assert!(failure.has_code(codes::OVERRIDES_INVALID));
        assert!(!failure.has_code(codes::OP_RESOLVE_FAILED));
    }
}
