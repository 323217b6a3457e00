//! Errors raised while authoring ops, steps, stages and recipes, and while
//! running them.

use mapgen_context::ArtifactError;
use mapgen_core::CoreError;
use mapgen_schema::{summarize, SchemaIssue};
use thiserror::Error;

/// Construction-time error
///
/// Raised when an op, step contract or recipe is built, never during
/// compilation or execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthoringError {
    /// Op declares no strategies
    EmptyStrategies {
        /// Op id
        op: String,
    },
    /// Op has no `default` strategy
    MissingDefaultStrategy {
        /// Op id
        op: String,
    },
    /// A strategy's config shape is malformed
    InvalidStrategySchema {
        /// Op id
        op: String,
        /// Strategy id
        strategy: String,
        /// Problems found
        issues: Vec<SchemaIssue>,
    },
    /// A contract, stage or op shape is malformed
    InvalidShape {
        /// What owns the shape
        owner: String,
        /// Problems found
        issues: Vec<SchemaIssue>,
    },
    /// Step contract built without a config schema
    MissingConfigSchema {
        /// Step id
        step: String,
    },
    /// Step config schema is not an object
    ConfigNotObject {
        /// Step id
        step: String,
    },
    /// An op name shadows a config field
    OpNameCollision {
        /// Step id
        step: String,
        /// Op name
        name: String,
    },
    /// Malformed dependency tag
    InvalidTag {
        /// Step id
        step: String,
        /// Underlying error
        source: CoreError,
    },
    /// Malformed recipe, stage or instance id
    InvalidId {
        /// Why it was rejected
        reason: String,
    },
    /// Recipe built without tag definitions
    MissingTagDefinitions {
        /// Recipe id
        recipe: String,
    },
    /// A step uses a tag whose namespace is not declared
    IllegalTagNamespace {
        /// Offending tag
        tag: String,
        /// Step using it
        step_id: String,
        /// Undeclared namespace
        namespace: String,
    },
    /// Two steps share an explicit instance id
    DuplicateInstanceId {
        /// The shared id
        instance_id: String,
        /// Stage of the first step
        first_stage: String,
        /// Stage of the second step
        second_stage: String,
    },
    /// Two steps derive the same step id
    DuplicateStepId {
        /// The colliding id
        step_id: String,
    },
    /// Two stages share an id
    DuplicateStage {
        /// Stage id
        stage: String,
    },
    /// Step key collides with the stage's `knobs` entry
    ReservedStepKey {
        /// Stage id
        stage: String,
        /// Step key
        key: String,
    },
    /// Two different ops share an id
    DuplicateOpId {
        /// Op id
        op: String,
    },
    /// One artifact id declared with different specs
    ArtifactConflict {
        /// Artifact id
        artifact: String,
    },
}

impl std::fmt::Display for AuthoringError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyStrategies { op } => write!(f, "Op {} declares no strategies", op),
            Self::MissingDefaultStrategy { op } => {
                write!(f, "Op {} has no \"default\" strategy", op)
            }
            Self::InvalidStrategySchema { op, strategy, issues } => write!(
                f,
                "Op {} strategy {} has an invalid config schema: {}",
                op,
                strategy,
                summarize(issues)
            ),
            Self::InvalidShape { owner, issues } => {
                write!(f, "Invalid shape for {}: {}", owner, summarize(issues))
            }
            Self::MissingConfigSchema { step } => {
                write!(f, "Step {} must declare a config schema", step)
            }
            Self::ConfigNotObject { step } => {
                write!(f, "Step {} config schema must be an object", step)
            }
            Self::OpNameCollision { step, name } => write!(
                f,
                "Step {} op '{}' collides with a config field of the same name",
                step, name
            ),
            Self::InvalidTag { step, source } => write!(f, "Step {}: {}", step, source),
            Self::InvalidId { reason } => write!(f, "Invalid id: {}", reason),
            Self::MissingTagDefinitions { recipe } => {
                write!(f, "Recipe {} has no tag definitions", recipe)
            }
            Self::IllegalTagNamespace {
                tag,
                step_id,
                namespace,
            } => write!(
                f,
                "Step {} uses tag {} in undeclared namespace '{}'",
                step_id, tag, namespace
            ),
            Self::DuplicateInstanceId {
                instance_id,
                first_stage,
                second_stage,
            } => write!(
                f,
                "Instance id {} is used in stage {} and again in stage {}",
                instance_id, first_stage, second_stage
            ),
            Self::DuplicateStepId { step_id } => write!(f, "Duplicate step id: {}", step_id),
            Self::DuplicateStage { stage } => write!(f, "Duplicate stage: {}", stage),
            Self::ReservedStepKey { stage, key } => {
                write!(f, "Stage {} step key '{}' is reserved", stage, key)
            }
            Self::DuplicateOpId { op } => {
                write!(f, "Op id {} is registered by two different ops", op)
            }
            Self::ArtifactConflict { artifact } => write!(
                f,
                "Artifact {} is declared with conflicting shapes or policies",
                artifact
            ),
        }
    }
}

impl std::error::Error for AuthoringError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidTag { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Op invocation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpError {
    /// Selection names a strategy the op does not have
    #[error("op {op} has no strategy '{strategy}'")]
    UnknownStrategy {
        /// Op id
        op: String,
        /// Requested strategy
        strategy: String,
    },
    /// Selection value is not `{strategy, config}`
    #[error("malformed strategy selection: {reason}")]
    MalformedSelection {
        /// Why it was rejected
        reason: String,
    },
    /// Strategy config does not satisfy its schema
    #[error("op {op} config is invalid: {}", summarize(.issues))]
    InvalidConfig {
        /// Op id
        op: String,
        /// Validation issues
        issues: Vec<SchemaIssue>,
    },
    /// Input does not satisfy the op's input shape
    #[error("op {op} input is invalid: {}", summarize(.issues))]
    InvalidInput {
        /// Op id
        op: String,
        /// Validation issues
        issues: Vec<SchemaIssue>,
    },
    /// Output does not satisfy the op's output shape
    #[error("op {op} output is invalid: {}", summarize(.issues))]
    InvalidOutput {
        /// Op id
        op: String,
        /// Validation issues
        issues: Vec<SchemaIssue>,
    },
    /// A config resolver rejected the selection
    #[error("op {op} strategy {strategy} could not resolve config: {message}")]
    ResolveFailed {
        /// Op id
        op: String,
        /// Strategy id
        strategy: String,
        /// Resolver message
        message: String,
    },
    /// The strategy itself failed
    #[error("op {op} strategy {strategy} failed: {message}")]
    Failed {
        /// Op id
        op: String,
        /// Strategy id
        strategy: String,
        /// Strategy message
        message: String,
    },
}

/// Failure of a step's run body
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    /// An op call failed
    #[error(transparent)]
    Op(#[from] OpError),
    /// An artifact publish or read failed
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    /// A core operation failed
    #[error(transparent)]
    Core(#[from] CoreError),
    /// A value failed validation
    #[error("validation failed: {}", summarize(.0))]
    Schema(Vec<SchemaIssue>),
    /// Free-form failure
    #[error("{0}")]
    Message(String),
}

impl From<Vec<SchemaIssue>> for StepError {
    fn from(issues: Vec<SchemaIssue>) -> Self {
        Self::Schema(issues)
    }
}

impl From<String> for StepError {
    fn from(message: String) -> Self {
        Self::Message(message)
    }
}

impl From<&str> for StepError {
    fn from(message: &str) -> Self {
        Self::Message(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authoring_error_display() {
        let err = AuthoringError::DuplicateInstanceId {
            instance_id: "shared".to_string(),
            first_stage: "a".to_string(),
            second_stage: "b".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Instance id shared is used in stage a and again in stage b"
        );
    }

    #[test]
    fn test_step_error_conversions() {
        let err: StepError = "boom".into();
        assert_eq!(err.to_string(), "boom");

        let err: StepError = ArtifactError::NotPublished {
            id: "artifact:x".to_string(),
        }
        .into();
        assert!(err.to_string().contains("artifact:x"));

        let err: StepError = OpError::UnknownStrategy {
            op: "a/b".to_string(),
            strategy: "z".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "op a/b has no strategy 'z'");
    }

    #[test]
    fn test_invalid_tag_has_source() {
        use std::error::Error;
        let err = AuthoringError::InvalidTag {
            step: "s".to_string(),
            source: CoreError::InvalidTag {
                tag: "bad".to_string(),
                reason: "missing ':' separator".to_string(),
            },
        };
        assert!(err.source().is_some());
    }
}
