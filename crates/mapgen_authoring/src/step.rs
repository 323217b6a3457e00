//! Step contracts and steps.
//!
//! A step wraps zero or more ops into one pipeline unit. Its effective
//! config schema is its own config object plus one field per embedded op,
//! holding that op's strategy-selection schema.

use crate::error::{AuthoringError, StepError};
use crate::op::Op;
use indexmap::IndexMap;
use mapgen_context::{ArtifactSpec, MapContext};
use mapgen_core::{DependencyTag, Env};
use mapgen_schema::{Field, ObjectShape, Shape, Value};
use std::sync::Arc;

/// Declared interface of a step
#[derive(Debug, Clone)]
pub struct StepContract {
    id: String,
    description: Option<String>,
    requires: Vec<DependencyTag>,
    provides: Vec<DependencyTag>,
    config: ObjectShape,
    ops: IndexMap<String, Arc<Op>>,
    artifacts: Vec<ArtifactSpec>,
    schema: Shape,
}

impl StepContract {
    /// Start building a contract
    #[must_use]
    pub fn builder(id: impl Into<String>) -> StepContractBuilder {
        StepContractBuilder {
            id: id.into(),
            description: None,
            requires: Vec::new(),
            provides: Vec::new(),
            config: None,
            ops: IndexMap::new(),
            artifacts: Vec::new(),
        }
    }

    /// Step id within its stage
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Description
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Tags that must hold before the step runs
    #[must_use]
    pub fn requires(&self) -> &[DependencyTag] {
        &self.requires
    }

    /// Tags the step promises to make hold
    #[must_use]
    pub fn provides(&self) -> &[DependencyTag] {
        &self.provides
    }

    /// The step's own config shape, without op fields
    #[must_use]
    pub fn config(&self) -> &ObjectShape {
        &self.config
    }

    /// Embedded ops by config field name
    #[must_use]
    pub fn ops(&self) -> &IndexMap<String, Arc<Op>> {
        &self.ops
    }

    /// Artifacts the step reads or writes
    #[must_use]
    pub fn artifacts(&self) -> &[ArtifactSpec] {
        &self.artifacts
    }

    /// Effective config schema: config fields plus op selection fields
    #[must_use]
    pub fn schema(&self) -> &Shape {
        &self.schema
    }
}

/// Builder for [`StepContract`]
#[derive(Debug)]
pub struct StepContractBuilder {
    id: String,
    description: Option<String>,
    requires: Vec<String>,
    provides: Vec<String>,
    config: Option<Shape>,
    ops: IndexMap<String, Arc<Op>>,
    artifacts: Vec<ArtifactSpec>,
}

impl StepContractBuilder {
    /// Add a required tag
    #[must_use]
    pub fn requires(mut self, tag: impl Into<String>) -> Self {
        self.requires.push(tag.into());
        self
    }

    /// Add a provided tag
    #[must_use]
    pub fn provides(mut self, tag: impl Into<String>) -> Self {
        self.provides.push(tag.into());
        self
    }

    /// Set the config schema
    #[must_use]
    pub fn config(mut self, shape: impl Into<Shape>) -> Self {
        self.config = Some(shape.into());
        self
    }

    /// Embed an op under a config field name
    #[must_use]
    pub fn op(mut self, name: impl Into<String>, op: Arc<Op>) -> Self {
        self.ops.insert(name.into(), op);
        self
    }

    /// Declare an artifact the step uses
    #[must_use]
    pub fn artifact(mut self, spec: ArtifactSpec) -> Self {
        self.artifacts.push(spec);
        self
    }

    /// Set description
    #[must_use]
    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Build the contract
    ///
    /// # Errors
    ///
    /// Returns error if the config schema is missing, not an object, or
    /// malformed; a tag does not parse; or an op name shadows a config field
    pub fn build(self) -> Result<StepContract, AuthoringError> {
        let step = self.id.clone();
        let Some(shape) = self.config else {
            return Err(AuthoringError::MissingConfigSchema { step });
        };
        let Shape::Object(config) = shape else {
            return Err(AuthoringError::ConfigNotObject { step });
        };
        let parse = |tags: Vec<String>| -> Result<Vec<DependencyTag>, AuthoringError> {
            tags.iter()
                .map(|t| {
                    DependencyTag::parse(t).map_err(|source| AuthoringError::InvalidTag {
                        step: step.clone(),
                        source,
                    })
                })
                .collect()
        };
        let requires = parse(self.requires)?;
        let provides = parse(self.provides)?;

        let mut schema = config.clone();
        for (name, op) in &self.ops {
            if config.has_field(name) {
                return Err(AuthoringError::OpNameCollision {
                    step,
                    name: name.clone(),
                });
            }
            schema.fields.insert(
                name.clone(),
                Field {
                    shape: op.config_schema().clone(),
                    optional: false,
                },
            );
        }
        let schema: Shape = schema.into();
        schema.verify().map_err(|issues| AuthoringError::InvalidShape {
            owner: format!("step {} config", step),
            issues,
        })?;
        for spec in &self.artifacts {
            spec.shape.verify().map_err(|issues| AuthoringError::InvalidShape {
                owner: format!("artifact {}", spec.id),
                issues,
            })?;
        }

        Ok(StepContract {
            id: self.id,
            description: self.description,
            requires,
            provides,
            config,
            ops: self.ops,
            artifacts: self.artifacts,
            schema,
        })
    }
}

/// What a step's normalize hook can see
#[derive(Debug, Clone, Copy)]
pub struct NormalizeContext<'a> {
    /// Generation environment
    pub env: &'a Env,
    /// The stage's resolved knobs
    pub knobs: &'a Value,
    /// Owning stage id
    pub stage_id: &'a str,
}

/// Step body
pub type StepRun = Arc<dyn Fn(&mut MapContext, &Value) -> Result<(), StepError> + Send + Sync>;

/// Config rewrite applied at compile time, before op defaults
pub type NormalizeFn =
    Arc<dyn Fn(Value, &NormalizeContext<'_>) -> Result<Value, String> + Send + Sync>;

/// Run condition evaluated against the live context
pub type ShouldRunFn = Arc<dyn Fn(&MapContext, &Value) -> bool + Send + Sync>;

/// A contract plus its behavior
#[derive(Clone)]
pub struct Step {
    contract: Arc<StepContract>,
    run: StepRun,
    normalize: Option<NormalizeFn>,
    should_run: Option<ShouldRunFn>,
    instance_id: Option<String>,
}

impl Step {
    /// Create a step
    #[must_use]
    pub fn new<F>(contract: StepContract, run: F) -> Self
    where
        F: Fn(&mut MapContext, &Value) -> Result<(), StepError> + Send + Sync + 'static,
    {
        Self {
            contract: Arc::new(contract),
            run: Arc::new(run),
            normalize: None,
            should_run: None,
            instance_id: None,
        }
    }

    /// Set the normalize hook
    #[must_use]
    pub fn with_normalize<F>(mut self, normalize: F) -> Self
    where
        F: Fn(Value, &NormalizeContext<'_>) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.normalize = Some(Arc::new(normalize));
        self
    }

    /// Set the run condition
    #[must_use]
    pub fn with_should_run<F>(mut self, should_run: F) -> Self
    where
        F: Fn(&MapContext, &Value) -> bool + Send + Sync + 'static,
    {
        self.should_run = Some(Arc::new(should_run));
        self
    }

    /// Use an explicit instance id instead of the derived step id
    #[must_use]
    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = Some(instance_id.into());
        self
    }

    /// Contract
    #[must_use]
    pub fn contract(&self) -> &StepContract {
        &self.contract
    }

    /// Explicit instance id
    #[must_use]
    pub fn instance_id(&self) -> Option<&str> {
        self.instance_id.as_deref()
    }

    /// Key of the step inside its stage's raw step map
    #[must_use]
    pub fn key(&self) -> &str {
        self.instance_id.as_deref().unwrap_or(&self.contract.id)
    }

    /// Check if a normalize hook is set
    #[must_use]
    pub fn has_normalize(&self) -> bool {
        self.normalize.is_some()
    }

    /// Apply the normalize hook, or return the config unchanged
    ///
    /// # Errors
    ///
    /// Returns the hook's message on failure
    pub fn normalize(&self, config: Value, ctx: &NormalizeContext<'_>) -> Result<Value, String> {
        match &self.normalize {
            Some(normalize) => normalize(config, ctx),
            None => Ok(config),
        }
    }

    /// Evaluate the run condition; steps without one always run
    #[must_use]
    pub fn should_run(&self, ctx: &MapContext, config: &Value) -> bool {
        self.should_run.as_ref().is_none_or(|check| check(ctx, config))
    }

    /// Invoke the body
    ///
    /// # Errors
    ///
    /// Returns whatever the body returns
    pub fn run(&self, ctx: &mut MapContext, config: &Value) -> Result<(), StepError> {
        (self.run)(ctx, config)
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("id", &self.contract.id)
            .field("instance_id", &self.instance_id)
            .field("normalize", &self.normalize.is_some())
            .field("should_run", &self.should_run.is_some())
            .finish_non_exhaustive()
    }
}
