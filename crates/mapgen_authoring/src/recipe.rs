//! Recipes: ordered stages composed into a full pipeline.
//!
//! All structural checks happen in [`RecipeBuilder::build`], so a recipe
//! that exists is always well formed. Compilation and execution never see
//! a duplicate id or an undeclared tag namespace.

use crate::catalog::OpCatalog;
use crate::error::AuthoringError;
use crate::stage::{Stage, KNOBS_KEY};
use crate::step::Step;
use indexmap::IndexMap;
use mapgen_context::{ArtifactError, ArtifactSpec, ArtifactStore, TagRegistry};
use mapgen_core::StepId;
use std::collections::HashMap;

/// A step placed in a recipe
#[derive(Debug, Clone)]
pub struct RecipeStep {
    /// Derived or explicit step id
    pub id: StepId,
    /// Index of the owning stage
    pub stage_index: usize,
    /// Owning stage id
    pub stage_id: String,
    /// The step
    pub step: Step,
}

/// A validated, immutable pipeline definition
#[derive(Debug, Clone)]
pub struct Recipe {
    id: String,
    tags: TagRegistry,
    stages: Vec<Stage>,
    steps: Vec<RecipeStep>,
    index: HashMap<StepId, usize>,
    ops: OpCatalog,
    artifacts: IndexMap<String, ArtifactSpec>,
}

impl Recipe {
    /// Start building a recipe
    #[must_use]
    pub fn builder(id: impl Into<String>) -> RecipeBuilder {
        RecipeBuilder {
            id: id.into(),
            tags: None,
            stages: Vec::new(),
        }
    }

    /// Recipe id
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Tag definitions
    #[must_use]
    pub fn tags(&self) -> &TagRegistry {
        &self.tags
    }

    /// Stages, in declared order
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Find a stage by id
    #[must_use]
    pub fn stage(&self, id: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.id() == id)
    }

    /// All steps, in declared order
    #[must_use]
    pub fn steps(&self) -> &[RecipeStep] {
        &self.steps
    }

    /// Find a step by id
    #[must_use]
    pub fn step(&self, id: &StepId) -> Option<&RecipeStep> {
        self.index.get(id).map(|&i| &self.steps[i])
    }

    /// Every op used by the recipe
    #[must_use]
    pub fn ops(&self) -> &OpCatalog {
        &self.ops
    }

    /// Every artifact declared by the recipe's steps
    pub fn artifacts(&self) -> impl Iterator<Item = &ArtifactSpec> {
        self.artifacts.values()
    }

    /// Declare the recipe's artifacts in a store
    ///
    /// # Errors
    ///
    /// Returns error if the store already holds a conflicting declaration
    pub fn declare_artifacts(&self, store: &mut ArtifactStore) -> Result<(), ArtifactError> {
        for spec in self.artifacts.values() {
            store.declare(spec.clone())?;
        }
        Ok(())
    }
}

/// Builder for [`Recipe`]
#[derive(Debug)]
pub struct RecipeBuilder {
    id: String,
    tags: Option<TagRegistry>,
    stages: Vec<Stage>,
}

fn check_id(kind: &str, id: &str) -> Result<(), AuthoringError> {
    if id.is_empty() || id.contains('.') || id.chars().any(char::is_whitespace) {
        return Err(AuthoringError::InvalidId {
            reason: format!("{} id '{}' must be non-empty without dots or whitespace", kind, id),
        });
    }
    Ok(())
}

impl RecipeBuilder {
    /// Set tag definitions
    #[must_use]
    pub fn tags(mut self, tags: TagRegistry) -> Self {
        self.tags = Some(tags);
        self
    }

    /// Append a stage
    #[must_use]
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Validate and build
    ///
    /// # Errors
    ///
    /// Returns error if tag definitions are missing, a tag namespace is
    /// undeclared, ids collide, or ops or artifacts conflict
    pub fn build(self) -> Result<Recipe, AuthoringError> {
        check_id("recipe", &self.id)?;
        let Some(tags) = self.tags else {
            return Err(AuthoringError::MissingTagDefinitions { recipe: self.id });
        };

        let mut steps = Vec::new();
        let mut index = HashMap::new();
        let mut instance_stages: HashMap<String, String> = HashMap::new();
        let mut ops = OpCatalog::new();
        let mut artifacts: IndexMap<String, ArtifactSpec> = IndexMap::new();

        for (stage_index, stage) in self.stages.iter().enumerate() {
            check_id("stage", stage.id())?;
            if self.stages[..stage_index].iter().any(|s| s.id() == stage.id()) {
                return Err(AuthoringError::DuplicateStage {
                    stage: stage.id().to_string(),
                });
            }
            for step in stage.steps() {
                if stage.has_default_surface() && step.key() == KNOBS_KEY {
                    return Err(AuthoringError::ReservedStepKey {
                        stage: stage.id().to_string(),
                        key: step.key().to_string(),
                    });
                }
                let id = match step.instance_id() {
                    Some(instance_id) => {
                        if let Some(first_stage) = instance_stages.get(instance_id) {
                            return Err(AuthoringError::DuplicateInstanceId {
                                instance_id: instance_id.to_string(),
                                first_stage: first_stage.clone(),
                                second_stage: stage.id().to_string(),
                            });
                        }
                        instance_stages.insert(instance_id.to_string(), stage.id().to_string());
                        StepId::explicit(instance_id).map_err(|e| AuthoringError::InvalidId {
                            reason: e.to_string(),
                        })?
                    }
                    None => {
                        check_id("step", step.key())?;
                        StepId::derive(&self.id, stage.id(), step.key())
                    }
                };
                if index.contains_key(&id) {
                    return Err(AuthoringError::DuplicateStepId {
                        step_id: id.to_string(),
                    });
                }

                let contract = step.contract();
                for tag in contract.requires().iter().chain(contract.provides()) {
                    if !tags.has_namespace(tag.namespace()) {
                        return Err(AuthoringError::IllegalTagNamespace {
                            tag: tag.to_string(),
                            step_id: id.to_string(),
                            namespace: tag.namespace().to_string(),
                        });
                    }
                }
                for op in contract.ops().values() {
                    ops.register(op.clone())?;
                }
                for spec in contract.artifacts() {
                    match artifacts.get(&spec.id) {
                        Some(existing) if existing != spec => {
                            return Err(AuthoringError::ArtifactConflict {
                                artifact: spec.id.clone(),
                            });
                        }
                        Some(_) => {}
                        None => {
                            artifacts.insert(spec.id.clone(), spec.clone());
                        }
                    }
                }

                index.insert(id.clone(), steps.len());
                steps.push(RecipeStep {
                    id,
                    stage_index,
                    stage_id: stage.id().to_string(),
                    step: step.clone(),
                });
            }
        }

        Ok(Recipe {
            id: self.id,
            tags,
            stages: self.stages,
            steps,
            index,
            ops,
            artifacts,
        })
    }
}
