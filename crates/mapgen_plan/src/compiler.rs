//! Recipe compiler.
//!
//! Compilation walks the stages in declared order. For each stage it
//! resolves the author surface, projects it into raw step configs, and for
//! each step applies schema defaults, the step's normalize hook, op
//! resolution and a final strict check. Errors from every stage are
//! collected; a plan is produced only when there are none.

use crate::error::{codes, CompileError, CompileFailure};
use crate::plan::{ExecutionPlan, PlanNode};
use mapgen_authoring::{NormalizeContext, Recipe, RecipeStep, Stage, StageInternal, StrategySelection};
use mapgen_core::Env;
use mapgen_schema::{resolve, Map, Mode, Path, SchemaIssue, ValidationContext, Value};
use tracing::{debug, warn};

/// Compiler bound to one recipe
#[derive(Debug, Clone, Copy)]
pub struct Compiler<'r> {
    recipe: &'r Recipe,
}

/// Compile `recipe` for `env` with author `overrides`
///
/// # Errors
///
/// Returns every compile error found
pub fn compile(recipe: &Recipe, env: &Env, overrides: &Value) -> Result<ExecutionPlan, CompileFailure> {
    Compiler::new(recipe).compile(env, overrides)
}

impl<'r> Compiler<'r> {
    /// Create a compiler for a recipe
    #[must_use]
    pub fn new(recipe: &'r Recipe) -> Self {
        Self { recipe }
    }

    /// Compile a plan
    ///
    /// `overrides` is keyed by stage id; `Null` means no overrides.
    ///
    /// # Errors
    ///
    /// Returns every compile error found across all stages
    pub fn compile(&self, env: &Env, overrides: &Value) -> Result<ExecutionPlan, CompileFailure> {
        let root = Path::root().child("config");
        if let Err(e) = env.validate() {
            return Err(self.fail(vec![CompileError::new(
                codes::ENV_INVALID,
                Path::root().child("env"),
                e.to_string(),
            )]));
        }

        let empty = Map::new();
        let overrides = match overrides {
            Value::Null => &empty,
            Value::Object(map) => map,
            other => {
                return Err(self.fail(vec![CompileError::new(
                    codes::OVERRIDES_INVALID,
                    root,
                    format!("overrides must be an object, got {}", other.kind_name()),
                )]));
            }
        };

        let mut errors = Vec::new();
        for key in overrides.keys() {
            if self.recipe.stage(key).is_none() {
                errors.push(CompileError::new(
                    codes::OVERRIDES_UNKNOWN_STAGE,
                    root.child(key),
                    format!("recipe '{}' has no stage '{}'", self.recipe.id(), key),
                ));
            }
        }

        let ctx = ValidationContext::with_dimensions(env.dimensions);
        let mut nodes = Vec::with_capacity(self.recipe.steps().len());
        for stage in self.recipe.stages() {
            let before = errors.len();
            self.compile_stage(stage, overrides.get(stage.id()), env, &ctx, &mut nodes, &mut errors);
            debug!(
                recipe = %self.recipe.id(),
                stage = %stage.id(),
                errors = errors.len() - before,
                "Compiled stage"
            );
        }

        if !errors.is_empty() {
            return Err(self.fail(errors));
        }
        ExecutionPlan::new(self.recipe.id(), env.clone(), nodes).map_err(|e| {
            self.fail(vec![CompileError::new(codes::PLAN_ENCODING_FAILED, Path::root(), e.to_string())])
        })
    }

    fn fail(&self, errors: Vec<CompileError>) -> CompileFailure {
        warn!(recipe = %self.recipe.id(), errors = errors.len(), "Compilation failed");
        CompileFailure { errors }
    }

    fn compile_stage(
        &self,
        stage: &Stage,
        overrides: Option<&Value>,
        env: &Env,
        ctx: &ValidationContext,
        nodes: &mut Vec<PlanNode>,
        errors: &mut Vec<CompileError>,
    ) {
        let base = Path::root().child("config").child(stage.id());
        let attribute = |e: CompileError| e.with_stage(stage.id());

        let surface = match resolve(&stage.surface_schema(), overrides, &base, ctx, Mode::ApplyDefaults) {
            Ok(surface) => surface,
            Err(issues) => {
                errors.extend(issues.into_iter().map(CompileError::from_issue).map(attribute));
                return;
            }
        };

        let StageInternal { knobs, raw_steps } = match stage.to_internal(env, &surface) {
            Ok(internal) => internal,
            Err(message) => {
                errors.push(attribute(CompileError::new(codes::STAGE_TO_INTERNAL_FAILED, base, message)));
                return;
            }
        };

        for key in raw_steps.keys() {
            if stage.find_step(key).is_none() {
                errors.push(attribute(CompileError::new(
                    codes::STAGE_UNKNOWN_STEP_ID,
                    base.child(key),
                    format!("stage '{}' has no step '{}'", stage.id(), key),
                )));
            }
        }

        let steps = self.recipe.steps().iter().filter(|s| s.stage_id == stage.id());
        for recipe_step in steps {
            let key = recipe_step.step.key();
            let path = base.child(key);
            let normalize_ctx = NormalizeContext {
                env,
                knobs: &knobs,
                stage_id: stage.id(),
            };
            match compile_step(recipe_step, raw_steps.get(key), &path, &normalize_ctx, ctx) {
                Ok(config) => nodes.push(PlanNode {
                    step_id: recipe_step.id.clone(),
                    stage_id: stage.id().to_string(),
                    config,
                }),
                Err(step_errors) => errors.extend(
                    step_errors
                        .into_iter()
                        .map(|e| attribute(e).with_step(recipe_step.id.clone())),
                ),
            }
        }
    }
}

fn schema_errors(issues: Vec<SchemaIssue>) -> Vec<CompileError> {
    issues.into_iter().map(CompileError::from_issue).collect()
}

/// Defaults, normalize, op resolution, strict re-check
fn compile_step(
    recipe_step: &RecipeStep,
    raw: Option<&Value>,
    path: &Path,
    normalize_ctx: &NormalizeContext<'_>,
    ctx: &ValidationContext,
) -> Result<Value, Vec<CompileError>> {
    let contract = recipe_step.step.contract();
    let config = resolve(contract.schema(), raw, path, ctx, Mode::ApplyDefaults).map_err(schema_errors)?;

    let mut config = recipe_step
        .step
        .normalize(config, normalize_ctx)
        .map_err(|message| vec![CompileError::new(codes::STEP_NORMALIZE_FAILED, path.clone(), message)])?;

    let mut errors = Vec::new();
    for (name, op) in contract.ops() {
        let op_path = path.child(name);
        let selection = match resolve(op.config_schema(), config.get(name), &op_path, ctx, Mode::ApplyDefaults) {
            Ok(selection) => selection,
            Err(issues) => {
                errors.extend(schema_errors(issues));
                continue;
            }
        };
        let resolved = StrategySelection::try_from(&selection)
            .and_then(|selection| op.resolve_config(&selection, normalize_ctx.env));
        match resolved {
            Ok(selection) => {
                config.insert(name.clone(), selection.to_value());
            }
            Err(e) => errors.push(CompileError::new(codes::OP_RESOLVE_FAILED, op_path, e.to_string())),
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    resolve(contract.schema(), Some(&config), path, ctx, Mode::Strict).map_err(schema_errors)
}
