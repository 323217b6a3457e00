//! Pipeline executor.
//!
//! Each plan node moves from pending to skipped, or through running to
//! succeeded or failed. Provided tags are credited all at once and only
//! when the body returned and every provided predicate holds afterwards.

use crate::monitor::Metrics;
use crate::report::{RunReport, StepOutcome};
use mapgen_authoring::Recipe;
use mapgen_context::{ArtifactError, ContextError, MapContext, TraceEventKind};
use mapgen_core::{DependencyTag, TagSet};
use mapgen_plan::{ExecutionPlan, PlanNode};
use std::time::Instant;
use tracing::{info, warn};

/// Preconditions that stop a run before any step executes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// The plan was compiled from another recipe
    RecipeMismatch {
        /// Recipe named by the plan
        plan: String,
        /// Recipe handed to the executor
        recipe: String,
    },
    /// The plan was compiled for another environment
    EnvMismatch,
    /// The context already hosted a run
    ContextReused {
        /// Seed of the context
        seed: u64,
    },
    /// Recipe artifacts could not be declared on the context
    ArtifactDeclaration {
        /// Underlying error
        source: ArtifactError,
    },
}

impl std::fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RecipeMismatch { plan, recipe } => {
                write!(f, "Plan was compiled for recipe '{}', not '{}'", plan, recipe)
            }
            Self::EnvMismatch => write!(f, "Plan environment differs from the context environment"),
            Self::ContextReused { seed } => {
                write!(f, "Map context (seed {}) has already hosted a run", seed)
            }
            Self::ArtifactDeclaration { source } => {
                write!(f, "Artifact declaration failed: {}", source)
            }
        }
    }
}

impl std::error::Error for ExecutorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ArtifactDeclaration { source } => Some(source),
            _ => None,
        }
    }
}

impl From<ContextError> for ExecutorError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Reused { seed } => Self::ContextReused { seed },
        }
    }
}

fn join_tags(tags: &[&DependencyTag]) -> String {
    tags.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Replays compiled plans for one recipe
#[derive(Debug, Clone, Copy)]
pub struct PipelineExecutor<'r> {
    recipe: &'r Recipe,
}

impl<'r> PipelineExecutor<'r> {
    /// Create an executor for a recipe
    #[must_use]
    pub fn new(recipe: &'r Recipe) -> Self {
        Self { recipe }
    }

    /// Run every plan node in order against `ctx`
    ///
    /// Step failures are recorded in the report; they never abort the run.
    ///
    /// # Errors
    ///
    /// Returns error if the plan belongs to another recipe or environment,
    /// the context was used before, or artifacts cannot be declared
    pub fn execute(&self, plan: &ExecutionPlan, ctx: &mut MapContext) -> Result<RunReport, ExecutorError> {
        if plan.recipe_id() != self.recipe.id() {
            return Err(ExecutorError::RecipeMismatch {
                plan: plan.recipe_id().to_string(),
                recipe: self.recipe.id().to_string(),
            });
        }
        if plan.env() != ctx.env() {
            return Err(ExecutorError::EnvMismatch);
        }
        ctx.begin_run()?;
        self.recipe
            .declare_artifacts(ctx.artifacts_mut())
            .map_err(|source| ExecutorError::ArtifactDeclaration { source })?;

        let run_id = plan.run_id();
        ctx.trace_mut().record(
            TraceEventKind::RunStarted,
            None,
            true,
            format!("{} {}", plan.recipe_id(), plan.fingerprint().short()),
        );
        info!(recipe = %plan.recipe_id(), run_id = %run_id, steps = plan.len(), "Run started");

        let run_started = Instant::now();
        let mut satisfied = TagSet::new();
        let mut metrics = Metrics::new();
        let mut per_step = Vec::with_capacity(plan.len());
        for (index, node) in plan.nodes().iter().enumerate() {
            let position = format!("{}/{}", index + 1, plan.len());
            let outcome = self.run_node(&position, node, ctx, &mut satisfied, &mut metrics);
            per_step.push(outcome);
        }

        let success = per_step.iter().all(|o| o.success);
        ctx.trace_mut().record(
            TraceEventKind::RunFinished,
            None,
            success,
            format!("{} ok, {} failed, {} skipped", metrics.steps_succeeded, metrics.steps_failed, metrics.steps_skipped),
        );
        info!(
            run_id = %run_id,
            success,
            succeeded = metrics.steps_succeeded,
            failed = metrics.steps_failed,
            skipped = metrics.steps_skipped,
            elapsed_ms = run_started.elapsed().as_millis() as u64,
            "Run finished"
        );

        Ok(RunReport {
            success,
            per_step,
            metrics,
            trace_digest: ctx.trace().digest(),
        })
    }

    fn run_node(
        &self,
        position: &str,
        node: &PlanNode,
        ctx: &mut MapContext,
        satisfied: &mut TagSet,
        metrics: &mut Metrics,
    ) -> StepOutcome {
        let step_id = &node.step_id;
        let fail = |ctx: &mut MapContext, metrics: &mut Metrics, message: String| {
            ctx.trace_mut()
                .record(TraceEventKind::StepFinished, Some(step_id), false, message.as_str());
            metrics.record_failure();
            StepOutcome::failed(step_id.clone(), message)
        };

        let Some(recipe_step) = self.recipe.step(step_id) else {
            warn!(step = %position, step_id = %step_id, status = "fail", "Unknown step");
            return fail(ctx, metrics, format!("unknown step '{}'", step_id));
        };
        let step = &recipe_step.step;
        let contract = step.contract();
        let tags = self.recipe.tags();

        if !step.should_run(ctx, &node.config) {
            ctx.trace_mut()
                .record(TraceEventKind::StepSkipped, Some(step_id), true, "");
            info!(step = %position, step_id = %step_id, status = "skip", "Step skipped");
            metrics.record_skip();
            return StepOutcome::skipped(step_id.clone());
        }

        let missing = tags.unmet(contract.requires(), ctx, satisfied);
        if !missing.is_empty() {
            let message = format!(
                "missing required tag: {} (stage '{}', step '{}')",
                join_tags(&missing),
                recipe_step.stage_id,
                step_id
            );
            warn!(step = %position, step_id = %step_id, status = "fail", missing = %join_tags(&missing), "Requires not satisfied");
            return fail(ctx, metrics, message);
        }

        ctx.trace_mut()
            .record(TraceEventKind::StepStarted, Some(step_id), true, "");
        info!(step = %position, step_id = %step_id, status = "start", "Step started");
        let started = Instant::now();
        metrics.record_execution();
        let result = step.run(ctx, &node.config);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        if let Err(err) = result {
            info!(step = %position, step_id = %step_id, status = "fail", elapsed_ms, error = %err, "Step failed");
            return fail(ctx, metrics, err.to_string());
        }

        // Flags hold by declaration; live predicates are checked against the post-run context.
        let mut claimed = satisfied.clone();
        claimed.extend(contract.provides());
        let unmet = tags.unmet(contract.provides(), ctx, &claimed);
        if !unmet.is_empty() {
            let message = format!(
                "declared provides not satisfied: {} (stage '{}', step '{}')",
                join_tags(&unmet),
                recipe_step.stage_id,
                step_id
            );
            warn!(step = %position, step_id = %step_id, status = "fail", elapsed_ms, unmet = %join_tags(&unmet), "Provides not satisfied");
            return fail(ctx, metrics, message);
        }

        satisfied.extend(contract.provides());
        metrics.record_credit(contract.provides().len());
        metrics.record_success();
        ctx.trace_mut()
            .record(TraceEventKind::StepFinished, Some(step_id), true, "");
        info!(step = %position, step_id = %step_id, status = "ok", elapsed_ms, "Step finished");
        StepOutcome::succeeded(step_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::StepStatus;
    use mapgen_authoring::{Stage, Step, StepContract, StepError};
    use mapgen_context::{ArtifactSpec, MockAdapter, TagRegistry};
    use mapgen_core::{Dimensions, Env, StepId};
    use mapgen_plan::compile;
    use mapgen_schema::{BooleanShape, BufferKind, BufferShape, ObjectShape, Value};

    fn env(seed: u64) -> Env {
        Env::new(seed, Dimensions::new(4, 3))
    }

    fn context(env: &Env) -> MapContext {
        MapContext::new(env.clone(), Box::new(MockAdapter::new(env)))
    }

    fn registry() -> TagRegistry {
        let mut tags = TagRegistry::new(["field", "artifact", "effect"]);
        tags.define_buffer("field:elevation", "elevation", Some(BufferKind::I16)).unwrap();
        tags.define_artifact("artifact:climateField", "artifact:climateField").unwrap();
        tags.define_flag("effect:ready").unwrap();
        tags
    }

    fn climate_spec() -> ArtifactSpec {
        ArtifactSpec::new(
            "artifact:climateField",
            ObjectShape::new().field("rainfall", BufferShape::per_tile(BufferKind::U8)),
        )
    }

    fn write_elevation(ctx: &mut MapContext, _: &Value) -> Result<(), StepError> {
        let area = ctx.dimensions().area();
        ctx.fields_mut().ensure("elevation", BufferKind::I16, area);
        Ok(())
    }

    fn do_nothing(_: &mut MapContext, _: &Value) -> Result<(), StepError> {
        Ok(())
    }

    fn contract(id: &str, requires: &[&str], provides: &[&str]) -> StepContract {
        let mut builder = StepContract::builder(id).config(ObjectShape::new());
        for tag in requires {
            builder = builder.requires(*tag);
        }
        for tag in provides {
            builder = builder.provides(*tag);
        }
        builder.build().unwrap()
    }

    fn run(recipe: &Recipe, seed: u64) -> (RunReport, MapContext) {
        let env = env(seed);
        let plan = compile(recipe, &env, &Value::Null).unwrap();
        let mut ctx = context(&env);
        let report = PipelineExecutor::new(recipe).execute(&plan, &mut ctx).unwrap();
        (report, ctx)
    }

    fn id(step: &str) -> StepId {
        StepId::derive("r", "s", step)
    }

    #[test]
    fn test_provides_credited_for_later_steps() {
        let recipe = Recipe::builder("r")
            .tags(registry())
            .stage(
                Stage::new("s")
                    .step(Step::new(contract("make", &[], &["field:elevation", "effect:ready"]), write_elevation))
                    .step(Step::new(contract("use", &["field:elevation", "effect:ready"], &[]), do_nothing)),
            )
            .build()
            .unwrap();
        let (report, _) = run(&recipe, 1);
        assert!(report.success);
        assert_eq!(report.metrics.steps_succeeded, 2);
        assert_eq!(report.metrics.tags_credited, 2);
    }

    #[test]
    fn test_unmet_provides_fails_step() {
        let recipe = Recipe::builder("r")
            .tags(registry())
            .stage(
                Stage::new("s")
                    .step(Step::new(contract("make", &[], &["field:elevation", "effect:ready"]), do_nothing))
                    .step(Step::new(contract("use", &["effect:ready"], &[]), do_nothing)),
            )
            .build()
            .unwrap();
        let (report, _) = run(&recipe, 1);
        assert!(!report.success);

        let make = report.outcome(&id("make")).unwrap();
        assert_eq!(make.status, StepStatus::Failed);
        let error = make.error.as_deref().unwrap();
        assert!(error.contains("provides"));
        assert!(error.contains("field:elevation"));
        assert!(!error.contains("effect:ready"));

        // Crediting is all-or-nothing: the flag was not credited either.
        let used = report.outcome(&id("use")).unwrap();
        assert!(used.error.as_deref().unwrap().contains("missing required tag: effect:ready"));
        assert_eq!(report.metrics.steps_executed, 1);
    }

    #[test]
    fn test_failing_body_credits_nothing() {
        let failing = Step::new(contract("make", &[], &["effect:ready"]), |_: &mut MapContext, _: &Value| {
            Err(StepError::from("tectonics diverged"))
        });
        let recipe = Recipe::builder("r")
            .tags(registry())
            .stage(
                Stage::new("s")
                    .step(failing)
                    .step(Step::new(contract("use", &["effect:ready"], &[]), do_nothing))
                    .step(Step::new(contract("independent", &[], &[]), do_nothing)),
            )
            .build()
            .unwrap();
        let (report, _) = run(&recipe, 1);
        assert_eq!(report.outcome(&id("make")).unwrap().error.as_deref(), Some("tectonics diverged"));
        assert_eq!(report.outcome(&id("use")).unwrap().status, StepStatus::Failed);
        assert_eq!(report.outcome(&id("independent")).unwrap().status, StepStatus::Succeeded);
        assert_eq!(report.metrics.steps_failed, 2);
    }

    #[test]
    fn test_skipped_step_succeeds_without_credit() {
        let gated = Step::new(
            StepContract::builder("gated")
                .config(ObjectShape::new().field("enabled", BooleanShape::new().with_default(false)))
                .provides("effect:ready")
                .build()
                .unwrap(),
            do_nothing,
        )
        .with_should_run(|_: &MapContext, config: &Value| config.get("enabled").and_then(Value::as_bool).unwrap_or(true));
        let recipe = Recipe::builder("r")
            .tags(registry())
            .stage(
                Stage::new("s")
                    .step(gated)
                    .step(Step::new(contract("use", &["effect:ready"], &[]), do_nothing)),
            )
            .build()
            .unwrap();
        let (report, _) = run(&recipe, 1);
        let gated = report.outcome(&id("gated")).unwrap();
        assert_eq!(gated.status, StepStatus::Skipped);
        assert!(gated.success);
        assert_eq!(report.outcome(&id("use")).unwrap().status, StepStatus::Failed);
        assert_eq!(report.metrics.steps_skipped, 1);
    }

    #[test]
    fn test_artifact_tag_satisfied_after_publish() {
        let publish = Step::new(
            StepContract::builder("climate")
                .config(ObjectShape::new())
                .artifact(climate_spec())
                .provides("artifact:climateField")
                .build()
                .unwrap(),
            |ctx: &mut MapContext, _: &Value| {
                let area = ctx.dimensions().area();
                let rainfall = mapgen_schema::Buffer::zeroed(BufferKind::U8, area);
                ctx.publish_artifact("artifact:climateField", Value::object().with("rainfall", rainfall))?;
                Ok(())
            },
        );
        let recipe = Recipe::builder("r")
            .tags(registry())
            .stage(
                Stage::new("s")
                    .step(publish)
                    .step(Step::new(contract("use", &["artifact:climateField"], &[]), do_nothing)),
            )
            .build()
            .unwrap();

        let env = env(3);
        let mut fresh = context(&env);
        recipe.declare_artifacts(fresh.artifacts_mut()).unwrap();
        let tag = DependencyTag::parse("artifact:climateField").unwrap();
        assert!(!recipe.tags().is_satisfied(&tag, &fresh, &TagSet::new()));

        let (report, ctx) = run(&recipe, 3);
        assert!(report.success);
        assert!(recipe.tags().is_satisfied(&tag, &ctx, &TagSet::new()));
    }

    #[test]
    fn test_invalid_artifact_payload_fails_step() {
        let publish = Step::new(
            StepContract::builder("climate")
                .config(ObjectShape::new())
                .artifact(climate_spec())
                .build()
                .unwrap(),
            |ctx: &mut MapContext, _: &Value| {
                let short = mapgen_schema::Buffer::zeroed(BufferKind::U8, 2);
                ctx.publish_artifact("artifact:climateField", Value::object().with("rainfall", short))?;
                Ok(())
            },
        );
        let recipe = Recipe::builder("r")
            .tags(registry())
            .stage(Stage::new("s").step(publish))
            .build()
            .unwrap();
        let (report, ctx) = run(&recipe, 1);
        assert!(!report.success);
        assert!(report.per_step[0].error.as_deref().unwrap().contains("schema.buffer-length"));
        assert_eq!(ctx.artifacts().publish_count("artifact:climateField"), 0);
    }

    #[test]
    fn test_context_reuse_rejected() {
        let recipe = Recipe::builder("r")
            .tags(registry())
            .stage(Stage::new("s").step(Step::new(contract("a", &[], &[]), do_nothing)))
            .build()
            .unwrap();
        let env = env(1);
        let plan = compile(&recipe, &env, &Value::Null).unwrap();
        let mut ctx = context(&env);
        let executor = PipelineExecutor::new(&recipe);
        executor.execute(&plan, &mut ctx).unwrap();
        assert_eq!(
            executor.execute(&plan, &mut ctx).unwrap_err(),
            ExecutorError::ContextReused { seed: 1 }
        );
    }

    #[test]
    fn test_plan_preconditions() {
        let recipe = Recipe::builder("r")
            .tags(registry())
            .stage(Stage::new("s").step(Step::new(contract("a", &[], &[]), do_nothing)))
            .build()
            .unwrap();
        let other = Recipe::builder("other")
            .tags(registry())
            .stage(Stage::new("s").step(Step::new(contract("a", &[], &[]), do_nothing)))
            .build()
            .unwrap();
        let plan = compile(&other, &env(1), &Value::Null).unwrap();
        let err = PipelineExecutor::new(&recipe).execute(&plan, &mut context(&env(1))).unwrap_err();
        assert!(matches!(err, ExecutorError::RecipeMismatch { .. }));

        let plan = compile(&recipe, &env(1), &Value::Null).unwrap();
        let mut ctx = context(&env(2));
        let err = PipelineExecutor::new(&recipe).execute(&plan, &mut ctx).unwrap_err();
        assert_eq!(err, ExecutorError::EnvMismatch);
        assert!(!ctx.has_run());
    }

    #[test]
    fn test_unknown_plan_node() {
        let recipe = Recipe::builder("r")
            .tags(registry())
            .stage(Stage::new("s").step(Step::new(contract("a", &[], &[]), do_nothing)))
            .build()
            .unwrap();
        let node = PlanNode {
            step_id: id("ghost"),
            stage_id: "s".to_string(),
            config: Value::object(),
        };
        let plan = ExecutionPlan::new("r", env(1), vec![node]).unwrap();
        let report = PipelineExecutor::new(&recipe).execute(&plan, &mut context(&env(1))).unwrap();
        assert!(report.per_step[0].error.as_deref().unwrap().contains("unknown step"));
    }

    #[test]
    fn test_trace_digest_is_reproducible() {
        let draw = Step::new(contract("draw", &[], &["effect:ready"]), |ctx: &mut MapContext, _: &Value| {
            let value = ctx.draw(100, "plates");
            ctx.fields_mut().ensure("elevation", BufferKind::I16, 1);
            if value >= 100 {
                return Err(StepError::from("draw out of range"));
            }
            Ok(())
        });
        let recipe = Recipe::builder("r")
            .tags(registry())
            .stage(Stage::new("s").step(draw))
            .build()
            .unwrap();
        let (first, first_ctx) = run(&recipe, 9);
        let (second, _) = run(&recipe, 9);
        assert_eq!(first.trace_digest, second.trace_digest);
        assert_eq!(first_ctx.trace().len(), 4);
        assert_eq!(first_ctx.rng().ordinal("plates"), 1);
    }
}
