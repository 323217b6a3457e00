//! Human-readable rendering of plans, reports and recipes.

use console::style;
use mapgen_authoring::Recipe;
use mapgen_context::ArtifactPolicy;
use mapgen_plan::{CompileFailure, ExecutionPlan};
use mapgen_runtime::{RunReport, StepStatus};
use serde_json::json;
use std::fmt::Write;

fn policy_name(policy: ArtifactPolicy) -> &'static str {
    match policy {
        ArtifactPolicy::OnceOnly => "once-only",
        ArtifactPolicy::Overwritable => "overwritable",
    }
}

fn join<T: ToString>(items: &[T]) -> String {
    if items.is_empty() {
        return "-".to_string();
    }
    items.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Summary of a compiled plan
#[must_use]
pub fn plan_summary(plan: &ExecutionPlan) -> String {
    let env = plan.env();
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {} ({} steps, seed {}, {}x{})",
        style("plan").bold(),
        plan.recipe_id(),
        plan.len(),
        env.seed,
        env.dimensions.width,
        env.dimensions.height
    );
    for (index, node) in plan.nodes().iter().enumerate() {
        let config = serde_json::to_string(&node.config).unwrap_or_default();
        let _ = writeln!(out, "  {:>2}. {} {}", index + 1, node.step_id, style(config).dim());
    }
    let _ = writeln!(out, "fingerprint {}", style(plan.fingerprint()).cyan());
    let _ = write!(out, "run id      {}", plan.run_id());
    out
}

/// Every compile error, one per line
#[must_use]
pub fn compile_errors(failure: &CompileFailure) -> String {
    let mut out = String::new();
    for error in &failure.errors {
        let _ = writeln!(out, "{} {}", style("error").red().bold(), error);
    }
    out
}

/// Per-step outcomes and the trace digest
#[must_use]
pub fn run_report(report: &RunReport) -> String {
    let mut out = String::new();
    for outcome in &report.per_step {
        let status = match outcome.status {
            StepStatus::Succeeded => style(outcome.status.as_str()).green(),
            StepStatus::Skipped => style(outcome.status.as_str()).yellow(),
            StepStatus::Failed => style(outcome.status.as_str()).red(),
        };
        let _ = write!(out, "{:>9}  {}", status, outcome.step_id);
        if let Some(error) = &outcome.error {
            let _ = write!(out, "  {}", style(error).red());
        }
        out.push('\n');
    }
    let metrics = &report.metrics;
    let _ = writeln!(
        out,
        "{} succeeded, {} failed, {} skipped, {} tags credited",
        metrics.steps_succeeded, metrics.steps_failed, metrics.steps_skipped, metrics.tags_credited
    );
    let _ = write!(out, "trace digest {}", style(report.trace_digest).cyan());
    out
}

/// Stages, steps, tags and artifacts of a recipe
#[must_use]
pub fn describe(recipe: &Recipe) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} {}", style("recipe").bold(), recipe.id());
    for stage in recipe.stages() {
        let _ = writeln!(out, "stage {}", style(stage.id()).bold());
        for step in recipe.steps().iter().filter(|s| s.stage_id == stage.id()) {
            let contract = step.step.contract();
            let _ = writeln!(out, "  step {}", step.id);
            let _ = writeln!(out, "    requires {}", join(contract.requires()));
            let _ = writeln!(out, "    provides {}", join(contract.provides()));
            for (name, op) in contract.ops() {
                let strategies: Vec<&str> = op.strategy_ids().collect();
                let _ = writeln!(out, "    op {} = {} [{}]", name, op.id(), strategies.join(", "));
            }
        }
    }
    let _ = writeln!(out, "{}", style("tags").bold());
    for (tag, predicate) in recipe.tags().definitions() {
        let _ = writeln!(out, "  {:<32} {}", tag.to_string(), predicate.kind_name());
    }
    let _ = write!(out, "{}", style("artifacts").bold());
    for spec in recipe.artifacts() {
        let _ = write!(out, "\n  {:<32} {}", spec.id, policy_name(spec.policy));
    }
    out
}

/// [`describe`] as JSON
#[must_use]
pub fn describe_json(recipe: &Recipe) -> serde_json::Value {
    let steps: Vec<_> = recipe
        .steps()
        .iter()
        .map(|s| {
            let contract = s.step.contract();
            json!({
                "id": s.id,
                "stage": s.stage_id,
                "requires": contract.requires().iter().map(ToString::to_string).collect::<Vec<_>>(),
                "provides": contract.provides().iter().map(ToString::to_string).collect::<Vec<_>>(),
                "ops": contract.ops().iter().map(|(name, op)| (name.clone(), json!(op.id()))).collect::<serde_json::Map<_, _>>(),
            })
        })
        .collect();
    let tags: serde_json::Map<_, _> = recipe
        .tags()
        .definitions()
        .map(|(tag, predicate)| (tag.to_string(), json!(predicate.kind_name())))
        .collect();
    let artifacts: serde_json::Map<_, _> = recipe
        .artifacts()
        .map(|spec| (spec.id.clone(), json!(policy_name(spec.policy))))
        .collect();
    json!({
        "recipe": recipe.id(),
        "stages": recipe.stages().iter().map(|s| s.id()).collect::<Vec<_>>(),
        "steps": steps,
        "tags": tags,
        "artifacts": artifacts,
    })
}
