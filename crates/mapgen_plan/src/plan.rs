//! The compiled, immutable execution plan.

use mapgen_core::{Env, Hash, RunId, StepId};
use mapgen_schema::{canonical_bytes_of, Value};
use serde::Serialize;

/// One fully resolved step invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanNode {
    /// Step id
    pub step_id: StepId,
    /// Owning stage
    pub stage_id: String,
    /// Resolved config, op selections included
    pub config: Value,
}

/// Ordered plan nodes for one `(recipe, env, overrides)` triple
///
/// Fields are private; a plan cannot be edited after compilation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    recipe_id: String,
    env: Env,
    nodes: Vec<PlanNode>,
    fingerprint: Hash,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Fingerprinted<'a> {
    recipe_id: &'a str,
    env: &'a Env,
    nodes: &'a [PlanNode],
}

impl ExecutionPlan {
    /// Seal a plan and compute its fingerprint
    ///
    /// # Errors
    ///
    /// Returns error if the plan cannot be canonically encoded
    pub fn new(
        recipe_id: impl Into<String>,
        env: Env,
        nodes: Vec<PlanNode>,
    ) -> Result<Self, serde_json::Error> {
        let recipe_id = recipe_id.into();
        let bytes = canonical_bytes_of(&Fingerprinted {
            recipe_id: &recipe_id,
            env: &env,
            nodes: &nodes,
        })?;
        Ok(Self {
            recipe_id,
            env,
            nodes,
            fingerprint: Hash::compute(&bytes),
        })
    }

    /// Recipe the plan was compiled from
    #[must_use]
    pub fn recipe_id(&self) -> &str {
        &self.recipe_id
    }

    /// Environment the plan was compiled for
    #[must_use]
    pub fn env(&self) -> &Env {
        &self.env
    }

    /// Nodes in execution order
    #[must_use]
    pub fn nodes(&self) -> &[PlanNode] {
        &self.nodes
    }

    /// Find a node by step id
    #[must_use]
    pub fn node(&self, step_id: &StepId) -> Option<&PlanNode> {
        self.nodes.iter().find(|n| &n.step_id == step_id)
    }

    /// Number of nodes
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// BLAKE3 hash of the canonical encoding
    #[must_use]
    pub fn fingerprint(&self) -> Hash {
        self.fingerprint
    }

    /// Run id derived from the fingerprint
    #[must_use]
    pub fn run_id(&self) -> RunId {
        RunId::from_fingerprint(&self.fingerprint)
    }
}
