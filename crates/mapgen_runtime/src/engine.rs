//! Compile-and-execute front end.
//!
//! Owns a recipe and builds a fresh context for every generation, so no
//! state survives from one run to the next.

use crate::executor::{ExecutorError, PipelineExecutor};
use crate::report::RunReport;
use mapgen_authoring::Recipe;
use mapgen_context::{MapAdapter, MapContext, MockAdapter, TraceLog};
use mapgen_core::{Env, Hash};
use mapgen_plan::{CompileFailure, Compiler, ExecutionPlan};
use mapgen_schema::Value;
use thiserror::Error;
use tracing::debug;

/// Engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Record a trace of step transitions
    pub record_trace: bool,
    /// Compile twice and compare fingerprints before running
    pub verify_determinism: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            record_trace: true,
            verify_determinism: false,
        }
    }
}

impl EngineConfig {
    /// Enable or disable tracing
    #[must_use]
    pub fn with_record_trace(mut self, record: bool) -> Self {
        self.record_trace = record;
        self
    }

    /// Enable or disable the double-compile check
    #[must_use]
    pub fn with_verify_determinism(mut self, verify: bool) -> Self {
        self.verify_determinism = verify;
        self
    }
}

/// Engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    /// Compilation failed
    #[error(transparent)]
    Compile(#[from] CompileFailure),
    /// The executor refused to run
    #[error(transparent)]
    Executor(#[from] ExecutorError),
    /// Two compilations of the same inputs disagreed
    #[error("plan is not deterministic: fingerprints {first} and {second} differ")]
    NonDeterministicPlan {
        /// First fingerprint
        first: Hash,
        /// Second fingerprint
        second: Hash,
    },
}

/// Everything one generation produced
pub struct Generation {
    /// The compiled plan
    pub plan: ExecutionPlan,
    /// The run report
    pub report: RunReport,
    /// The context after the run
    pub context: MapContext,
}

impl std::fmt::Debug for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generation")
            .field("plan", &self.plan.fingerprint())
            .field("report", &self.report)
            .finish_non_exhaustive()
    }
}

/// Compiles and runs one recipe
#[derive(Debug, Clone)]
pub struct Engine {
    recipe: Recipe,
    config: EngineConfig,
}

impl Engine {
    /// Create an engine with the default configuration
    #[must_use]
    pub fn new(recipe: Recipe) -> Self {
        Self {
            recipe,
            config: EngineConfig::default(),
        }
    }

    /// Set the configuration
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// The recipe
    #[must_use]
    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    /// The configuration
    #[must_use]
    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// Compile a plan
    ///
    /// # Errors
    ///
    /// Returns error if compilation fails or, with determinism checks on,
    /// if two compilations disagree
    pub fn compile(&self, env: &Env, overrides: &Value) -> Result<ExecutionPlan, EngineError> {
        let compiler = Compiler::new(&self.recipe);
        let plan = compiler.compile(env, overrides)?;
        if self.config.verify_determinism {
            let again = compiler.compile(env, overrides)?;
            if again.fingerprint() != plan.fingerprint() {
                return Err(EngineError::NonDeterministicPlan {
                    first: plan.fingerprint(),
                    second: again.fingerprint(),
                });
            }
            debug!(fingerprint = %plan.fingerprint().short(), "Plan is deterministic");
        }
        Ok(plan)
    }

    /// Create a fresh context for a plan
    #[must_use]
    pub fn context(&self, plan: &ExecutionPlan, adapter: Box<dyn MapAdapter>) -> MapContext {
        let trace = if self.config.record_trace {
            TraceLog::new()
        } else {
            TraceLog::disabled()
        };
        MapContext::new(plan.env().clone(), adapter).with_trace(trace)
    }

    /// Execute a plan against a context
    ///
    /// # Errors
    ///
    /// Returns error if the executor's preconditions fail
    pub fn execute(&self, plan: &ExecutionPlan, ctx: &mut MapContext) -> Result<RunReport, EngineError> {
        Ok(PipelineExecutor::new(&self.recipe).execute(plan, ctx)?)
    }

    /// Compile and run against `adapter`
    ///
    /// # Errors
    ///
    /// Returns error if compilation fails or the run cannot start. Step
    /// failures are reported in [`Generation::report`].
    pub fn generate(
        &self,
        env: &Env,
        overrides: &Value,
        adapter: Box<dyn MapAdapter>,
    ) -> Result<Generation, EngineError> {
        let plan = self.compile(env, overrides)?;
        let mut context = self.context(&plan, adapter);
        let report = self.execute(&plan, &mut context)?;
        Ok(Generation {
            plan,
            report,
            context,
        })
    }

    /// Compile and run against an in-memory [`MockAdapter`]
    ///
    /// # Errors
    ///
    /// See [`Engine::generate`]
    pub fn generate_mock(&self, env: &Env, overrides: &Value) -> Result<Generation, EngineError> {
        self.generate(env, overrides, Box::new(MockAdapter::new(env)))
    }
}
