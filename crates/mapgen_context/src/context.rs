//! The mutable runtime home of one generation run.

use crate::adapter::MapAdapter;
use crate::artifact::{ArtifactError, ArtifactStore};
use crate::buffer::FieldBuffers;
use crate::trace::TraceLog;
use mapgen_core::{Dimensions, Env};
use mapgen_rng::LabelRng;
use mapgen_schema::Value;
use thiserror::Error;

/// Context lifecycle errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// The context already hosted a run
    #[error("map context for seed {seed} has already hosted a run")]
    Reused {
        /// Seed of the context
        seed: u64,
    },
}

/// Everything a run mutates: adapter, field buffers, artifacts, RNG, trace
///
/// Exclusively owned by one in-flight run and never reused afterwards.
pub struct MapContext {
    env: Env,
    adapter: Box<dyn MapAdapter>,
    fields: FieldBuffers,
    artifacts: ArtifactStore,
    rng: LabelRng,
    trace: TraceLog,
    started: bool,
}

impl MapContext {
    /// Create a context for `env`, seeding the RNG from `env.seed`
    #[must_use]
    pub fn new(env: Env, adapter: Box<dyn MapAdapter>) -> Self {
        let rng = LabelRng::new(env.seed);
        Self {
            env,
            adapter,
            fields: FieldBuffers::new(),
            artifacts: ArtifactStore::new(),
            rng,
            trace: TraceLog::new(),
            started: false,
        }
    }

    /// Replace the trace log
    #[must_use]
    pub fn with_trace(mut self, trace: TraceLog) -> Self {
        self.trace = trace;
        self
    }

    /// Generation environment
    #[must_use]
    pub fn env(&self) -> &Env {
        &self.env
    }

    /// Map size
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        self.env.dimensions
    }

    /// Host adapter
    #[must_use]
    pub fn adapter(&self) -> &dyn MapAdapter {
        self.adapter.as_ref()
    }

    /// Mutable host adapter
    pub fn adapter_mut(&mut self) -> &mut dyn MapAdapter {
        self.adapter.as_mut()
    }

    /// Field buffers
    #[must_use]
    pub fn fields(&self) -> &FieldBuffers {
        &self.fields
    }

    /// Mutable field buffers
    pub fn fields_mut(&mut self) -> &mut FieldBuffers {
        &mut self.fields
    }

    /// Artifact store
    #[must_use]
    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Mutable artifact store
    pub fn artifacts_mut(&mut self) -> &mut ArtifactStore {
        &mut self.artifacts
    }

    /// Deterministic RNG
    #[must_use]
    pub fn rng(&self) -> &LabelRng {
        &self.rng
    }

    /// Draw from the labelled RNG
    pub fn draw(&mut self, max_exclusive: u32, label: &str) -> u32 {
        self.rng.draw(max_exclusive, label)
    }

    /// Draw from the labelled RNG, or `None` for an empty bound
    #[must_use]
    pub fn try_draw(&mut self, max_exclusive: u32, label: &str) -> Option<u32> {
        self.rng.try_draw(max_exclusive, label)
    }

    /// Draw a float in `[0, 1)` from the labelled RNG
    pub fn draw_unit(&mut self, label: &str) -> f64 {
        self.rng.draw_unit(label)
    }

    /// Execution trace
    #[must_use]
    pub fn trace(&self) -> &TraceLog {
        &self.trace
    }

    /// Mutable execution trace
    pub fn trace_mut(&mut self) -> &mut TraceLog {
        &mut self.trace
    }

    /// Validate and publish an artifact payload
    ///
    /// # Errors
    ///
    /// Returns error if the artifact is undeclared, the payload is invalid
    /// or a once-only artifact was already published
    pub fn publish_artifact(&mut self, id: &str, payload: Value) -> Result<(), ArtifactError> {
        let dimensions = self.dimensions();
        self.artifacts.publish(id, payload, dimensions)
    }

    /// Read the current payload of an artifact
    ///
    /// # Errors
    ///
    /// Returns error if the artifact is undeclared or not yet published
    pub fn read_artifact(&self, id: &str) -> Result<&Value, ArtifactError> {
        self.artifacts.read(id)
    }

    /// Mark the context as hosting a run
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Reused`] on the second call
    pub fn begin_run(&mut self) -> Result<(), ContextError> {
        if self.started {
            return Err(ContextError::Reused { seed: self.env.seed });
        }
        self.started = true;
        Ok(())
    }

    /// Check if a run has started on this context
    #[must_use]
    pub fn has_run(&self) -> bool {
        self.started
    }
}

impl std::fmt::Debug for MapContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapContext")
            .field("env", &self.env)
            .field("fields", &self.fields)
            .field("artifacts", &self.artifacts)
            .field("rng", &self.rng)
            .field("trace_events", &self.trace.len())
            .field("started", &self.started)
            .finish_non_exhaustive()
    }
}
