//! Stages: named groups of steps behind one author-facing surface.

use crate::step::Step;
use mapgen_core::Env;
use mapgen_schema::{Map, ObjectShape, Shape, Value};
use std::sync::Arc;

/// Key of the knobs entry in a default stage surface
pub const KNOBS_KEY: &str = "knobs";

/// A stage surface split into knobs and per-step raw configs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageInternal {
    /// Stage-wide knobs
    pub knobs: Value,
    /// Raw config per step key
    pub raw_steps: Map,
}

/// Surface projection: `(env, surface) -> {knobs, rawSteps}`
pub type ToInternalFn = Arc<dyn Fn(&Env, &Value) -> Result<StageInternal, String> + Send + Sync>;

/// A named group of steps
#[derive(Clone)]
pub struct Stage {
    id: String,
    knobs: Option<Shape>,
    surface: Option<(Shape, ToInternalFn)>,
    steps: Vec<Step>,
}

impl Stage {
    /// Create an empty stage
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            knobs: None,
            surface: None,
            steps: Vec::new(),
        }
    }

    /// Set the knobs shape used by the default surface
    #[must_use]
    pub fn knobs(mut self, shape: impl Into<Shape>) -> Self {
        self.knobs = Some(shape.into());
        self
    }

    /// Replace the default surface with a custom shape and projection
    #[must_use]
    pub fn surface<F>(mut self, shape: impl Into<Shape>, to_internal: F) -> Self
    where
        F: Fn(&Env, &Value) -> Result<StageInternal, String> + Send + Sync + 'static,
    {
        self.surface = Some((shape.into(), Arc::new(to_internal)));
        self
    }

    /// Append a step
    #[must_use]
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Stage id
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Steps, in declared order
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Find a step by its key
    #[must_use]
    pub fn find_step(&self, key: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.key() == key)
    }

    /// Check if the stage uses the default surface
    #[must_use]
    pub fn has_default_surface(&self) -> bool {
        self.surface.is_none()
    }

    /// Knobs shape, or an empty object
    #[must_use]
    pub fn knobs_schema(&self) -> Shape {
        self.knobs
            .clone()
            .unwrap_or_else(|| ObjectShape::new().into())
    }

    /// Author-facing surface schema
    ///
    /// The default surface is `{knobs, ...}` where every other key passes
    /// through to the step with the same key.
    #[must_use]
    pub fn surface_schema(&self) -> Shape {
        match &self.surface {
            Some((shape, _)) => shape.clone(),
            None => ObjectShape::new()
                .optional(KNOBS_KEY, self.knobs_schema())
                .passthrough()
                .into(),
        }
    }

    /// Split a resolved surface into knobs and raw step configs
    ///
    /// # Errors
    ///
    /// Returns the projection's message on failure
    pub fn to_internal(&self, env: &Env, surface: &Value) -> Result<StageInternal, String> {
        if let Some((_, to_internal)) = &self.surface {
            return to_internal(env, surface);
        }
        let Some(map) = surface.as_object() else {
            return Err(format!("stage surface must be an object, got {}", surface.kind_name()));
        };
        let mut internal = StageInternal {
            knobs: Value::object(),
            raw_steps: Map::new(),
        };
        for (key, value) in map {
            if key == KNOBS_KEY {
                internal.knobs = value.clone();
            } else {
                internal.raw_steps.insert(key.clone(), value.clone());
            }
        }
        Ok(internal)
    }
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("id", &self.id)
            .field("knobs", &self.knobs.is_some())
            .field("custom_surface", &self.surface.is_some())
            .field("steps", &self.steps)
            .finish()
    }
}
