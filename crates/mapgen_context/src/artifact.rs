//! Artifact declarations and the per-run artifact store.

use indexmap::IndexMap;
use mapgen_core::Dimensions;
use mapgen_schema::{resolve, summarize, Mode, Path, SchemaIssue, Shape, ValidationContext, Value};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Whether an artifact may be published more than once per run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactPolicy {
    /// A second publish fails
    OnceOnly,
    /// Later publishes replace the stored payload
    #[default]
    Overwritable,
}

/// Declared artifact: id, payload shape and overwrite policy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactSpec {
    /// Artifact id, conventionally `artifact:<name>`
    pub id: String,
    /// Payload shape
    pub shape: Shape,
    /// Overwrite policy
    pub policy: ArtifactPolicy,
}

impl ArtifactSpec {
    /// Declare an overwritable artifact
    #[must_use]
    pub fn new(id: impl Into<String>, shape: impl Into<Shape>) -> Self {
        Self {
            id: id.into(),
            shape: shape.into(),
            policy: ArtifactPolicy::default(),
        }
    }

    /// Set overwrite policy
    #[must_use]
    pub fn with_policy(mut self, policy: ArtifactPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Shorthand for [`ArtifactPolicy::OnceOnly`]
    #[must_use]
    pub fn once_only(self) -> Self {
        self.with_policy(ArtifactPolicy::OnceOnly)
    }
}

/// Artifact store errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArtifactError {
    /// No artifact with this id was declared
    #[error("artifact '{id}' is not declared")]
    NotDeclared {
        /// Artifact id
        id: String,
    },
    /// Nothing published under this id yet
    #[error("artifact '{id}' has not been published yet")]
    NotPublished {
        /// Artifact id
        id: String,
    },
    /// Payload failed validation against the declared shape
    #[error("artifact '{id}' payload is invalid: {}", summarize(.issues))]
    Invalid {
        /// Artifact id
        id: String,
        /// Validation issues
        issues: Vec<SchemaIssue>,
    },
    /// A once-only artifact was already published
    #[error("artifact '{id}' is once-only and was already published")]
    AlreadyPublished {
        /// Artifact id
        id: String,
    },
    /// Same id declared twice with different specs
    #[error("artifact '{id}' is declared twice with different shapes or policies")]
    Conflict {
        /// Artifact id
        id: String,
    },
}

#[derive(Debug, Clone)]
struct Slot {
    spec: ArtifactSpec,
    payload: Option<Value>,
    publishes: u32,
}

/// Holds declared artifacts and their current payloads for one run
#[derive(Debug, Clone, Default)]
pub struct ArtifactStore {
    slots: IndexMap<String, Slot>,
}

impl ArtifactStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an artifact
    ///
    /// Declaring an identical spec again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::Conflict`] if the id is already declared
    /// with a different spec
    pub fn declare(&mut self, spec: ArtifactSpec) -> Result<(), ArtifactError> {
        if let Some(existing) = self.slots.get(&spec.id) {
            if existing.spec == spec {
                return Ok(());
            }
            return Err(ArtifactError::Conflict { id: spec.id });
        }
        self.slots.insert(
            spec.id.clone(),
            Slot {
                spec,
                payload: None,
                publishes: 0,
            },
        );
        Ok(())
    }

    /// Look up a declaration
    #[must_use]
    pub fn spec(&self, id: &str) -> Option<&ArtifactSpec> {
        self.slots.get(id).map(|slot| &slot.spec)
    }

    /// Validate and store a payload
    ///
    /// The payload is checked strictly against the declared shape. Numeric
    /// arrays in buffer positions are stored as typed buffers.
    ///
    /// # Errors
    ///
    /// Returns error if the id is undeclared, the payload is invalid, or a
    /// once-only artifact is published twice. Nothing is stored on error.
    pub fn publish(
        &mut self,
        id: &str,
        payload: Value,
        dimensions: Dimensions,
    ) -> Result<(), ArtifactError> {
        let slot = self
            .slots
            .get_mut(id)
            .ok_or_else(|| ArtifactError::NotDeclared { id: id.to_string() })?;
        if slot.spec.policy == ArtifactPolicy::OnceOnly && slot.publishes > 0 {
            return Err(ArtifactError::AlreadyPublished { id: id.to_string() });
        }
        let ctx = ValidationContext::with_dimensions(dimensions);
        let stored = resolve(&slot.spec.shape, Some(&payload), &Path::root(), &ctx, Mode::Strict)
            .map_err(|issues| ArtifactError::Invalid {
                id: id.to_string(),
                issues,
            })?;
        if slot.payload.is_some() {
            debug!(artifact = id, publishes = slot.publishes + 1, "Overwriting artifact");
        } else {
            debug!(artifact = id, "Publishing artifact");
        }
        slot.payload = Some(stored);
        slot.publishes += 1;
        Ok(())
    }

    /// Current payload
    ///
    /// # Errors
    ///
    /// Returns error if undeclared or not yet published
    pub fn read(&self, id: &str) -> Result<&Value, ArtifactError> {
        let slot = self
            .slots
            .get(id)
            .ok_or_else(|| ArtifactError::NotDeclared { id: id.to_string() })?;
        slot.payload
            .as_ref()
            .ok_or_else(|| ArtifactError::NotPublished { id: id.to_string() })
    }

    /// Check a currently published payload still satisfies its shape
    #[must_use]
    pub fn holds_valid(&self, id: &str, dimensions: Dimensions) -> bool {
        let Some(slot) = self.slots.get(id) else {
            return false;
        };
        let Some(payload) = &slot.payload else {
            return false;
        };
        let ctx = ValidationContext::with_dimensions(dimensions);
        resolve(&slot.spec.shape, Some(payload), &Path::root(), &ctx, Mode::Strict).is_ok()
    }

    /// How many times an artifact was published this run
    #[must_use]
    pub fn publish_count(&self, id: &str) -> u32 {
        self.slots.get(id).map_or(0, |slot| slot.publishes)
    }

    /// Declared artifact ids, in declaration order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapgen_schema::{Buffer, BufferKind, BufferShape, NumberShape, ObjectShape};
    use serde_json::json;

    fn climate_spec() -> ArtifactSpec {
        ArtifactSpec::new(
            "artifact:climateField",
            ObjectShape::new()
                .field("rainfall", BufferShape::per_tile(BufferKind::U8))
                .field("humidity", BufferShape::per_tile(BufferKind::U8)),
        )
    }

    fn climate(len: usize, fill: u8) -> Value {
        Value::object()
            .with("rainfall", Buffer::U8(vec![fill; len]))
            .with("humidity", Buffer::U8(vec![fill; len]))
    }

    const DIMS: Dimensions = Dimensions::new(3, 2);

    #[test]
    fn test_read_before_publish() {
        let mut store = ArtifactStore::new();
        store.declare(climate_spec()).unwrap();
        assert_eq!(
            store.read("artifact:climateField"),
            Err(ArtifactError::NotPublished {
                id: "artifact:climateField".to_string()
            })
        );
        assert!(!store.holds_valid("artifact:climateField", DIMS));
    }

    #[test]
    fn test_publish_then_read() {
        let mut store = ArtifactStore::new();
        store.declare(climate_spec()).unwrap();
        store.publish("artifact:climateField", climate(6, 3), DIMS).unwrap();
        let payload = store.read("artifact:climateField").unwrap();
        assert_eq!(payload.get("rainfall").and_then(Value::as_buffer).map(Buffer::len), Some(6));
        assert!(store.holds_valid("artifact:climateField", DIMS));
    }

    #[test]
    fn test_invalid_payload_is_not_stored() {
        let mut store = ArtifactStore::new();
        store.declare(climate_spec()).unwrap();
        let err = store.publish("artifact:climateField", climate(5, 3), DIMS).unwrap_err();
        assert!(matches!(err, ArtifactError::Invalid { ref issues, .. } if issues.len() == 2));
        assert!(err.to_string().contains("schema.buffer-length"));
        assert_eq!(store.publish_count("artifact:climateField"), 0);
        assert!(store.read("artifact:climateField").is_err());
    }

    #[test]
    fn test_overwritable_republish() {
        let mut store = ArtifactStore::new();
        store.declare(climate_spec()).unwrap();
        store.publish("artifact:climateField", climate(6, 1), DIMS).unwrap();
        store.publish("artifact:climateField", climate(6, 9), DIMS).unwrap();
        let payload = store.read("artifact:climateField").unwrap();
        assert_eq!(payload.get("rainfall").and_then(Value::as_buffer).and_then(|b| b.get_f64(0)), Some(9.0));
        assert_eq!(store.publish_count("artifact:climateField"), 2);
    }

    #[test]
    fn test_once_only_rejects_second_publish() {
        let mut store = ArtifactStore::new();
        let spec = ArtifactSpec::new("artifact:crust", ObjectShape::new().field("plates", NumberShape::integer()))
            .once_only();
        store.declare(spec).unwrap();
        store.publish("artifact:crust", Value::from(json!({"plates": 4})), DIMS).unwrap();
        let err = store.publish("artifact:crust", Value::from(json!({"plates": 5})), DIMS).unwrap_err();
        assert_eq!(err, ArtifactError::AlreadyPublished { id: "artifact:crust".to_string() });
        assert_eq!(store.read("artifact:crust").unwrap().get("plates"), Some(&Value::Number(4.0)));
    }

    #[test]
    fn test_numeric_arrays_stored_as_buffers() {
        let mut store = ArtifactStore::new();
        store.declare(climate_spec()).unwrap();
        let payload = Value::from(json!({"rainfall": [1, 2, 3, 4, 5, 6], "humidity": [0, 0, 0, 0, 0, 0]}));
        store.publish("artifact:climateField", payload, DIMS).unwrap();
        let stored = store.read("artifact:climateField").unwrap();
        assert!(matches!(stored.get("rainfall"), Some(Value::Buffer(Buffer::U8(_)))));
    }

    #[test]
    fn test_declare_conflict_and_undeclared() {
        let mut store = ArtifactStore::new();
        store.declare(climate_spec()).unwrap();
        store.declare(climate_spec()).unwrap();
        let err = store.declare(climate_spec().once_only()).unwrap_err();
        assert!(matches!(err, ArtifactError::Conflict { .. }));

        let err = store.publish("artifact:nope", Value::object(), DIMS).unwrap_err();
        assert!(matches!(err, ArtifactError::NotDeclared { .. }));
        assert_eq!(store.ids().collect::<Vec<_>>(), vec!["artifact:climateField"]);
    }
}
