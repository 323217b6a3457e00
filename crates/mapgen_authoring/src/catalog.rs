//! Registry of ops keyed by their globally unique id.

use crate::error::AuthoringError;
use crate::op::Op;
use indexmap::IndexMap;
use std::sync::Arc;

/// Ops by id, in registration order
///
/// The same op may be registered many times (several steps can embed it);
/// two different ops may not share an id.
#[derive(Debug, Clone, Default)]
pub struct OpCatalog {
    ops: IndexMap<String, Arc<Op>>,
}

impl OpCatalog {
    /// Create an empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an op
    ///
    /// # Errors
    ///
    /// Returns [`AuthoringError::DuplicateOpId`] if a different op is
    /// already registered under the same id
    pub fn register(&mut self, op: Arc<Op>) -> Result<(), AuthoringError> {
        if let Some(existing) = self.ops.get(op.id()) {
            if Arc::ptr_eq(existing, &op) {
                return Ok(());
            }
            return Err(AuthoringError::DuplicateOpId {
                op: op.id().to_string(),
            });
        }
        self.ops.insert(op.id().to_string(), op);
        Ok(())
    }

    /// Look up an op
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Arc<Op>> {
        self.ops.get(id)
    }

    /// Check if an op is registered
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.ops.contains_key(id)
    }

    /// Registered ops
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Op>> {
        self.ops.values()
    }

    /// Number of ops
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::{OpContract, OpKind, Strategy};
    use mapgen_schema::{ObjectShape, Value};

    fn op(id: &str) -> Arc<Op> {
        let contract = OpContract::new(OpKind::Select, id, ObjectShape::new(), ObjectShape::new());
        let default = Strategy::new(ObjectShape::new(), |_: &Value, _: &Value| Ok(Value::object()));
        Arc::new(Op::new(contract, [("default", default)]).unwrap())
    }

    #[test]
    fn test_same_op_registers_twice() {
        let mut catalog = OpCatalog::new();
        let shared = op("pick/one");
        catalog.register(shared.clone()).unwrap();
        catalog.register(shared).unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(catalog.contains("pick/one"));
    }

    #[test]
    fn test_different_op_same_id_rejected() {
        let mut catalog = OpCatalog::new();
        catalog.register(op("pick/one")).unwrap();
        let err = catalog.register(op("pick/one")).unwrap_err();
        assert_eq!(err, AuthoringError::DuplicateOpId { op: "pick/one".to_string() });
    }
}
