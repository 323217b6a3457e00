//! Ops: pure computation units with interchangeable strategies.
//!
//! Strategy dispatch is a table lookup keyed by the validated `strategy`
//! field of a selection. There is no fallback: an unknown strategy is an
//! error.

use crate::error::{AuthoringError, OpError};
use indexmap::IndexMap;
use mapgen_core::{Dimensions, Env};
use mapgen_schema::{
    defaults_of, resolve, Mode, ObjectShape, Path, SchemaIssue, Shape, UnionShape,
    ValidationContext, Value,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Name of the strategy every op must have
pub const DEFAULT_STRATEGY: &str = "default";

/// Role of an op in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    /// Produces new data
    Compute,
    /// Produces placements or a schedule
    Plan,
    /// Produces scores over candidates
    Score,
    /// Chooses among candidates
    Select,
}

/// Op identity and data shapes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpContract {
    /// Role
    pub kind: OpKind,
    /// Globally unique namespaced id, e.g. `hydrology/compute-climate-baseline`
    pub id: String,
    /// Input shape
    pub input: Shape,
    /// Output shape
    pub output: Shape,
}

impl OpContract {
    /// Create a contract
    #[must_use]
    pub fn new(
        kind: OpKind,
        id: impl Into<String>,
        input: impl Into<Shape>,
        output: impl Into<Shape>,
    ) -> Self {
        Self {
            kind,
            id: id.into(),
            input: input.into(),
            output: output.into(),
        }
    }
}

/// Strategy body: `(input, config) -> output`
pub type StrategyRun = Arc<dyn Fn(&Value, &Value) -> Result<Value, String> + Send + Sync>;

/// Adapts a strategy config to the run environment before execution
pub type ConfigResolver = Arc<dyn Fn(Value, &Env) -> Result<Value, String> + Send + Sync>;

/// One named implementation of an op
#[derive(Clone)]
pub struct Strategy {
    config: Shape,
    run: StrategyRun,
    resolve_config: Option<ConfigResolver>,
}

impl Strategy {
    /// Create a strategy with its config shape and body
    #[must_use]
    pub fn new<F>(config: impl Into<Shape>, run: F) -> Self
    where
        F: Fn(&Value, &Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            config: config.into(),
            run: Arc::new(run),
            resolve_config: None,
        }
    }

    /// Set the config resolver
    #[must_use]
    pub fn with_resolve_config<F>(mut self, resolver: F) -> Self
    where
        F: Fn(Value, &Env) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.resolve_config = Some(Arc::new(resolver));
        self
    }

    /// Config shape
    #[must_use]
    pub fn config(&self) -> &Shape {
        &self.config
    }

    /// Check if a config resolver is set
    #[must_use]
    pub fn has_resolver(&self) -> bool {
        self.resolve_config.is_some()
    }
}

impl std::fmt::Debug for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Strategy")
            .field("config", &self.config)
            .field("resolve_config", &self.resolve_config.is_some())
            .finish_non_exhaustive()
    }
}

/// A chosen strategy plus its config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySelection {
    /// Strategy id
    pub strategy: String,
    /// Strategy config
    pub config: Value,
}

impl StrategySelection {
    /// Create a selection
    #[must_use]
    pub fn new(strategy: impl Into<String>, config: impl Into<Value>) -> Self {
        Self {
            strategy: strategy.into(),
            config: config.into(),
        }
    }

    /// Read the selection stored under `name` in a step config
    ///
    /// # Errors
    ///
    /// Returns [`OpError::MalformedSelection`] if absent or malformed
    pub fn from_config(step_config: &Value, name: &str) -> Result<Self, OpError> {
        let value = step_config.get(name).ok_or_else(|| OpError::MalformedSelection {
            reason: format!("step config has no op entry '{}'", name),
        })?;
        Self::try_from(value)
    }

    /// As a `{strategy, config}` value
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::object()
            .with("strategy", self.strategy.as_str())
            .with("config", self.config.clone())
    }
}

impl TryFrom<&Value> for StrategySelection {
    type Error = OpError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let Some(map) = value.as_object() else {
            return Err(OpError::MalformedSelection {
                reason: format!("expected object, got {}", value.kind_name()),
            });
        };
        let strategy = match map.get("strategy") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => {
                return Err(OpError::MalformedSelection {
                    reason: format!("strategy must be a string, got {}", other.kind_name()),
                });
            }
            None => {
                return Err(OpError::MalformedSelection {
                    reason: "strategy is missing".to_string(),
                });
            }
        };
        let config = map.get("config").cloned().unwrap_or_else(Value::object);
        Ok(Self { strategy, config })
    }
}

/// A validated op: contract, strategies and the derived selection schema
#[derive(Debug, Clone)]
pub struct Op {
    contract: OpContract,
    strategies: IndexMap<String, Strategy>,
    config_schema: Shape,
}

impl Op {
    /// Build an op from its contract and strategies
    ///
    /// # Errors
    ///
    /// Returns error if there are no strategies, no `default` strategy, or
    /// any strategy or contract shape is malformed
    pub fn new<I, S>(contract: OpContract, strategies: I) -> Result<Self, AuthoringError>
    where
        I: IntoIterator<Item = (S, Strategy)>,
        S: Into<String>,
    {
        let strategies: IndexMap<String, Strategy> = strategies
            .into_iter()
            .map(|(id, strategy)| (id.into(), strategy))
            .collect();
        let op = contract.id.clone();
        if strategies.is_empty() {
            return Err(AuthoringError::EmptyStrategies { op });
        }
        let Some(default) = strategies.get(DEFAULT_STRATEGY) else {
            return Err(AuthoringError::MissingDefaultStrategy { op });
        };
        for (label, shape) in [("input", &contract.input), ("output", &contract.output)] {
            shape.verify().map_err(|issues| AuthoringError::InvalidShape {
                owner: format!("op {} {}", op, label),
                issues,
            })?;
        }

        let default_selection = Value::object()
            .with("strategy", DEFAULT_STRATEGY)
            .with("config", defaults_of(default.config()));
        let mut union = UnionShape::new("strategy");
        for (id, strategy) in &strategies {
            strategy.config.verify().map_err(|issues| AuthoringError::InvalidStrategySchema {
                op: op.clone(),
                strategy: id.clone(),
                issues,
            })?;
            union = union.variant(id.clone(), ObjectShape::new().field("config", strategy.config.clone()));
        }
        let config_schema: Shape = union.with_default(default_selection).into();
        config_schema
            .verify()
            .map_err(|issues| AuthoringError::InvalidStrategySchema {
                op: op.clone(),
                strategy: DEFAULT_STRATEGY.to_string(),
                issues,
            })?;

        Ok(Self {
            contract,
            strategies,
            config_schema,
        })
    }

    /// Op id
    #[must_use]
    pub fn id(&self) -> &str {
        &self.contract.id
    }

    /// Op kind
    #[must_use]
    pub fn kind(&self) -> OpKind {
        self.contract.kind
    }

    /// Op contract
    #[must_use]
    pub fn contract(&self) -> &OpContract {
        &self.contract
    }

    /// Strategy ids, in declaration order
    pub fn strategy_ids(&self) -> impl Iterator<Item = &str> {
        self.strategies.keys().map(String::as_str)
    }

    /// Look up a strategy
    #[must_use]
    pub fn strategy(&self, id: &str) -> Option<&Strategy> {
        self.strategies.get(id)
    }

    /// Tagged-union schema over `{strategy, config}` selections
    ///
    /// Its default is the `default` strategy with its config defaults.
    #[must_use]
    pub fn config_schema(&self) -> &Shape {
        &self.config_schema
    }

    /// The `default` strategy with its config defaults
    #[must_use]
    pub fn default_selection(&self) -> StrategySelection {
        let config = self
            .strategies
            .get(DEFAULT_STRATEGY)
            .map(|s| defaults_of(&s.config))
            .unwrap_or_else(Value::object);
        StrategySelection::new(DEFAULT_STRATEGY, config)
    }

    fn lookup(&self, strategy: &str) -> Result<&Strategy, OpError> {
        self.strategies
            .get(strategy)
            .ok_or_else(|| OpError::UnknownStrategy {
                op: self.contract.id.clone(),
                strategy: strategy.to_string(),
            })
    }

    fn check_config(
        &self,
        strategy: &Strategy,
        config: &Value,
        ctx: &ValidationContext,
    ) -> Result<Value, OpError> {
        resolve(&strategy.config, Some(config), &Path::root(), ctx, Mode::Strict).map_err(|issues| {
            OpError::InvalidConfig {
                op: self.contract.id.clone(),
                issues,
            }
        })
    }

    /// Adapt a selection to run-time settings
    ///
    /// Applies the strategy's resolver, if any, and re-validates the result
    /// against the strategy config shape.
    ///
    /// # Errors
    ///
    /// Returns error for an unknown strategy, a failing resolver, or a
    /// resolved config that no longer fits its shape
    pub fn resolve_config(
        &self,
        selection: &StrategySelection,
        env: &Env,
    ) -> Result<StrategySelection, OpError> {
        let strategy = self.lookup(&selection.strategy)?;
        let Some(resolver) = &strategy.resolve_config else {
            return Ok(selection.clone());
        };
        let resolved = resolver(selection.config.clone(), env).map_err(|message| {
            OpError::ResolveFailed {
                op: self.contract.id.clone(),
                strategy: selection.strategy.clone(),
                message,
            }
        })?;
        let ctx = ValidationContext::with_dimensions(env.dimensions);
        let config = self.check_config(strategy, &resolved, &ctx)?;
        Ok(StrategySelection::new(selection.strategy.clone(), config))
    }

    /// Run the selected strategy
    ///
    /// Input, config and output are each checked strictly against a map of
    /// `dimensions`, so per-tile buffers must hold one value per tile.
    ///
    /// # Errors
    ///
    /// Returns error for an unknown strategy, invalid input, config or
    /// output, or a failing strategy body
    pub fn run(
        &self,
        input: &Value,
        selection: &StrategySelection,
        dimensions: Dimensions,
    ) -> Result<Value, OpError> {
        let strategy = self.lookup(&selection.strategy)?;
        let ctx = ValidationContext::with_dimensions(dimensions);
        let config = self.check_config(strategy, &selection.config, &ctx)?;
        let input = self.check(&self.contract.input, input, &ctx, |op, issues| {
            OpError::InvalidInput { op, issues }
        })?;
        let output = (strategy.run)(&input, &config).map_err(|message| OpError::Failed {
            op: self.contract.id.clone(),
            strategy: selection.strategy.clone(),
            message,
        })?;
        self.check(&self.contract.output, &output, &ctx, |op, issues| {
            OpError::InvalidOutput { op, issues }
        })
    }

    fn check(
        &self,
        shape: &Shape,
        value: &Value,
        ctx: &ValidationContext,
        wrap: impl FnOnce(String, Vec<SchemaIssue>) -> OpError,
    ) -> Result<Value, OpError> {
        resolve(shape, Some(value), &Path::root(), ctx, Mode::Strict)
            .map_err(|issues| wrap(self.contract.id.clone(), issues))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapgen_schema::{ArrayShape, Buffer, BufferKind, BufferShape, IssueCode, NumberShape};
    use serde_json::json;

    fn scale_op() -> Op {
        let contract = OpContract::new(
            OpKind::Compute,
            "test/scale",
            ObjectShape::new().field("values", ArrayShape::new(NumberShape::new())),
            ObjectShape::new().field("values", ArrayShape::new(NumberShape::new())),
        );
        let scale = |factor: f64| {
            move |input: &Value, _config: &Value| -> Result<Value, String> {
                let values = input
                    .get("values")
                    .and_then(Value::as_array)
                    .ok_or("values missing")?;
                let scaled: Vec<Value> = values
                    .iter()
                    .filter_map(Value::as_f64)
                    .map(|v| Value::Number(v * factor))
                    .collect();
                Ok(Value::object().with("values", scaled))
            }
        };
        let default = Strategy::new(
            ObjectShape::new().field("factor", NumberShape::new().with_default(2.0)),
            |input: &Value, config: &Value| {
                let factor = config.get("factor").and_then(Value::as_f64).unwrap_or(1.0);
                let values = input.get("values").and_then(Value::as_array).ok_or("values missing")?;
                let scaled: Vec<Value> = values
                    .iter()
                    .filter_map(Value::as_f64)
                    .map(|v| Value::Number(v * factor))
                    .collect();
                Ok(Value::object().with("values", scaled))
            },
        );
        let triple = Strategy::new(ObjectShape::new(), scale(3.0)).with_resolve_config(
            |config: Value, env: &Env| {
                if env.dimensions.width > 1000 {
                    return Err("map too wide".to_string());
                }
                Ok(config)
            },
        );
        Op::new(contract, [("default", default), ("triple", triple)]).unwrap()
    }

    fn input() -> Value {
        Value::from(json!({"values": [1, 2]}))
    }

    fn dims() -> Dimensions {
        Dimensions::new(2, 2)
    }

    fn mask_op(emitted: usize) -> Op {
        let contract = OpContract::new(
            OpKind::Compute,
            "test/mask",
            ObjectShape::new().field("height", BufferShape::per_tile(BufferKind::I16)),
            ObjectShape::new().field("mask", BufferShape::per_tile(BufferKind::U8)),
        );
        let default = Strategy::new(ObjectShape::new(), move |_: &Value, _: &Value| {
            Ok(Value::object().with("mask", Buffer::U8(vec![1; emitted])))
        });
        Op::new(contract, [("default", default)]).unwrap()
    }

    #[test]
    fn test_requires_strategies() {
        let contract = OpContract::new(OpKind::Compute, "test/none", ObjectShape::new(), ObjectShape::new());
        let err = Op::new(contract, Vec::<(String, Strategy)>::new()).unwrap_err();
        assert_eq!(err, AuthoringError::EmptyStrategies { op: "test/none".to_string() });
    }

    #[test]
    fn test_requires_default_strategy() {
        let contract = OpContract::new(OpKind::Score, "test/nodefault", ObjectShape::new(), ObjectShape::new());
        let only = Strategy::new(ObjectShape::new(), |_: &Value, _: &Value| Ok(Value::object()));
        let err = Op::new(contract, [("fast", only)]).unwrap_err();
        assert!(matches!(err, AuthoringError::MissingDefaultStrategy { .. }));
    }

    #[test]
    fn test_rejects_invalid_strategy_schema() {
        let contract = OpContract::new(OpKind::Plan, "test/bad", ObjectShape::new(), ObjectShape::new());
        let bad = Strategy::new(
            ObjectShape::new().field("n", NumberShape::new().with_range(0.0, 1.0).with_default(5.0)),
            |_: &Value, _: &Value| Ok(Value::object()),
        );
        let err = Op::new(contract, [("default", bad)]).unwrap_err();
        assert!(matches!(err, AuthoringError::InvalidStrategySchema { ref strategy, .. } if strategy == "default"));
    }

    #[test]
    fn test_config_schema_default() {
        let op = scale_op();
        let defaults = defaults_of(op.config_schema());
        assert_eq!(defaults, Value::from(json!({"strategy": "default", "config": {"factor": 2}})));
        assert_eq!(op.default_selection().to_value(), defaults);
        assert_eq!(op.strategy_ids().collect::<Vec<_>>(), vec!["default", "triple"]);
    }

    #[test]
    fn test_run_dispatches_by_strategy() {
        let op = scale_op();
        let out = op.run(&input(), &StrategySelection::new("default", json!({"factor": 2})), dims()).unwrap();
        assert_eq!(out, Value::from(json!({"values": [2, 4]})));
        let out = op.run(&input(), &StrategySelection::new("triple", Value::object()), dims()).unwrap();
        assert_eq!(out, Value::from(json!({"values": [3, 6]})));
    }

    #[test]
    fn test_run_unknown_strategy_does_not_fall_back() {
        let op = scale_op();
        let err = op.run(&input(), &StrategySelection::new("quadruple", Value::object()), dims()).unwrap_err();
        assert_eq!(
            err,
            OpError::UnknownStrategy {
                op: "test/scale".to_string(),
                strategy: "quadruple".to_string()
            }
        );
    }

    #[test]
    fn test_run_checks_input_and_config() {
        let op = scale_op();
        let err = op
            .run(&Value::from(json!({"values": "nope"})), &op.default_selection(), dims())
            .unwrap_err();
        assert!(matches!(err, OpError::InvalidInput { .. }));

        let err = op
            .run(&input(), &StrategySelection::new("default", json!({"factor": "x"})), dims())
            .unwrap_err();
        assert!(matches!(err, OpError::InvalidConfig { ref issues, .. } if issues[0].code == IssueCode::TypeMismatch));
    }

    #[test]
    fn test_run_checks_per_tile_lengths() {
        let height = Value::object().with("height", Buffer::I16(vec![0; 4]));

        let op = mask_op(4);
        let out = op.run(&height, &op.default_selection(), dims()).unwrap();
        assert_eq!(out.get("mask").and_then(Value::as_buffer).map(Buffer::len), Some(4));

        let short = mask_op(3);
        let err = short.run(&height, &short.default_selection(), dims()).unwrap_err();
        assert!(matches!(
            err,
            OpError::InvalidOutput { ref issues, .. } if issues[0].code == IssueCode::BufferLength
        ));

        let err = op
            .run(&Value::object().with("height", Buffer::I16(vec![0; 5])), &op.default_selection(), dims())
            .unwrap_err();
        assert!(matches!(err, OpError::InvalidInput { .. }));
    }

    #[test]
    fn test_resolve_config_uses_env() {
        let op = scale_op();
        let small = Env::new(1, Dimensions::new(10, 10));
        let huge = Env::new(1, Dimensions::new(2000, 10));
        let selection = StrategySelection::new("triple", Value::object());
        assert_eq!(op.resolve_config(&selection, &small).unwrap(), selection);
        assert!(matches!(
            op.resolve_config(&selection, &huge),
            Err(OpError::ResolveFailed { .. })
        ));
        let unknown = StrategySelection::new("nope", Value::object());
        assert!(matches!(
            op.resolve_config(&unknown, &small),
            Err(OpError::UnknownStrategy { .. })
        ));
    }

    #[test]
    fn test_selection_from_value() {
        let config = Value::from(json!({"scale": {"strategy": "triple", "config": {}}, "bad": {"strategy": 3}}));
        let selection = StrategySelection::from_config(&config, "scale").unwrap();
        assert_eq!(selection.strategy, "triple");
        assert!(matches!(
            StrategySelection::from_config(&config, "bad"),
            Err(OpError::MalformedSelection { .. })
        ));
        assert!(StrategySelection::from_config(&config, "missing").is_err());
    }
}
