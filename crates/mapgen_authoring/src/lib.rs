//! MAPGEN Authoring
//!
//! Ops, steps, stages and recipes. Everything here is built once at
//! startup and shared read-only afterwards.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod error;
pub mod op;
pub mod recipe;
pub mod stage;
pub mod step;

pub use catalog::OpCatalog;
pub use error::{AuthoringError, OpError, StepError};
pub use op::{
    ConfigResolver, Op, OpContract, OpKind, Strategy, StrategyRun, StrategySelection,
    DEFAULT_STRATEGY,
};
pub use recipe::{Recipe, RecipeBuilder, RecipeStep};
pub use stage::{Stage, StageInternal, ToInternalFn, KNOBS_KEY};
pub use step::{
    NormalizeContext, NormalizeFn, ShouldRunFn, Step, StepContract, StepContractBuilder, StepRun,
};
