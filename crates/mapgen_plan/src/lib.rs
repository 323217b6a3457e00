//! MAPGEN Plan
//!
//! Compiles a recipe, a generation environment and author overrides into
//! an immutable, fully resolved execution plan.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compiler;
pub mod error;
pub mod plan;

pub use compiler::{compile, Compiler};
pub use error::{codes, CompileError, CompileFailure};
pub use plan::{ExecutionPlan, PlanNode};
