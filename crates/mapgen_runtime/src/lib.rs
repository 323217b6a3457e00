//! MAPGEN Runtime
//!
//! Replays a compiled plan against a live map context. Steps run strictly
//! in plan order; a failing step is recorded and the run moves on.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod engine;
pub mod executor;
pub mod monitor;
pub mod report;

pub use engine::{Engine, EngineConfig, EngineError, Generation};
pub use executor::{ExecutorError, PipelineExecutor};
pub use monitor::Metrics;
pub use report::{RunReport, StepOutcome, StepStatus};
