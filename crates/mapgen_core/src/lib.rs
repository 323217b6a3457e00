//! MAPGEN Core Types
//!
//! This crate contains pure types and logic with no I/O.
//! Everything here is shared by the authoring, compile and execution layers.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod env;
pub mod error;
pub mod hash;
pub mod id;
pub mod tag;

// Re-exports
pub use env::{Dimensions, Env, LatitudeBounds, Wrap};
pub use error::{CoreError, CoreResult};
pub use hash::Hash;
pub use id::{RunId, StepId};
pub use tag::{DependencyTag, TagSet};
