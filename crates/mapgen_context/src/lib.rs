//! MAPGEN Map Context
//!
//! The per-run mutable state: host adapter, field buffers, artifact store,
//! labelled RNG and execution trace, plus the tag predicates evaluated
//! against them.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapter;
pub mod artifact;
pub mod buffer;
pub mod context;
pub mod tags;
pub mod trace;

pub use adapter::{MapAdapter, MockAdapter, MOCK_BIOMES, MOCK_FEATURES, MOCK_TERRAINS};
pub use artifact::{ArtifactError, ArtifactPolicy, ArtifactSpec, ArtifactStore};
pub use buffer::FieldBuffers;
pub use context::{ContextError, MapContext};
pub use tags::{ContextPredicate, TagPredicate, TagRegistry};
pub use trace::{TraceEvent, TraceEventKind, TraceLog};
