//! MAPGEN Schema
//!
//! Structural shapes, the dynamic value model, and the single
//! validate-and-apply-defaults routine shared by configs and artifacts.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod canonical;
pub mod issue;
pub mod path;
pub mod resolve;
pub mod shape;
pub mod value;

pub use canonical::{canonical_bytes, canonical_bytes_of};
pub use issue::{summarize, IssueCode, SchemaIssue};
pub use path::Path;
pub use resolve::{resolve, validate, Mode, ValidationContext};
pub use shape::{
    defaults_of, ArrayShape, BooleanShape, BufferLength, BufferShape, Field, NumberShape,
    ObjectShape, Shape, StringShape, UnionShape, UnknownKeys,
};
pub use value::{Buffer, BufferKind, Map, Value};
