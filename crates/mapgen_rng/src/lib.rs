//! MAPGEN Deterministic RNG
//!
//! Label-keyed random draws. Every label owns its own stream derived from
//! the world seed, so a draw depends only on the seed, the label and how
//! many draws that label has already made.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod label;

pub use label::{derive_seed, LabelRng, StreamState};
