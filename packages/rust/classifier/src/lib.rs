//! Entry type classification.
//!
//! This crate provides:
//! - [`TypeRegistry`]: ordered, first-match-wins table of type descriptors
//! - [`TypeClassifier`]: resolves an entry's type, cascading from its parent
//! - [`Classification`] / [`ResolvedType`]: the result threaded through a walk

mod builtin;
pub mod classify;
pub mod registry;

pub use classify::{Classification, ResolvedType, TypeClassifier, clean_title};
pub use registry::{TypeRegistry, matches};
