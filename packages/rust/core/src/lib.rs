//! Core pipeline orchestration and domain logic for atlasdash.
//!
//! This crate ties together the feed client, type classification, the
//! throttled content fetcher and the index store into the end-to-end
//! `build_docset` workflow.

pub mod fetcher;
pub mod index;
pub mod page;
pub mod pipeline;
pub mod walker;

#[cfg(test)]
mod test_support;

pub use fetcher::{FetchStats, ThrottledFetcher};
pub use index::{IndexWriter, build_record};
pub use pipeline::{BuildResult, BuildSummary, ProgressReporter, SilentProgress, build_docset};
pub use walker::{HierarchyWalker, NamespaceStack, WalkStats};
