//! Depth-first walk of one document tree.
//!
//! The walk itself is sequential: classification, namespace bookkeeping and
//! index writes happen in document order. Only content downloads run
//! concurrently, through the shared [`ThrottledFetcher`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use atlasdash_classifier::{Classification, TypeClassifier};
use atlasdash_shared::{DocLocation, Entry, Result};
use atlasdash_storage::Storage;
use tracing::{debug, warn};

use crate::fetcher::ThrottledFetcher;
use crate::index::IndexWriter;
use crate::pipeline::ProgressReporter;

// ---------------------------------------------------------------------------
// NamespaceStack
// ---------------------------------------------------------------------------

/// Titles of the ancestors whose type pushes a name, outermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceStack {
    frames: Vec<String>,
}

impl NamespaceStack {
    pub fn push(&mut self, name: String) {
        self.frames.push(name);
    }

    pub fn pop(&mut self) -> Option<String> {
        self.frames.pop()
    }

    /// The closest enclosing namespace.
    pub fn innermost(&self) -> Option<&str> {
        self.frames.last().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

// ---------------------------------------------------------------------------
// HierarchyWalker
// ---------------------------------------------------------------------------

/// Counters for one walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    /// Entries visited below the root.
    pub visited: usize,
    /// Linked entries handed to the fetcher.
    pub scheduled: usize,
    /// Linked entries no descriptor matched.
    pub unclassified: usize,
    /// Records newly written to the index.
    pub records: u64,
}

/// Visits one tree, scheduling downloads and writing index records.
///
/// A walker owns its namespace stack, so create a fresh one per tree.
pub struct HierarchyWalker<'a> {
    classifier: &'a TypeClassifier,
    fetcher: &'a mut ThrottledFetcher,
    index: IndexWriter<'a>,
    namespace: NamespaceStack,
    doc: Arc<DocLocation>,
    progress: &'a dyn ProgressReporter,
    stats: WalkStats,
}

impl<'a> HierarchyWalker<'a> {
    pub fn new(
        classifier: &'a TypeClassifier,
        fetcher: &'a mut ThrottledFetcher,
        storage: &'a Storage,
        doc: Arc<DocLocation>,
        progress: &'a dyn ProgressReporter,
    ) -> Self {
        Self {
            classifier,
            fetcher,
            index: IndexWriter::new(storage, Arc::clone(&doc)),
            namespace: NamespaceStack::default(),
            doc,
            progress,
            stats: WalkStats::default(),
        }
    }

    /// Walk the tree under `root`.
    ///
    /// The root itself is only classified (to seed its children); it is never
    /// fetched or indexed.
    pub async fn walk(mut self, root: &Entry) -> Result<WalkStats> {
        let classification = match self.classifier.resolve(root, &Classification::Unresolved) {
            Ok(resolved) => Classification::from(resolved),
            Err(e) if e.is_recoverable() => Classification::Unresolved,
            Err(e) => return Err(e),
        };
        debug!(root = %root.id, ?classification, "walking tree");

        self.visit(root, &classification).await?;
        self.stats.records = self.index.count();
        Ok(self.stats)
    }

    fn visit<'b>(
        &'b mut self,
        entry: &'b Entry,
        classification: &'b Classification,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + 'b>> {
        Box::pin(async move {
            let pushed = match classification.resolved() {
                Some(resolved) if resolved.push_name() => {
                    let name = self.classifier.clean_title(entry, resolved);
                    self.namespace.push(name);
                    true
                }
                _ => false,
            };

            for child in &entry.children {
                let child_classification = self.process_child(child, classification).await?;
                if !child.children.is_empty() {
                    self.visit(child, &child_classification).await?;
                }
            }

            if pushed {
                self.namespace.pop();
            }
            Ok(())
        })
    }

    /// Classify, schedule and index one child. Returns the classification its
    /// own children inherit from.
    async fn process_child(
        &mut self,
        child: &Entry,
        parent: &Classification,
    ) -> Result<Classification> {
        self.stats.visited += 1;

        // Structural node: nothing to fetch, and nothing to hand down.
        if child.link().is_none() {
            return Ok(Classification::Unresolved);
        }

        let classification = match self.classifier.resolve(child, parent) {
            Ok(resolved) => Classification::from(resolved),
            Err(e) if e.is_recoverable() => {
                warn!("{e}");
                self.stats.unclassified += 1;
                Classification::Unresolved
            }
            Err(e) => return Err(e),
        };

        self.fetcher.schedule(child, &self.doc).await?;
        self.stats.scheduled += 1;

        if self.classifier.should_index(&classification) {
            if let Some(record) = self
                .index
                .record(child, &classification, &self.namespace)
                .await?
            {
                self.progress.entry_indexed(&record);
            }
        }

        Ok(classification)
    }
}
