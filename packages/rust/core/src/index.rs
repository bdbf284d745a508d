//! Turns classified entries into search index rows.

use std::sync::Arc;

use atlasdash_classifier::{Classification, ResolvedType, clean_title};
use atlasdash_shared::{DocLocation, Entry, IndexRecord, Result};
use atlasdash_storage::Storage;
use tracing::debug;

use crate::walker::NamespaceStack;

/// Writes index records for one document into the index store.
pub struct IndexWriter<'a> {
    storage: &'a Storage,
    doc: Arc<DocLocation>,
    count: u64,
}

impl<'a> IndexWriter<'a> {
    pub fn new(storage: &'a Storage, doc: Arc<DocLocation>) -> Self {
        Self {
            storage,
            doc,
            count: 0,
        }
    }

    /// Records inserted so far (duplicates ignored by the store are not counted).
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Persist the record for `entry`. Does nothing for linkless entries or
    /// entries without a valid type.
    pub async fn record(
        &mut self,
        entry: &Entry,
        classification: &Classification,
        namespace: &NamespaceStack,
    ) -> Result<Option<IndexRecord>> {
        let Some(resolved) = classification.resolved().filter(|t| t.is_valid()) else {
            return Ok(None);
        };
        let Some(record) = build_record(entry, resolved, namespace, &self.doc)? else {
            return Ok(None);
        };

        if self.storage.insert_record(&record).await? {
            self.count += 1;
        }
        debug!("{} is indexed as a {}", record.name, record.type_name);
        Ok(Some(record))
    }
}

/// The index row for `entry`, or `None` when it has no link.
///
/// The path keeps the in-page anchor so deep links resolve.
pub fn build_record(
    entry: &Entry,
    resolved: &ResolvedType,
    namespace: &NamespaceStack,
    doc: &DocLocation,
) -> Result<Option<IndexRecord>> {
    if entry.link().is_none() {
        return Ok(None);
    }

    let title = clean_title(entry, resolved.descriptor());
    let name = match namespace.innermost() {
        Some(ns) if resolved.show_namespace() => format!("{ns}.{title}"),
        _ => title,
    };

    Ok(Some(IndexRecord {
        name,
        type_name: resolved.type_name().to_string(),
        path: doc.content_path(entry, false)?,
    }))
}
