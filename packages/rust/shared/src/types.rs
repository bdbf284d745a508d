//! Core domain types for atlasdash docsets.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{DocsetError, Result};

/// Treat an explicit JSON `null` like a missing key.
fn null_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Feed document
// ---------------------------------------------------------------------------

/// The table-of-contents document published for one deliverable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AtlasToc {
    /// Every published version, newest first.
    #[serde(deserialize_with = "null_default")]
    pub available_versions: Vec<VersionInfo>,
    /// HTML of the deliverable's landing page.
    #[serde(deserialize_with = "null_default")]
    pub content: String,
    pub content_document_id: String,
    /// Deliverable identifier (e.g. `apexcode`).
    pub deliverable: String,
    #[serde(deserialize_with = "null_default")]
    pub doc_title: String,
    pub locale: String,
    #[serde(deserialize_with = "null_default")]
    pub language: LanguageInfo,
    pub pdf_url: String,
    /// Root entries of the hierarchy.
    #[serde(rename = "toc", deserialize_with = "null_default")]
    pub entries: Vec<Entry>,
    pub title: String,
    /// The version this document was served at.
    #[serde(deserialize_with = "null_default")]
    pub version: VersionInfo,
}

/// Display and linking information for the document language.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageInfo {
    pub label: String,
    pub locale: String,
    pub url: String,
}

/// One published documentation version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionInfo {
    /// Canonical version used in content URLs (e.g. `224.0`).
    pub doc_version: String,
    pub release_version: String,
    /// Human-readable version (e.g. `Spring '22`).
    pub version_text: String,
    pub version_url: String,
}

/// A content fragment returned for a single entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TocContent {
    pub id: String,
    pub title: String,
    pub content: String,
}

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// One node of the documentation hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Entry {
    /// Display title.
    #[serde(deserialize_with = "null_default")]
    pub text: String,
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(rename = "a_attr", deserialize_with = "null_default")]
    pub link_attr: LinkAttr,
    #[serde(deserialize_with = "null_default")]
    pub children: Vec<Entry>,
}

/// Attributes of the entry's anchor element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkAttr {
    #[serde(deserialize_with = "null_default")]
    pub href: String,
}

impl Entry {
    /// Create a structural entry with no link and no children.
    pub fn new(text: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            id: id.into(),
            ..Self::default()
        }
    }

    /// Attach a content link.
    pub fn with_link(mut self, href: impl Into<String>) -> Self {
        self.link_attr.href = href.into();
        self
    }

    /// Replace the children.
    pub fn with_children(mut self, children: Vec<Entry>) -> Self {
        self.children = children;
        self
    }

    /// The content link, if the entry has one.
    pub fn link(&self) -> Option<&str> {
        if self.link_attr.href.is_empty() {
            None
        } else {
            Some(&self.link_attr.href)
        }
    }

    /// The relative link, optionally without its in-page anchor.
    ///
    /// A `#` in first position is part of the link, not an anchor separator.
    pub fn rel_link(&self, remove_anchor: bool) -> Option<&str> {
        let href = self.link()?;
        if remove_anchor {
            if let Some(idx) = href.rfind('#').filter(|&i| i > 0) {
                return Some(&href[..idx]);
            }
        }
        Some(href)
    }
}

// ---------------------------------------------------------------------------
// DocLocation
// ---------------------------------------------------------------------------

/// Locale, deliverable and version of the document an entry belongs to.
///
/// Every content path and content URL is a function of this plus the entry link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocLocation {
    pub locale: String,
    pub deliverable: String,
    pub doc_version: String,
}

impl DocLocation {
    pub fn from_toc(toc: &AtlasToc) -> Self {
        Self {
            locale: toc.locale.clone(),
            deliverable: toc.deliverable.clone(),
            doc_version: toc.version.doc_version.clone(),
        }
    }

    /// Canonical path of the entry's content, relative to the build directory.
    pub fn content_path(&self, entry: &Entry, remove_anchor: bool) -> Result<String> {
        let rel_link = entry.rel_link(remove_anchor).ok_or_else(|| {
            DocsetError::validation(format!("link not found for {}", entry.id))
        })?;

        Ok(format!(
            "atlas.{}.{}.meta/{}/{}",
            self.locale, self.deliverable, self.deliverable, rel_link
        ))
    }
}

// ---------------------------------------------------------------------------
// TypeDescriptor
// ---------------------------------------------------------------------------

/// A declarative rule recognising and labelling one semantic entry type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeDescriptor {
    /// Index type name. Empty marks a structural placeholder that is never indexed.
    pub type_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_exact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_suffix: Option<String>,
    /// Replaces the entry title entirely when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_override: Option<String>,
    /// Keep the title verbatim instead of trimming the suffix.
    pub no_trim: bool,
    /// Push this entry's title onto the namespace stack for its subtree.
    pub push_name: bool,
    /// Prefix the index name with the innermost namespace.
    pub show_namespace: bool,
    /// Exclude this node from the index while still typing its children.
    pub is_container: bool,
    /// Exclude this node and every descendant from the index.
    pub is_hidden: bool,
    /// Propagate this type to children that have no match of their own.
    pub cascade: bool,
    /// Propagate this type to children even when they match something else.
    pub force_cascade: bool,
}

impl TypeDescriptor {
    /// Whether this descriptor names a real index type.
    pub fn is_valid(&self) -> bool {
        !self.type_name.is_empty()
    }
}

// ---------------------------------------------------------------------------
// IndexRecord
// ---------------------------------------------------------------------------

/// One row of the docset search index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub path: String,
}
