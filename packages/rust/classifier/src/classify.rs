//! Type resolution with cascading down the hierarchy.

use std::sync::Arc;

use atlasdash_shared::{DocsetError, Entry, Result, TypeDescriptor};
use tracing::trace;

use crate::registry::TypeRegistry;

// ---------------------------------------------------------------------------
// ResolvedType
// ---------------------------------------------------------------------------

/// The type chosen for one entry.
///
/// Shares the matched descriptor; only the container and hidden flags can
/// differ from it (through inheritance).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedType {
    descriptor: Arc<TypeDescriptor>,
    is_container: bool,
    is_hidden: bool,
}

impl ResolvedType {
    pub fn new(descriptor: Arc<TypeDescriptor>) -> Self {
        Self {
            is_container: descriptor.is_container,
            is_hidden: descriptor.is_hidden,
            descriptor,
        }
    }

    /// The type a child inherits from this one. Container exclusion is not heritable.
    pub fn derive_child(&self) -> Self {
        Self {
            descriptor: Arc::clone(&self.descriptor),
            is_container: false,
            is_hidden: self.is_hidden,
        }
    }

    /// OR `hidden` into this type.
    pub fn hidden_if(self, hidden: bool) -> Self {
        Self {
            is_hidden: self.is_hidden || hidden,
            ..self
        }
    }

    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    pub fn type_name(&self) -> &str {
        &self.descriptor.type_name
    }

    pub fn is_valid(&self) -> bool {
        self.descriptor.is_valid()
    }

    pub fn is_container(&self) -> bool {
        self.is_container
    }

    pub fn is_hidden(&self) -> bool {
        self.is_hidden
    }

    pub fn push_name(&self) -> bool {
        self.descriptor.push_name
    }

    pub fn show_namespace(&self) -> bool {
        self.descriptor.show_namespace
    }

    pub fn force_cascade(&self) -> bool {
        self.descriptor.force_cascade
    }

    /// Whether children without a match of their own inherit this type.
    pub fn cascades(&self) -> bool {
        self.descriptor.cascade || self.descriptor.force_cascade || self.is_container
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Classification state threaded through the walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Classification {
    /// Never classified, or classification failed.
    #[default]
    Unresolved,
    Resolved(ResolvedType),
}

impl Classification {
    pub fn resolved(&self) -> Option<&ResolvedType> {
        match self {
            Self::Unresolved => None,
            Self::Resolved(t) => Some(t),
        }
    }
}

impl From<ResolvedType> for Classification {
    fn from(t: ResolvedType) -> Self {
        Self::Resolved(t)
    }
}

// ---------------------------------------------------------------------------
// TypeClassifier
// ---------------------------------------------------------------------------

/// Resolves entry types against a [`TypeRegistry`].
#[derive(Debug, Clone)]
pub struct TypeClassifier {
    registry: TypeRegistry,
}

impl TypeClassifier {
    pub fn new(registry: TypeRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// The entry's own type: the first registry match, ignoring ancestors.
    pub fn lookup(&self, entry: &Entry) -> Result<ResolvedType> {
        self.registry
            .first_match(entry)
            .map(|d| ResolvedType::new(Arc::clone(d)))
            .ok_or_else(|| DocsetError::TypeNotFound {
                text: entry.text.clone(),
                id: entry.id.clone(),
            })
    }

    /// The entry's effective type given its parent's classification.
    pub fn resolve(&self, entry: &Entry, parent: &Classification) -> Result<ResolvedType> {
        let parent = parent.resolved();

        if let Some(parent) = parent.filter(|p| p.force_cascade()) {
            trace!(id = %entry.id, type_name = parent.type_name(), "forced cascade");
            return Ok(parent.derive_child());
        }

        match self.lookup(entry) {
            Ok(own) => Ok(own.hidden_if(parent.is_some_and(ResolvedType::is_hidden))),
            Err(not_found) => match parent.filter(|p| p.cascades()) {
                Some(parent) => {
                    trace!(id = %entry.id, type_name = parent.type_name(), "inherited type");
                    Ok(parent.derive_child())
                }
                None => Err(not_found),
            },
        }
    }

    /// Whether an entry classified as `classification` belongs in the index.
    pub fn should_index(&self, classification: &Classification) -> bool {
        classification
            .resolved()
            .is_some_and(|t| t.is_valid() && !t.is_container() && !t.is_hidden())
    }

    /// The display title of `entry` under `resolved`.
    pub fn clean_title(&self, entry: &Entry, resolved: &ResolvedType) -> String {
        clean_title(entry, resolved.descriptor())
    }
}

/// Apply the descriptor's title override or suffix trimming.
pub fn clean_title(entry: &Entry, descriptor: &TypeDescriptor) -> String {
    if let Some(title) = &descriptor.title_override {
        return title.clone();
    }
    if descriptor.no_trim {
        return entry.text.clone();
    }
    match descriptor.title_suffix.as_deref().filter(|s| !s.is_empty()) {
        Some(suffix) => entry
            .text
            .strip_suffix(suffix)
            .and_then(|rest| rest.strip_suffix(' '))
            .unwrap_or(entry.text.as_str())
            .to_string(),
        None => entry.text.clone(),
    }
}
