//! Ordered table of entry type descriptors.

use std::sync::Arc;

use atlasdash_shared::{Entry, TypeDescriptor};

use crate::builtin;

/// Ordered list of [`TypeDescriptor`]s. The first descriptor that matches wins.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    descriptors: Vec<Arc<TypeDescriptor>>,
}

impl TypeRegistry {
    /// Create a registry from descriptors in priority order.
    pub fn new(descriptors: Vec<TypeDescriptor>) -> Self {
        Self {
            descriptors: descriptors.into_iter().map(Arc::new).collect(),
        }
    }

    /// The built-in Apex / Visualforce reference rules.
    pub fn builtin() -> Self {
        Self::new(builtin::descriptors())
    }

    /// Use configured rules, or the built-in table when none are configured.
    pub fn from_config(types: &[TypeDescriptor]) -> Self {
        if types.is_empty() {
            Self::builtin()
        } else {
            Self::new(types.to_vec())
        }
    }

    /// Find the first descriptor matching `entry` by id or by title.
    pub fn first_match(&self, entry: &Entry) -> Option<&Arc<TypeDescriptor>> {
        self.descriptors.iter().find(|d| matches(d, entry))
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.descriptors.iter().map(|d| d.as_ref())
    }
}

/// Whether `descriptor` recognises `entry`. Id and title strategies are OR-ed.
pub fn matches(descriptor: &TypeDescriptor, entry: &Entry) -> bool {
    matches_id(descriptor, entry) || matches_title(descriptor, entry)
}

fn matches_id(descriptor: &TypeDescriptor, entry: &Entry) -> bool {
    pattern(&descriptor.id_exact).is_some_and(|id| entry.id == id)
        || pattern(&descriptor.id_prefix).is_some_and(|prefix| entry.id.starts_with(prefix))
}

fn matches_title(descriptor: &TypeDescriptor, entry: &Entry) -> bool {
    pattern(&descriptor.title_prefix).is_some_and(|prefix| entry.text.starts_with(prefix))
        || pattern(&descriptor.title_suffix).is_some_and(|suffix| entry.text.ends_with(suffix))
}

/// Empty patterns would match every entry; treat them as unset.
fn pattern(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|p| !p.is_empty())
}
