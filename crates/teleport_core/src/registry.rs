//! The label → source directory, as a pure data structure.
//!
//! The registry never owns a source's lifetime: it maps labels to weak
//! handles, and the endpoint lifecycle removes entries synchronously on
//! destruction. A handle that fails to upgrade is treated as absent rather
//! than trusted (the same prune-don't-trust rule the rest of the codebase
//! applies to weak references), but synchronous removal, not upgrading, is
//! the mechanism that keeps lookups consistent.
//!
//! No locking policy lives at this layer; see [`Directory`](crate::Directory).

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use crate::label::Label;
use crate::source::SourceShared;

#[derive(Default)]
pub struct Registry {
    /// Ordered by label for deterministic enumeration
    sources: BTreeMap<Label, Weak<SourceShared>>,
    /// Used to give newly created relays a sensible default target
    last_inserted: Option<Label>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a mapping, overwriting any existing entry for the label.
    ///
    /// The registry itself does not enforce label uniqueness; callers gate
    /// insertion on [`exists`](Self::exists) under the directory lock.
    pub fn insert(&mut self, label: Label, source: Weak<SourceShared>) {
        self.last_inserted = Some(label.clone());
        self.sources.insert(label, source);
    }

    /// Remove a mapping. No-op if the label is absent.
    pub fn remove(&mut self, label: &Label) {
        self.sources.remove(label);
    }

    pub fn exists(&self, label: &Label) -> bool {
        self.resolve(label).is_some()
    }

    pub fn resolve(&self, label: &Label) -> Option<Arc<SourceShared>> {
        self.sources.get(label).and_then(Weak::upgrade)
    }

    /// First live source in label order.
    pub fn first_in_order(&self) -> Option<(Label, Arc<SourceShared>)> {
        self.sources
            .iter()
            .find_map(|(label, weak)| weak.upgrade().map(|source| (label.clone(), source)))
    }

    /// Label of the most recent insertion, live or not.
    pub fn last_inserted(&self) -> Option<&Label> {
        self.last_inserted.as_ref()
    }

    /// All live labels, in order.
    pub fn labels(&self) -> Vec<Label> {
        self.sources
            .iter()
            .filter(|(_, weak)| weak.upgrade().is_some())
            .map(|(label, _)| label.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
