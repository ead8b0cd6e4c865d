//! The shared, process-wide directory of live sources.
//!
//! One mutex guards registry structure. Every structural mutation (register,
//! unregister, rename) happens under it, so the tick's lookup observes
//! either the old mapping or the new one, never a partial rename. The tick's
//! critical section is a single map lookup plus a weak upgrade; the
//! per-sample value copy happens outside the lock against the resolved
//! source's own port bank.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::label::Label;
use crate::registry::Registry;
use crate::source::{SourceEndpoint, SourceShared};
use crate::types::TeleportError;

/// Retry bound for unique-label generation. The label space holds 62^4
/// candidates, so hitting this bound means the registry is pathologically
/// full and the instance should fail loudly instead of spinning.
pub const MAX_LABEL_ATTEMPTS: u32 = 256;

#[derive(Default)]
pub struct Directory {
    registry: Mutex<Registry>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly created source under a generated unique label.
    pub(crate) fn register_new(
        &self,
        shared: &Arc<SourceShared>,
    ) -> Result<Label, TeleportError> {
        let mut registry = self.registry.lock();
        let label = draw_unique(&registry)?;
        registry.insert(label.clone(), Arc::downgrade(shared));
        debug!(label = %label, "registered source");
        Ok(label)
    }

    /// Register a source restored from persisted state.
    ///
    /// The saved label is adopted when it parses and is not claimed by a
    /// live source. A claim means this restore is a duplication of an
    /// existing instance rather than a load, so a fresh label is generated
    /// to preserve uniqueness. Missing or malformed labels also fall back
    /// to generation.
    pub(crate) fn register_restored(
        &self,
        saved: Option<&str>,
        shared: &Arc<SourceShared>,
    ) -> Result<Label, TeleportError> {
        let mut registry = self.registry.lock();
        let label = match saved.and_then(|text| Label::parse(text).ok()) {
            Some(label) if !registry.exists(&label) => label,
            Some(label) => {
                warn!(label = %label, "restored label already claimed, generating a new one");
                draw_unique(&registry)?
            }
            None => draw_unique(&registry)?,
        };
        registry.insert(label.clone(), Arc::downgrade(shared));
        debug!(label = %label, "registered restored source");
        Ok(label)
    }

    /// Remove a source's entry. Runs from the endpoint's `Drop`, before its
    /// shared storage can be reclaimed.
    pub(crate) fn unregister(&self, label: &Label) {
        self.registry.lock().remove(label);
        debug!(label = %label, "unregistered source");
    }

    /// Move a source to a new label. Returns false without mutating anything
    /// when the new label is empty, oversized, or claimed by a different
    /// live source; renaming to the current label is a success no-op.
    ///
    /// Remove-old/set/insert-new all happen under the registry lock, so a
    /// concurrent resolve sees either the old label or the new one.
    pub(crate) fn rename(&self, source: &SourceEndpoint, new_label: &str) -> bool {
        let Ok(new_label) = Label::parse(new_label) else {
            return false;
        };
        let mut registry = self.registry.lock();
        let mut current = source.label.lock();
        if *current == new_label {
            return true;
        }
        if registry.exists(&new_label) {
            debug!(label = %new_label, "rename rejected, label in use");
            return false;
        }
        registry.remove(&current);
        registry.insert(new_label.clone(), Arc::downgrade(source.shared()));
        debug!(from = %current, to = %new_label, "renamed source");
        *current = new_label;
        true
    }

    pub fn exists(&self, label: &Label) -> bool {
        self.registry.lock().exists(label)
    }

    pub fn resolve(&self, label: &Label) -> Option<Arc<SourceShared>> {
        self.registry.lock().resolve(label)
    }

    /// Target a newly created relay should bind to: the most recently
    /// inserted live label, else the first label in order, else nothing.
    pub fn default_target(&self) -> Option<Label> {
        let registry = self.registry.lock();
        if let Some(last) = registry.last_inserted() {
            if registry.exists(last) {
                return Some(last.clone());
            }
        }
        registry.first_in_order().map(|(label, _)| label)
    }

    /// Live labels in order, for the source-selector UI.
    pub fn labels(&self) -> Vec<Label> {
        self.registry.lock().labels()
    }

    pub fn len(&self) -> usize {
        self.registry.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.lock().is_empty()
    }
}

fn draw_unique(registry: &Registry) -> Result<Label, TeleportError> {
    for _ in 0..MAX_LABEL_ATTEMPTS {
        let candidate = Label::random();
        if !registry.exists(&candidate) {
            return Ok(candidate);
        }
    }
    Err(TeleportError::LabelSpaceExhausted {
        attempts: MAX_LABEL_ATTEMPTS,
    })
}
