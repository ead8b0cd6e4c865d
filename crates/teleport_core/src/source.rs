//! Publishing endpoints.
//!
//! A source endpoint claims a label in the directory and republishes its
//! host module's input ports into a shared bank every tick. Relays resolve
//! the label and mirror the bank; they never see the host module itself.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock, RwLockReadGuard};

use crate::directory::Directory;
use crate::label::Label;
use crate::metadata::PortDescription;
use crate::poly::{NUM_TELEPORT_PORTS, PortBank};
use crate::types::{PortReader, SourceState, TeleportError, UpstreamWalker};

/// The state a source shares with its subscribers through the registry.
///
/// The port bank is written by the source's tick and read by relay ticks;
/// the descriptions are written and read only from the interactive domain.
/// `ports_changed` is a monotonically increasing change counter, bumped on
/// wiring changes so relays know when their cached metadata went stale
/// without recomputing anything per sample.
pub struct SourceShared {
    ports: RwLock<PortBank>,
    ports_changed: AtomicU64,
    descriptions: Mutex<[PortDescription; NUM_TELEPORT_PORTS]>,
}

impl SourceShared {
    pub(crate) fn new() -> Self {
        Self {
            ports: RwLock::new(PortBank::default()),
            ports_changed: AtomicU64::new(0),
            descriptions: Mutex::new(Default::default()),
        }
    }

    pub(crate) fn read_ports(&self) -> RwLockReadGuard<'_, PortBank> {
        self.ports.read()
    }

    /// Copy of the currently published bank, for inspection.
    pub fn snapshot(&self) -> PortBank {
        *self.ports.read()
    }

    /// Current change stamp of this source's wiring.
    pub fn ports_changed(&self) -> u64 {
        self.ports_changed.load(Ordering::Acquire)
    }

    /// Cached upstream descriptions, one per port.
    pub fn descriptions(&self) -> [PortDescription; NUM_TELEPORT_PORTS] {
        self.descriptions.lock().clone()
    }

    pub(crate) fn set_descriptions(&self, descriptions: [PortDescription; NUM_TELEPORT_PORTS]) {
        *self.descriptions.lock() = descriptions;
        // Bumped after the descriptions are in place so a reader that
        // observes the new stamp also observes the new descriptions.
        self.ports_changed.fetch_add(1, Ordering::Release);
    }

    #[cfg(test)]
    pub(crate) fn set_descriptions_without_stamp(
        &self,
        descriptions: [PortDescription; NUM_TELEPORT_PORTS],
    ) {
        *self.descriptions.lock() = descriptions;
    }
}

/// A publishing module instance. Owned by the host module lifecycle; the
/// directory holds only a weak handle to `shared`.
pub struct SourceEndpoint {
    directory: Arc<Directory>,
    shared: Arc<SourceShared>,
    pub(crate) label: Mutex<Label>,
}

impl SourceEndpoint {
    /// Create a source under a freshly generated unique label.
    pub fn create(directory: Arc<Directory>) -> Result<Self, TeleportError> {
        let shared = Arc::new(SourceShared::new());
        let label = directory.register_new(&shared)?;
        Ok(Self {
            directory,
            shared,
            label: Mutex::new(label),
        })
    }

    /// Restore a source from persisted state. The saved label is kept when
    /// it is free; a collision (this is a duplicate, not a load) or a
    /// missing/malformed label yields a fresh one.
    pub fn restore(directory: Arc<Directory>, state: &SourceState) -> Result<Self, TeleportError> {
        let shared = Arc::new(SourceShared::new());
        let label = directory.register_restored(state.label.as_deref(), &shared)?;
        Ok(Self {
            directory,
            shared,
            label: Mutex::new(label),
        })
    }

    pub fn label(&self) -> Label {
        self.label.lock().clone()
    }

    /// Change this source's label. Returns whether the label was updated;
    /// on failure nothing changes and the UI shows its transient error
    /// indicator instead.
    pub fn rename(&self, new_label: &str) -> bool {
        self.directory.rename(self, new_label)
    }

    pub fn save(&self) -> SourceState {
        SourceState {
            label: Some(self.label().as_str().to_owned()),
        }
    }

    /// Copy this tick's input values from the host wiring into the shared
    /// bank. Tick domain; bounded work, no allocation.
    pub fn publish<R: PortReader + ?Sized>(&self, reader: &R) {
        let mut bank = self.shared.ports.write();
        for i in 0..NUM_TELEPORT_PORTS {
            let port = bank.port_mut(i);
            let reported = reader.channel_count(i);
            port.set_channels(reported);
            for c in 0..port.channels() {
                port.set(c, if c < reported { reader.voltage(i, c) } else { 0.0 });
            }
            port.set_connected(reader.is_connected(i));
        }
    }

    /// The host wiring of one of this source's ports changed
    /// (connect/disconnect). Recompute the per-port upstream descriptions
    /// and bump the change stamp. Interactive domain only: this is the
    /// expensive patch walk relays must never trigger per sample.
    pub fn note_wiring_changed<W: UpstreamWalker + ?Sized>(&self, walker: &W) {
        let descriptions =
            std::array::from_fn(|i| PortDescription::from_upstream(walker.upstream(i)));
        self.shared.set_descriptions(descriptions);
    }

    pub(crate) fn shared(&self) -> &Arc<SourceShared> {
        &self.shared
    }
}

impl Drop for SourceEndpoint {
    /// The registry entry goes first. Only after `unregister` returns can
    /// the shared storage be reclaimed, so a concurrent resolve either
    /// misses the label or holds its own strong handle past our drop.
    fn drop(&mut self) {
        let label = self.label.lock().clone();
        self.directory.unregister(&label);
    }
}
