//! Subscribing endpoints.
//!
//! A relay holds a target label by name, not by pointer. Every tick it
//! resolves the label against the directory and mirrors whatever source
//! currently owns it, so a rename or deletion takes effect on the very
//! next tick with no handshake. The label handle itself is swapped
//! atomically: the UI writes it, the tick only reads it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwapOption;
use parking_lot::{Mutex, RwLock};

use crate::directory::Directory;
use crate::label::Label;
use crate::metadata::{MetadataCache, PortDescription};
use crate::poly::{NUM_TELEPORT_PORTS, PortBank};
use crate::types::RelayState;

/// Per-port connection indicator, the abstract form of the green/red light
/// pair next to each output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Indicator {
    /// Target unresolved; both lights dark
    Off,
    /// Relaying a port whose upstream side has a cable (green)
    Connected,
    /// Relaying a port with nothing plugged in upstream (red)
    Disconnected,
}

/// A subscribing module instance.
pub struct RelayEndpoint {
    directory: Arc<Directory>,
    /// Target label; `None` is unbound. Written by the interactive domain,
    /// read by the tick as a single atomic handle load.
    target: ArcSwapOption<Label>,
    outputs: RwLock<PortBank>,
    source_valid: AtomicBool,
    metadata: Mutex<MetadataCache>,
}

impl RelayEndpoint {
    /// Create a relay bound to the directory's current default target (the
    /// most recently created live source), or unbound when no sources
    /// exist.
    pub fn create(directory: Arc<Directory>) -> Self {
        let target = directory.default_target();
        Self {
            source_valid: AtomicBool::new(target.is_some()),
            target: ArcSwapOption::from(target.map(Arc::new)),
            outputs: RwLock::new(PortBank::default()),
            metadata: Mutex::new(MetadataCache::default()),
            directory,
        }
    }

    /// Restore a relay from persisted state. The saved label is adopted
    /// verbatim even when no such source exists (it shows up as missing
    /// until one claims the label); empty or malformed labels mean unbound.
    pub fn restore(directory: Arc<Directory>, state: &RelayState) -> Self {
        let target = state
            .label
            .as_deref()
            .and_then(|text| Label::parse(text).ok());
        Self {
            source_valid: AtomicBool::new(false),
            target: ArcSwapOption::from(target.map(Arc::new)),
            outputs: RwLock::new(PortBank::default()),
            metadata: Mutex::new(MetadataCache::default()),
            directory,
        }
    }

    /// The label this relay currently targets. A `Some` value with
    /// `source_valid() == false` is the "missing" presentation state.
    pub fn target(&self) -> Option<Label> {
        self.target.load_full().map(|label| (*label).clone())
    }

    /// Point this relay at a different label (or unbind it). Interactive
    /// domain; takes effect on the next tick.
    pub fn set_target(&self, label: Option<Label>) {
        self.target.store(label.map(Arc::new));
        self.metadata.lock().invalidate();
    }

    /// Whether the last tick resolved the target to a live source.
    pub fn source_valid(&self) -> bool {
        self.source_valid.load(Ordering::Acquire)
    }

    /// One per-sample step: resolve the target and mirror the source's
    /// ports, or emit the fallback. Bounded work, no allocation; the only
    /// suspension point is the directory's lookup lock.
    pub fn tick(&self) {
        let target = self.target.load();
        let resolved = target
            .as_ref()
            .and_then(|label| self.directory.resolve(label));

        match resolved {
            Some(source) => {
                // The strong handle keeps the bank alive through the copy
                // even if the source is destroyed mid-tick.
                let bank = source.read_ports();
                self.outputs.write().copy_from(&bank);
                self.source_valid.store(true, Ordering::Release);
            }
            None => {
                self.outputs.write().reset();
                self.source_valid.store(false, Ordering::Release);
            }
        }
    }

    /// Indicator for one output port.
    pub fn indicator(&self, port: usize) -> Indicator {
        if !self.source_valid() {
            return Indicator::Off;
        }
        if self.outputs.read().port(port).is_connected() {
            Indicator::Connected
        } else {
            Indicator::Disconnected
        }
    }

    /// Copy of the current output bank, for the host's cable reads and for
    /// inspection.
    pub fn outputs(&self) -> PortBank {
        *self.outputs.read()
    }

    /// Voltage of one output channel, as the host engine consumes it.
    pub fn voltage(&self, port: usize, channel: usize) -> f32 {
        self.outputs.read().port(port).get(channel)
    }

    pub fn channels(&self, port: usize) -> usize {
        self.outputs.read().port(port).channels()
    }

    /// Refresh the cached per-port descriptions if the source's wiring
    /// changed, the source just (dis)appeared, or the target was switched.
    /// Interactive domain; the tick never touches the cache.
    pub fn refresh_metadata(&self) {
        let resolved = self
            .target
            .load_full()
            .and_then(|label| self.directory.resolve(&label));
        let mut cache = self.metadata.lock();
        match resolved {
            Some(source) => cache.sync(&source),
            None => cache.note_unresolved(),
        }
    }

    /// Cached descriptions of where each relayed port's signal comes from.
    pub fn descriptions(&self) -> [PortDescription; NUM_TELEPORT_PORTS] {
        self.metadata.lock().descriptions()
    }

    pub fn save(&self) -> RelayState {
        RelayState {
            label: Some(
                self.target()
                    .map(|label| label.as_str().to_owned())
                    .unwrap_or_default(),
            ),
        }
    }
}
