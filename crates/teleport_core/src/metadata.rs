//! Cached descriptions of where relayed signals come from.
//!
//! Recomputing a port's upstream description means walking the host patch,
//! which is far too expensive for the tick. Sources rebuild their own
//! descriptions when the host reports a wiring change; relays copy that
//! cache only when the source's change stamp has moved past what they last
//! saw. The result is at most one interactive step stale, which is accepted.

use std::fmt;

use crate::poly::NUM_TELEPORT_PORTS;
use crate::source::SourceShared;
use crate::types::UpstreamInfo;

/// Human-readable origin of one relayed port, for the relay's own tooltips.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum PortDescription {
    #[default]
    NotConnected,
    Fed {
        module: String,
        port: String,
    },
}

impl PortDescription {
    pub fn from_upstream(info: Option<UpstreamInfo>) -> Self {
        match info {
            Some(info) => PortDescription::Fed {
                module: info.module_name,
                port: info.port_name,
            },
            None => PortDescription::NotConnected,
        }
    }
}

impl fmt::Display for PortDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDescription::NotConnected => f.write_str("not connected"),
            PortDescription::Fed { module, port } => write!(f, "{module} – {port}"),
        }
    }
}

/// Relay-side pull cache keyed by the source's change stamp.
#[derive(Debug, Default)]
pub(crate) struct MetadataCache {
    descriptions: [PortDescription; NUM_TELEPORT_PORTS],
    /// Source change stamp the descriptions were copied at
    seen_stamp: u64,
    /// Whether the last sync saw a resolvable source
    saw_valid: bool,
    /// Set on explicit retargeting; forces the next sync
    forced: bool,
}

impl MetadataCache {
    /// Force the next sync to recopy, regardless of stamps. Called when the
    /// user changes which label the relay targets.
    pub(crate) fn invalidate(&mut self) {
        self.forced = true;
    }

    /// The target did not resolve: collapse everything to "not connected".
    pub(crate) fn note_unresolved(&mut self) {
        if self.saw_valid || self.forced {
            self.descriptions = Default::default();
            self.saw_valid = false;
            self.forced = false;
        }
    }

    /// The target resolved: copy the source's cached descriptions if the
    /// stamp moved, the source just became visible, or a retarget forced it.
    pub(crate) fn sync(&mut self, source: &SourceShared) {
        let stamp = source.ports_changed();
        if self.forced || !self.saw_valid || stamp != self.seen_stamp {
            self.descriptions = source.descriptions();
            self.seen_stamp = stamp;
            self.saw_valid = true;
            self.forced = false;
        }
    }

    pub(crate) fn descriptions(&self) -> [PortDescription; NUM_TELEPORT_PORTS] {
        self.descriptions.clone()
    }
}
