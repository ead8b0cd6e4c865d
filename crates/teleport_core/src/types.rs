//! Collaborator traits, persisted state, and the subsystem error type.

use serde::{Deserialize, Serialize};

use crate::label::MAX_LABEL_LEN;

/// Read surface the host wiring exposes for one source's ports.
///
/// Called from the tick domain every sample; implementations must not
/// allocate or block.
pub trait PortReader {
    fn channel_count(&self, port: usize) -> usize;
    fn voltage(&self, port: usize, channel: usize) -> f32;
    fn is_connected(&self, port: usize) -> bool;
}

/// Upstream connection info the host exposes for tooltip-style metadata.
///
/// Walking the patch for this is expensive; it is only ever called from the
/// interactive domain when wiring actually changed.
pub trait UpstreamWalker {
    fn upstream(&self, port: usize) -> Option<UpstreamInfo>;
}

/// Display names of the module/port feeding one of a source's ports.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpstreamInfo {
    pub module_name: String,
    pub port_name: String,
}

/// Persisted state of a source endpoint.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceState {
    #[serde(default)]
    pub label: Option<String>,
}

impl SourceState {
    /// Lenient read from an arbitrary JSON value: a missing or non-string
    /// `label` field is treated as absent.
    pub fn from_value(value: &serde_json::Value) -> Self {
        Self {
            label: value
                .get("label")
                .and_then(|v| v.as_str())
                .map(str::to_owned),
        }
    }
}

/// Persisted state of a relay endpoint.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RelayState {
    #[serde(default)]
    pub label: Option<String>,
}

impl RelayState {
    /// Lenient read from an arbitrary JSON value, mirroring
    /// [`SourceState::from_value`].
    pub fn from_value(value: &serde_json::Value) -> Self {
        Self {
            label: value
                .get("label")
                .and_then(|v| v.as_str())
                .map(str::to_owned),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TeleportError {
    #[error("label must not be empty")]
    EmptyLabel,

    #[error("label `{0}` is longer than {MAX_LABEL_LEN} characters")]
    LabelTooLong(String),

    /// Unique-label generation gave up. Only reachable when the label space
    /// is essentially full, which no real patch approaches; the bounded
    /// retry exists so a pathological registry fails the instance loudly
    /// instead of looping forever.
    #[error("gave up generating a unique label after {attempts} attempts")]
    LabelSpaceExhausted { attempts: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_roundtrip() {
        let state = SourceState {
            label: Some("k3Qz".into()),
        };
        let text = serde_json::to_string(&state).unwrap();
        let back: SourceState = serde_json::from_str(&text).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn test_missing_label_is_absent() {
        let state: RelayState = serde_json::from_str("{}").unwrap();
        assert_eq!(state.label, None);
    }

    #[test]
    fn test_malformed_label_is_absent() {
        let state = SourceState::from_value(&json!({ "label": 42 }));
        assert_eq!(state.label, None);

        let state = SourceState::from_value(&json!({ "label": "abcd" }));
        assert_eq!(state.label.as_deref(), Some("abcd"));
    }
}
