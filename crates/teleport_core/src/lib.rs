//! Named-endpoint signal relay for a modular synthesis host.
//!
//! One module instance publishes a fixed bank of polyphonic ports under a
//! short text label; any number of relay instances subscribe to that label
//! and mirror the published values every audio sample, while the label
//! directory is concurrently created, renamed, and destroyed from the
//! interactive thread.
//!
//! The crate is a pure library: the host's module lifecycle, port wiring,
//! and UI are collaborators reached through the traits in [`types`].

pub mod directory;
pub mod label;
pub mod metadata;
pub mod poly;
pub mod registry;
pub mod relay;
pub mod source;
pub mod types;

// Re-export commonly used items
pub use directory::{Directory, MAX_LABEL_ATTEMPTS};
pub use label::{Label, MAX_LABEL_LEN};
pub use metadata::PortDescription;
pub use poly::{NUM_TELEPORT_PORTS, PORT_MAX_CHANNELS, PolyPort, PortBank};
pub use registry::Registry;
pub use relay::{Indicator, RelayEndpoint};
pub use source::{SourceEndpoint, SourceShared};
pub use types::{
    PortReader, RelayState, SourceState, TeleportError, UpstreamInfo, UpstreamWalker,
};
