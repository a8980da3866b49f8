//! Configuration schema types for peerlink.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod call;
mod ice;
mod identity;
mod logging;
mod media;
mod relay;

pub use call::*;
pub use ice::*;
pub use identity::*;
pub use logging::*;
pub use media::*;
pub use relay::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerlinkConfig {
    pub identity: IdentityConfig,
    pub relay: RelayConfig,
    pub ice: IceConfig,
    pub media: MediaConfig,
    pub call: CallConfig,
    pub logging: LoggingConfig,
}
