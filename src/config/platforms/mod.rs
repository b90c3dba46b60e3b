mod inaturalist;
mod mushroom_observer;

pub use inaturalist::{DestinationConfig, DestinationResolvedConfig};
pub use mushroom_observer::{SourceConfig, SourceResolvedConfig};

use serde::{Deserialize, Serialize};

/// Both ends of the mirror.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct PlatformsConfig {
    /// Platform the observations are read from.
    #[serde(default)]
    pub source: SourceConfig,

    /// Platform the observations are copied to.
    #[serde(default)]
    pub destination: DestinationConfig,
}
