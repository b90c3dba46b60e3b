mod basic;
mod mirror;
mod platforms;
mod request;

pub use basic::BasicConfig;
pub use mirror::MirrorConfig;
pub use platforms::{
    DestinationConfig, DestinationResolvedConfig, PlatformsConfig, SourceConfig,
    SourceResolvedConfig,
};
pub use request::RequestConfig;

use figment::{
    Figment,
    providers::{Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, sync::LazyLock};

use crate::transport::{PacingIntervals, RequestPolicy, ServiceRegistry};

/// Application configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Process-wide settings (see `basic` table in config.toml).
    #[serde(default)]
    pub basic: BasicConfig,

    /// Retry and pacing contract shared by both platform clients (see `request` table).
    #[serde(default)]
    pub request: RequestConfig,

    /// Source and destination platform settings (see `platforms` table).
    #[serde(default)]
    pub platforms: PlatformsConfig,

    /// Mirror run settings (see `mirror` table).
    #[serde(default)]
    pub mirror: MirrorConfig,
}

const DEFAULT_CONFIG_FILE: &str = "config.toml";

impl Config {
    /// Builds a Figment that merges defaults and a config TOML file.
    pub fn figment() -> Figment {
        let figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if PathBuf::from(DEFAULT_CONFIG_FILE).is_file() {
            figment.merge(Toml::file(DEFAULT_CONFIG_FILE))
        } else {
            figment
        }
    }

    /// Loads configuration by merging defaults and `config.toml` if present.
    ///
    /// Credentials are not validated here; the binary checks them against the live services.
    pub fn from_optional_toml() -> Self {
        Self::figment().extract().unwrap_or_else(|err| {
            panic!("failed to extract configuration (defaults + optional config.toml): {err}")
        })
    }

    pub fn source(&self) -> SourceResolvedConfig {
        self.platforms.source.resolve(&self.basic)
    }

    pub fn destination(&self) -> DestinationResolvedConfig {
        self.platforms.destination.resolve(&self.basic)
    }

    /// Origins used to decide which rate-limit clock a URL belongs to.
    pub fn service_registry(&self) -> ServiceRegistry {
        ServiceRegistry::new(
            self.platforms.source.base_url.clone(),
            self.platforms.destination.base_url.clone(),
        )
    }

    pub fn request_policy(&self) -> RequestPolicy {
        self.request.policy(PacingIntervals {
            source: self.platforms.source.min_interval(),
            destination: self.platforms.destination.min_interval(),
            unclassified: self.request.unclassified_pause(),
        })
    }
}

/// Global, lazily-initialized configuration instance.
pub static CONFIG: LazyLock<Config> = LazyLock::new(Config::from_optional_toml);
