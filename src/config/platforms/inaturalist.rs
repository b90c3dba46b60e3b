use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::config::BasicConfig;
use crate::transport::append_path;

/// iNaturalist (destination platform) configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DestinationConfig {
    /// API origin; also the prefix that classifies a URL as belonging to this platform.
    /// TOML: `platforms.destination.base_url`. Default: `https://api.inaturalist.org`.
    #[serde(default = "default_base_url")]
    pub base_url: Url,

    /// API root below `base_url`.
    /// TOML: `platforms.destination.api_path`. Default: `/v1`.
    #[serde(default = "default_api_path")]
    pub api_path: String,

    /// Public site used for links written back to the source.
    /// TOML: `platforms.destination.web_url`. Default: `https://www.inaturalist.org`.
    #[serde(default = "default_web_url")]
    pub web_url: Url,

    /// Minimum spacing between two request starts, in milliseconds.
    /// TOML: `platforms.destination.min_interval_ms`. Default: `5000`.
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    /// Falls back to `basic.user_agent` when unset.
    /// TOML: `platforms.destination.user_agent`.
    #[serde(default)]
    pub user_agent: Option<String>,

    /// TOML: `platforms.destination.username`.
    #[serde(default)]
    pub username: String,

    /// API token (JWT) for write calls.
    /// TOML: `platforms.destination.jwt`.
    #[serde(default)]
    pub jwt: String,
}

#[derive(Debug, Clone)]
pub struct DestinationResolvedConfig {
    pub api_url: Url,
    pub web_url: Url,
    pub user_agent: String,
    pub username: String,
    pub jwt: String,
}

impl DestinationConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn resolve(&self, basic: &BasicConfig) -> DestinationResolvedConfig {
        DestinationResolvedConfig {
            api_url: append_path(&self.base_url, &self.api_path),
            web_url: self.web_url.clone(),
            user_agent: self
                .user_agent
                .clone()
                .unwrap_or_else(|| basic.user_agent.clone()),
            username: self.username.clone(),
            jwt: self.jwt.clone(),
        }
    }
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_path: default_api_path(),
            web_url: default_web_url(),
            min_interval_ms: default_min_interval_ms(),
            user_agent: None,
            username: String::new(),
            jwt: String::new(),
        }
    }
}

fn default_base_url() -> Url {
    Url::parse("https://api.inaturalist.org")
        .expect("default destination base_url must be a valid URL")
}

fn default_api_path() -> String {
    "/v1".to_string()
}

fn default_web_url() -> Url {
    Url::parse("https://www.inaturalist.org").expect("default destination web_url must be a valid URL")
}

fn default_min_interval_ms() -> u64 {
    5000
}
