use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::config::BasicConfig;
use crate::transport::append_path;

/// Mushroom Observer (source platform) configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// Site origin; also the prefix that classifies a URL as belonging to this platform.
    /// TOML: `platforms.source.base_url`. Default: `https://mushroomobserver.org`.
    #[serde(default = "default_base_url")]
    pub base_url: Url,

    /// API root below `base_url`.
    /// TOML: `platforms.source.api_path`. Default: `/api2`.
    #[serde(default = "default_api_path")]
    pub api_path: String,

    /// Minimum spacing between two request starts, in milliseconds.
    /// TOML: `platforms.source.min_interval_ms`. Default: `1500`.
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    /// Falls back to `basic.user_agent` when unset.
    /// TOML: `platforms.source.user_agent`.
    #[serde(default)]
    pub user_agent: Option<String>,

    /// TOML: `platforms.source.username`.
    #[serde(default)]
    pub username: String,

    /// Personal API key created on the source site.
    /// TOML: `platforms.source.api_key`.
    #[serde(default)]
    pub api_key: String,

    /// Observations per `detail=high` page; used to pick the page a run starts on.
    /// TOML: `platforms.source.page_size`. Default: `100`.
    #[serde(default = "default_page_size")]
    pub page_size: u64,
}

#[derive(Debug, Clone)]
pub struct SourceResolvedConfig {
    pub base_url: Url,
    pub api_url: Url,
    pub user_agent: String,
    pub username: String,
    pub api_key: String,
    pub page_size: u64,
}

impl SourceConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn resolve(&self, basic: &BasicConfig) -> SourceResolvedConfig {
        SourceResolvedConfig {
            base_url: self.base_url.clone(),
            api_url: append_path(&self.base_url, &self.api_path),
            user_agent: self
                .user_agent
                .clone()
                .unwrap_or_else(|| basic.user_agent.clone()),
            username: self.username.clone(),
            api_key: self.api_key.clone(),
            page_size: self.page_size.max(1),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_path: default_api_path(),
            min_interval_ms: default_min_interval_ms(),
            user_agent: None,
            username: String::new(),
            api_key: String::new(),
            page_size: default_page_size(),
        }
    }
}

fn default_base_url() -> Url {
    Url::parse("https://mushroomobserver.org").expect("default source base_url must be a valid URL")
}

fn default_api_path() -> String {
    "/api2".to_string()
}

fn default_min_interval_ms() -> u64 {
    1500
}

fn default_page_size() -> u64 {
    100
}
