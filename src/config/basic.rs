use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Basic (process-wide) configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BasicConfig {
    /// Log level for tracing subscriber initialization (e.g., "error", "warn", "info", "debug", "trace").
    /// TOML: `basic.loglevel`. Default: `info`.
    #[serde(default = "default_loglevel")]
    pub loglevel: String,

    /// Directory receiving raw dumps of responses that could not be parsed.
    /// TOML: `basic.diagnostic_dir`. Default: `.`.
    #[serde(default = "default_diagnostic_dir")]
    pub diagnostic_dir: PathBuf,

    /// User-Agent sent to both platforms unless a platform overrides it.
    /// TOML: `basic.user_agent`. Default: `Mushroom Observer/iNaturalist Mirror`.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            loglevel: default_loglevel(),
            diagnostic_dir: default_diagnostic_dir(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_loglevel() -> String {
    "info".to_string()
}

fn default_diagnostic_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_user_agent() -> String {
    "Mushroom Observer/iNaturalist Mirror".to_string()
}
