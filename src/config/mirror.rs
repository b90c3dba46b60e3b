use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, time::Duration};

/// Mirror run configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MirrorConfig {
    /// How many unmirrored observations a run copies.
    /// TOML: `mirror.count`. Default: `1`.
    #[serde(default = "default_count")]
    pub count: usize,

    /// Known source names and the destination taxon id they map to.
    /// TOML: `[mirror.taxon_dictionary]`, e.g. `"Amanita muscaria" = 48715`.
    #[serde(default)]
    pub taxon_dictionary: BTreeMap<String, u64>,

    /// Window between two mirrored observations during which ctrl-c stops the run cleanly.
    /// TOML: `mirror.pause_between_ms`. Default: `5000`.
    #[serde(default = "default_pause_between_ms")]
    pub pause_between_ms: u64,

    /// Keep a half-built destination observation when a later step fails.
    /// TOML: `mirror.keep_incomplete`. Default: `false`.
    #[serde(default)]
    pub keep_incomplete: bool,
}

impl MirrorConfig {
    pub fn pause_between(&self) -> Duration {
        Duration::from_millis(self.pause_between_ms)
    }
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            count: default_count(),
            taxon_dictionary: BTreeMap::new(),
            pause_between_ms: default_pause_between_ms(),
            keep_incomplete: false,
        }
    }
}

fn default_count() -> usize {
    1
}

fn default_pause_between_ms() -> u64 {
    5000
}
