// src/config.rs
// =============================================================================
// Loads the bot configuration from a JSON file.
//
// Example config.json:
//   {
//     "stats_path": "stats.json",
//     "flush_interval_secs": 60,
//     "status": "fixing your links",
//     "status_count": false,
//     "suppress_delay_ms": 400,
//     "delete_emoji": "❌",
//     "notification_command": "/notifications",
//     "max_messages": 1000
//   }
//
// Every field has a default, so a partial file works. If the file does not
// exist yet we write the defaults out so there is something to edit.
// =============================================================================

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the stats file lives
    pub stats_path: PathBuf,
    /// Seconds between background stats flushes
    pub flush_interval_secs: u64,
    /// Fixed presence text, used when status_count is off
    pub status: String,
    /// Show the running number of fixed links as the presence instead
    pub status_count: bool,
    /// Wait before suppressing the original preview. The platform sometimes
    /// attaches embeds a moment after the message arrives.
    pub suppress_delay_ms: u64,
    /// Reaction that lets the link author delete the bot's reply
    pub delete_emoji: String,
    /// Opt-out command named in reply notifications
    pub notification_command: String,
    /// Messages `serve` remembers for resolving replies and reactions
    pub max_messages: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            stats_path: PathBuf::from("stats.json"),
            flush_interval_secs: 60,
            status: String::new(),
            status_count: false,
            suppress_delay_ms: 400,
            delete_emoji: "❌".to_string(),
            notification_command: "/notifications".to_string(),
            max_messages: 1000,
        }
    }
}

impl Config {
    /// Reads the config at `path`, creating it with defaults when missing
    pub fn load_or_init(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Config::default();
            let json = serde_json::to_string_pretty(&config)?;
            fs::write(path, json)
                .with_context(|| format!("failed writing default config: {}", path.display()))?;
            warn!(path = %path.display(), "config not found, wrote defaults");
            return Ok(config);
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        let config = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing config: {}", path.display()))?;
        Ok(config)
    }

    pub fn flush_interval(&self) -> Duration {
        // A zero period would make tokio's interval panic
        Duration::from_secs(self.flush_interval_secs.max(1))
    }

    pub fn suppress_delay(&self) -> Duration {
        Duration::from_millis(self.suppress_delay_ms)
    }
}
