// src/stats/snapshot.rs
// =============================================================================
// The on-disk shape of the stats file and the code that reads/writes it.
//
// File format (JSON):
//   {
//     "Twitter":   { "servers": {"123": 4}, "users": {"456": 4}, "links_fixed": 4 },
//     "Instagram": { "servers": {}, "users": {}, "links_fixed": 0 },
//     ...
//     "ignored":   { "456": true }
//   }
//
// Every key is a string. BTreeMap keeps the output ordered so the file
// diffs nicely between flushes.
// =============================================================================

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::handlers::LinkHandler;

/// Counters for a single handler
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerStats {
    #[serde(default)]
    pub servers: BTreeMap<String, u64>,
    #[serde(default)]
    pub users: BTreeMap<String, u64>,
    #[serde(default)]
    pub links_fixed: u64,
}

/// Everything the stats file holds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Users who opted out of reply notifications
    #[serde(default)]
    pub ignored: BTreeMap<String, bool>,
    /// Per-handler counters, keyed by handler name at the top level
    #[serde(flatten)]
    pub handlers: BTreeMap<String, HandlerStats>,
}

impl Snapshot {
    /// Empty counters for each of `handlers` and no opted-out users
    pub fn zeroed(handlers: &[LinkHandler]) -> Self {
        let mut snapshot = Snapshot::default();
        snapshot.ensure_handlers(handlers);
        snapshot
    }

    /// Adds zeroed counters for any handler the file doesn't know yet
    pub fn ensure_handlers(&mut self, handlers: &[LinkHandler]) {
        for handler in handlers {
            self.handlers.entry(handler.name().to_string()).or_default();
        }
    }

    /// Reads a snapshot from disk. A missing file is Ok(None).
    pub fn read(path: &Path) -> Result<Option<Snapshot>> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed reading stats file: {}", path.display()))
            }
        };

        let snapshot = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing stats file: {}", path.display()))?;
        Ok(Some(snapshot))
    }
}

/// Writes `content` next to `path` and renames it over the old file, so a
/// crash mid-write never leaves a truncated stats file behind.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed creating stats directory: {}", parent.display()))?;
        }
    }

    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, content)
        .with_context(|| format!("failed writing stats temp file: {}", temp_path.display()))?;

    if let Err(rename_error) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(rename_error)
            .with_context(|| format!("failed replacing stats file: {}", path.display()));
    }

    Ok(())
}
