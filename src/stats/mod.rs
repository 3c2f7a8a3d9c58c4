// src/stats/mod.rs
// =============================================================================
// Fix statistics and the notification opt-out set.
//
// Submodules:
// - snapshot: the JSON file layout plus atomic writes
// - store: the mutex-guarded in-memory store that everything else talks to
// =============================================================================

mod snapshot;
mod store;

#[cfg(test)]
pub use snapshot::Snapshot;
pub use store::{RankedEntry, StatsStore};
