// src/rewrite/mod.rs
// =============================================================================
// This module contains the message rewrite logic.
//
// Submodules:
// - engine: finds fixable links and rewrites them per handler
// - reply: turns the per-handler results into the reply text
//
// Rust concepts:
// - Modules: Organize code into namespaces
// - pub use: Re-export items to simplify imports for users of this module
// =============================================================================

mod engine;
mod reply;

pub use engine::{fix_all, rewrite, scan};
pub use reply::{compose_reply, with_preview_warning};
#[cfg(test)]
pub use reply::PREVIEW_WARNING;
