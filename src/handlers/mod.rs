// src/handlers/mod.rs
// =============================================================================
// The link handler registry.
//
// Submodules:
// - link: one descriptor per platform (Twitter, Instagram, Tiktok)
// =============================================================================

mod link;

pub use link::{registry, LinkHandler, DOMAIN_GROUP};
