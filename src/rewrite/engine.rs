// src/rewrite/engine.rs
// =============================================================================
// This module finds fixable links in a message and rewrites them.
//
// How it works:
// 1. scan() checks every registered handler against the whole message
//    (source marker present, no ignore marker anywhere)
// 2. rewrite() runs one handler's regex over the message and swaps the
//    platform domain of each URL for the handler's canonical domain
// 3. fix_all() does both for every matching handler
//
// Nothing in here touches the network or the stats store, so it is all
// plain synchronous code.
// =============================================================================

use serde::Serialize;
use tracing::debug;

use crate::handlers::{registry, LinkHandler, DOMAIN_GROUP};

/// Spoiler delimiter used by the chat platform
const SPOILER: &str = "||";

/// One rewritten URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixedLink {
    /// Handler that produced this link (its stats key)
    pub handler: &'static str,
    /// The rewritten URL, without spoiler tags
    pub url: String,
    /// Whether the link gets wrapped in spoiler tags
    pub spoiler: bool,
}

impl FixedLink {
    /// Renders the link the way it appears in the reply: spoiler-wrapped when
    /// needed, with the handler's note on the following line.
    pub fn render(&self, note: Option<&str>) -> String {
        let mut block = if self.spoiler {
            format!("{SPOILER}{}{SPOILER}", self.url)
        } else {
            self.url.clone()
        };
        if let Some(note) = note {
            block.push('\n');
            block.push_str(note);
        }
        block
    }
}

/// The outcome of running one handler over one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixResult {
    pub handler: LinkHandler,
    /// Rewritten links in the order they appear in the message
    pub links: Vec<FixedLink>,
}

impl FixResult {
    /// Number of links fixed, which is what gets recorded in the stats
    pub fn count(&self) -> u64 {
        self.links.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Newline-joined replacement text for this handler
    pub fn text(&self) -> String {
        let note = self.handler.status_note();
        self.links
            .iter()
            .map(|link| link.render(note))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Returns every handler with an unfixed link in the message, in
/// registration order. Each handler appears at most once.
pub fn scan(message: &str) -> Vec<LinkHandler> {
    registry()
        .iter()
        .copied()
        .filter(|handler| handler.has_source(message) && !handler.has_ignored(message))
        .collect()
}

/// Rewrites every URL `handler` extracts from `message`.
///
/// Returns None when the pattern found no URL at all. A Some result may still
/// be empty if every extracted URL was skipped.
pub fn rewrite(message: &str, handler: LinkHandler) -> Option<FixResult> {
    let spoiler = has_spoiler(message);
    let mut matched = 0usize;
    let mut links = Vec::new();

    for caps in handler.pattern().captures_iter(message) {
        matched += 1;

        // Group 0 is the concatenation of every component group
        let Some(whole) = caps.get(0) else { continue };
        let Some(domain) = caps.get(DOMAIN_GROUP) else { continue };
        let raw = whole.as_str();

        // A message can mix fixed and unfixed links, so check each URL too
        if !handler.has_source(raw) || handler.has_ignored(raw) {
            debug!(url = raw, handler = handler.name(), "skipping link");
            continue;
        }

        let Some(new_domain) = replace_domain(domain.as_str(), handler) else {
            debug!(url = raw, handler = handler.name(), "no source marker in domain");
            continue;
        };

        let start = domain.start() - whole.start();
        let end = domain.end() - whole.start();
        let url = format!("{}{}{}", &raw[..start], new_domain, &raw[end..]);

        links.push(FixedLink {
            handler: handler.name(),
            url,
            spoiler,
        });
    }

    if matched == 0 {
        return None;
    }

    Some(FixResult { handler, links })
}

/// Scans the message and rewrites it with every matching handler.
/// Only results that actually fixed something are returned, in handler order.
pub fn fix_all(message: &str) -> Vec<FixResult> {
    scan(message)
        .into_iter()
        .filter_map(|handler| rewrite(message, handler))
        .filter(|result| !result.is_empty())
        .collect()
}

/// Spoiler detection is for the whole message: one matched pair of `||`
/// anywhere spoilers every rewritten link.
pub fn has_spoiler(message: &str) -> bool {
    message.matches(SPOILER).count() >= 2
}

// Swaps the first source marker found in the domain for the canonical
// domain and drops a leading "www."
fn replace_domain(domain: &str, handler: LinkHandler) -> Option<String> {
    let marker = handler
        .source_markers()
        .iter()
        .find(|marker| domain.contains(*marker))?;

    let replaced = domain.replacen(marker, handler.canonical_domain(), 1);
    Some(replaced.trim_start_matches("www.").to_string())
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. What is captures_iter?
//    - Runs the regex over the whole text, yielding one Captures per match
//    - caps.get(n) returns the n-th group with its byte offsets
//    - Group 0 is always the full match
//
// 2. Why slice with domain.start() - whole.start()?
//    - Match offsets are relative to the full message
//    - raw is only the URL, so offsets have to be shifted
//
// 3. What is let-else?
//    - `let Some(x) = value else { continue };` binds x or leaves the loop
//      iteration early, without nesting the rest of the body in an if let
// -----------------------------------------------------------------------------
