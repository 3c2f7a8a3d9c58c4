// src/rewrite/reply.rs
// Builds the text of the bot's reply from the per-handler fix results.

use super::engine::FixResult;

/// Prepended to the reply when the bot may not suppress the original preview
pub const PREVIEW_WARNING: &str = ":prohibited: I don't have permission to suppress embeds in the message I am replying to, please give me the `Manage Messages` permission to avoid clutter.";

/// Joins the handler results into one reply.
///
/// Results are emitted in reverse handler order. Empty results are dropped;
/// None means there is nothing to post.
pub fn compose_reply(results: &[FixResult]) -> Option<String> {
    let blocks: Vec<String> = results
        .iter()
        .rev()
        .filter(|result| !result.is_empty())
        .map(FixResult::text)
        .collect();

    if blocks.is_empty() {
        return None;
    }

    Some(blocks.join("\n"))
}

pub fn with_preview_warning(reply: &str) -> String {
    format!("{PREVIEW_WARNING}\n{reply}")
}
