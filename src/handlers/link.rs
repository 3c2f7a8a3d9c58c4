// src/handlers/link.rs
// =============================================================================
// One descriptor per supported platform.
//
// Each handler knows:
// - which substrings mark an unfixed link from its platform (source markers)
// - which substrings mark a link that is already fixed (ignore markers)
// - the domain that replaces the platform domain (canonical domain)
// - an optional note appended under every fixed link
// - the regex that pulls full URLs out of free text
//
// The set of platforms is closed, so this is an enum rather than a trait.
// =============================================================================

use regex::Regex;
use std::sync::OnceLock;

/// Capture group holding the platform domain in every handler pattern.
///
/// All patterns are laid out as (scheme)(domain)(rest...), so the rewrite
/// engine can swap the domain without touching the path.
pub const DOMAIN_GROUP: usize = 2;

static TWITTER_REGEX: OnceLock<Regex> = OnceLock::new();
static INSTAGRAM_REGEX: OnceLock<Regex> = OnceLock::new();
static TIKTOK_REGEX: OnceLock<Regex> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkHandler {
    /// Twitter, X and Nitter status links
    Twitter,
    /// Instagram posts and reels
    Instagram,
    /// Short vt.tiktok.com links
    Tiktok,
}

impl LinkHandler {
    /// Registration order. The rewrite engine walks handlers in this order.
    pub const ALL: [LinkHandler; 3] = [
        LinkHandler::Twitter,
        LinkHandler::Instagram,
        LinkHandler::Tiktok,
    ];

    const TWITTER_PATTERN: &'static str = r"(https?://)((?:www\.)?twitter\.com|x\.com|nitter\.net)(/[-a-zA-Z0-9()@:%_+.~#?&=]*)(/status/[-a-zA-Z0-9()@:%_+.~#?&=]*)(/photo/[0-9]*)?";
    const INSTAGRAM_PATTERN: &'static str =
        r"(https?://)((?:www\.)?instagram\.com)(/reel/|/p/)([-a-zA-Z0-9()@:%_+.~#?&=/]*)";
    const TIKTOK_PATTERN: &'static str = r"(https?://)(vt\.tiktok\.com/)([-a-zA-Z0-9()@:%_+.~#&=/]*/)";

    /// Unique platform name, also the key used in the stats file
    pub fn name(self) -> &'static str {
        match self {
            LinkHandler::Twitter => "Twitter",
            LinkHandler::Instagram => "Instagram",
            LinkHandler::Tiktok => "Tiktok",
        }
    }

    pub fn canonical_domain(self) -> &'static str {
        match self {
            LinkHandler::Twitter => "fxtwitter.com",
            LinkHandler::Instagram => "ddinstagram.com",
            LinkHandler::Tiktok => "tnktok.com",
        }
    }

    /// Extra line shown under every link this handler fixes
    pub fn status_note(self) -> Option<&'static str> {
        match self {
            LinkHandler::Instagram => {
                Some("ddinstagram is unstable, some links may not embed correctly.")
            }
            LinkHandler::Twitter | LinkHandler::Tiktok => None,
        }
    }

    pub fn ignore_markers(self) -> &'static [&'static str] {
        match self {
            LinkHandler::Twitter => &["fxtwitter.com", "vxtwitter.com"],
            LinkHandler::Instagram => &["ddinstagram.com"],
            LinkHandler::Tiktok => &["tnktok.com"],
        }
    }

    pub fn source_markers(self) -> &'static [&'static str] {
        match self {
            LinkHandler::Twitter => &["twitter.com", "x.com", "nitter.net"],
            LinkHandler::Instagram => &["instagram.com"],
            LinkHandler::Tiktok => &["vt.tiktok.com"],
        }
    }

    /// Compiled URL pattern, built once per handler on first use
    pub fn pattern(self) -> &'static Regex {
        // The patterns are constants, so a failure here is a programming error
        match self {
            LinkHandler::Twitter => TWITTER_REGEX.get_or_init(|| {
                Regex::new(Self::TWITTER_PATTERN).expect("invalid Twitter link pattern")
            }),
            LinkHandler::Instagram => INSTAGRAM_REGEX.get_or_init(|| {
                Regex::new(Self::INSTAGRAM_PATTERN).expect("invalid Instagram link pattern")
            }),
            LinkHandler::Tiktok => TIKTOK_REGEX.get_or_init(|| {
                Regex::new(Self::TIKTOK_PATTERN).expect("invalid Tiktok link pattern")
            }),
        }
    }

    /// Looks a handler up by its stats key
    #[cfg(test)]
    pub fn from_name(name: &str) -> Option<LinkHandler> {
        Self::ALL.into_iter().find(|handler| handler.name() == name)
    }

    /// True when any source marker appears in `text`
    pub fn has_source(self, text: &str) -> bool {
        self.source_markers().iter().any(|marker| text.contains(marker))
    }

    /// True when any ignore marker appears in `text`
    pub fn has_ignored(self, text: &str) -> bool {
        self.ignore_markers().iter().any(|marker| text.contains(marker))
    }
}

/// The registered handlers, in registration order
pub fn registry() -> &'static [LinkHandler] {
    &LinkHandler::ALL
}
