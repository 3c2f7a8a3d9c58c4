// src/error.rs
// =============================================================================
// Errors that come back from the chat platform.
//
// The rest of the application uses anyhow, but the event handlers need to
// tell a permission problem apart from a message that no longer exists, so
// the platform boundary gets its own typed error.
// =============================================================================

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    /// The bot lacks the permission needed for this call
    #[error("missing permission: {0}")]
    Forbidden(String),

    /// A message, user or channel could not be resolved
    #[error("not found: {0}")]
    NotFound(String),

    #[error("platform error: {0}")]
    Other(String),
}

impl PlatformError {
    pub fn is_forbidden(&self) -> bool {
        matches!(self, PlatformError::Forbidden(_))
    }
}
