// src/platform/mod.rs
// =============================================================================
// The boundary to the chat platform.
//
// Submodules:
// - types: ids, users, messages and the inbound Event enum
// - traits: the ChatPlatform trait with every outbound call the bot makes
// - console: an in-memory platform driven by JSON lines
//
// A real gateway (websocket connection, command registration, permissions)
// would be another ChatPlatform implementation next to console.
// =============================================================================

mod console;
mod traits;
mod types;

pub use console::{ConsoleEvent, ConsolePlatform};
#[cfg(test)]
pub use console::{Action, ConsoleUser, Permissions};
pub use traits::ChatPlatform;
pub use types::{Event, Message, NotificationsCommand, ReactionAdd, ToggleCommand, User, UserId};
