// src/notify/mod.rs
// Reply notifications for people whose links the bot fixed.

mod reply_chain;

pub use reply_chain::{opt_out_confirmation, ReplyNotifier};
