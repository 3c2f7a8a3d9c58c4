// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Commands:
// - serve: run the bot against the console platform (JSON events on stdin)
// - fix: show what the bot would reply to a message, without recording it
// - stats: look at the fix counters
// - notifications: toggle a user's reply notifications (bot must be stopped)
// =============================================================================

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "link-fixer",
    version = "0.1.0",
    about = "Rewrites social-media links into embed-friendly mirrors and tracks fix stats",
    long_about = "link-fixer watches chat messages for Twitter/X, Instagram and TikTok links, \
                  replies with versions that embed properly and keeps per-server and per-user \
                  counts of every link it fixed."
)]
pub struct Cli {
    /// Path to the JSON config file (created with defaults if missing)
    #[arg(long, global = true, default_value = "config.json")]
    pub config: PathBuf,

    /// Log debug output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the bot, reading newline-delimited JSON events from stdin
    ///
    /// Example line:
    /// {"type":"message","id":1,"channel_id":2,"server_id":3,"author":{"id":7,"name":"alice"},"content":"https://x.com/a/status/1"}
    Serve,

    /// Print the reply the bot would post for a message
    ///
    /// Example: link-fixer fix "look https://twitter.com/alice/status/123"
    Fix {
        /// The message text
        text: String,
    },

    /// Show link fix statistics
    Stats {
        #[command(subcommand)]
        command: StatsCommands,
    },

    /// Toggle reply notifications for a user
    ///
    /// This edits the stats file directly. Do not use it while `serve` is
    /// running: the bot would overwrite the change on its next flush. Send a
    /// {"type":"notifications","user":{...}} line to the running bot instead.
    Notifications {
        /// The user's numeric id
        user_id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum StatsCommands {
    /// Totals with the top servers and users
    All {
        /// How many servers and users to list
        #[arg(long, default_value_t = 5)]
        top: usize,

        /// Output results in JSON format instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Links fixed for one user
    User {
        /// The user's numeric id
        user_id: String,
    },

    /// Links fixed in one server
    Server {
        /// The server's numeric id
        server_id: String,
    },
}
