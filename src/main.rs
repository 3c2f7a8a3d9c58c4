// src/main.rs
// =============================================================================
// This is the entry point of the link-fixer bot.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Set up logging
// 3. Dispatch to the appropriate subcommand handler
// 4. Exit with proper code (0 = success, 1 = rejected input, 2 = error)
// =============================================================================

// Module declarations - tells Rust about our other source files
mod bot;        // src/bot/ - event handlers and the background timer
mod cli;        // src/cli.rs - command-line parsing
mod config;     // src/config.rs - JSON config file
mod error;      // src/error.rs - platform error type
mod handlers;   // src/handlers/ - per-platform link descriptors
mod notify;     // src/notify/ - reply notifications
mod platform;   // src/platform/ - chat platform boundary
mod rewrite;    // src/rewrite/ - link rewriting
mod stats;      // src/stats/ - fix counters and persistence

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use bot::{BotSettings, LinkFixBot};
use cli::{Cli, Commands, StatsCommands};
use config::Config;
use platform::{ConsoleEvent, ConsolePlatform};
use stats::{RankedEntry, StatsStore};

/// Most events handled at once; further stdin lines wait for a free slot
const MAX_IN_FLIGHT: usize = 50;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            // If an unexpected error occurred, print it and exit with code 2
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

// Logs go to stderr so stdout stays free for results and console actions
fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: could not install logger: {}", e);
    }
}

async fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Fix { text } => Ok(handle_fix(&text)),
        Commands::Serve => {
            let config = Config::load_or_init(&cli.config)?;
            handle_serve(config).await
        }
        Commands::Stats { command } => {
            let config = Config::load_or_init(&cli.config)?;
            let store = open_store(&config).await?;
            match command {
                StatsCommands::All { top, json } => handle_stats_all(&store, top, json).await,
                StatsCommands::User { user_id } => handle_stats_user(&store, &user_id).await,
                StatsCommands::Server { server_id } => {
                    handle_stats_server(&store, &server_id).await
                }
            }
        }
        Commands::Notifications { user_id } => {
            let config = Config::load_or_init(&cli.config)?;
            let store = open_store(&config).await?;
            handle_notifications(&store, &user_id).await
        }
    }
}

async fn open_store(config: &Config) -> Result<StatsStore> {
    let store = StatsStore::new(&config.stats_path);
    store.load().await?;
    Ok(store)
}

// Handles the 'serve' subcommand
//
// Every stdin line is one event. Each event is handled on its own task so a
// slow platform call doesn't hold up the next message; the timer task
// flushes stats in the background the whole time.
async fn handle_serve(config: Config) -> Result<i32> {
    let store = Arc::new(StatsStore::new(&config.stats_path));
    store.load().await?;
    store.set_status_count(config.status_count).await;

    let platform = Arc::new(
        ConsolePlatform::new()
            .echo(true)
            .message_limit(config.max_messages),
    );
    let bot = Arc::new(LinkFixBot::new(
        platform.clone(),
        store.clone(),
        BotSettings::from(&config),
    ));
    bot.startup().await;

    let timer = bot::spawn_background(store.clone(), platform.clone(), config.flush_interval());
    info!(stats = %store.path().display(), "link-fixer ready, reading events from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tasks = JoinSet::new();
    let limiter = Arc::new(Semaphore::new(MAX_IN_FLIGHT));

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event: ConsoleEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                warn!("skipping invalid event: {}", e);
                continue;
            }
        };

        match platform.ingest(event).await {
            Ok(event) => {
                let permit = Arc::clone(&limiter).acquire_owned().await?;
                let bot = Arc::clone(&bot);
                tasks.spawn(async move {
                    bot.dispatch(event).await;
                    drop(permit);
                });
            }
            Err(e) => warn!("could not ingest event: {}", e),
        }

        // Reap finished handlers so the set doesn't grow forever
        while let Some(result) = tasks.try_join_next() {
            if let Err(e) = result {
                error!("event handler failed: {}", e);
            }
        }
    }

    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            error!("event handler failed: {}", e);
        }
    }

    timer.abort();
    store.flush().await?;
    info!(total_fixed = store.total_fixed().await, "stats saved");
    Ok(0)
}

// Handles the 'fix' subcommand: dry run, nothing is recorded
fn handle_fix(text: &str) -> i32 {
    let handlers = rewrite::scan(text);
    if handlers.is_empty() {
        println!("No fixable links found");
        return 0;
    }

    let mut results = Vec::new();
    for handler in handlers {
        match rewrite::rewrite(text, handler) {
            Some(result) => {
                println!("   {}: {} link(s) fixed", handler.name(), result.count());
                results.push(result);
            }
            None => println!("   {}: no complete links", handler.name()),
        }
    }

    match rewrite::compose_reply(&results) {
        Some(reply) => {
            println!();
            println!("{}", reply);
        }
        None => println!("No fixable links found"),
    }
    0
}

async fn handle_stats_all(store: &StatsStore, top: usize, json: bool) -> Result<i32> {
    let mut stats = store.global_stats().await;
    stats.top_servers.truncate(top);
    stats.top_users.truncate(top);

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(0);
    }

    println!("📊 Link Stats");
    println!("   Total links fixed: {}", stats.total_fixed);
    print_ranking("Top Servers", &stats.top_servers);
    print_ranking("Top Users", &stats.top_users);
    Ok(0)
}

fn print_ranking(title: &str, entries: &[RankedEntry]) {
    println!();
    println!("{}", title);
    if entries.is_empty() {
        println!("   None");
    }
    for entry in entries {
        println!("   {:>8} : {}", entry.count, entry.id);
    }
}

async fn handle_stats_user(store: &StatsStore, user_id: &str) -> Result<i32> {
    let Some(id) = parse_id(user_id) else {
        println!("User ID must be a number.");
        return Ok(1);
    };

    let total = store.user_total(&id.to_string()).await;
    println!("{} links fixed for User ID {}.", total, id);
    Ok(0)
}

async fn handle_stats_server(store: &StatsStore, server_id: &str) -> Result<i32> {
    let Some(id) = parse_id(server_id) else {
        println!("Server ID must be a number.");
        return Ok(1);
    };

    let total = store.server_total(&id.to_string()).await;
    println!("{} links fixed in Server ID {}.", total, id);
    Ok(0)
}

async fn handle_notifications(store: &StatsStore, user_id: &str) -> Result<i32> {
    let Some(id) = parse_id(user_id) else {
        println!("User ID must be a number.");
        return Ok(1);
    };

    let opted_out = store.toggle_ignored(&id.to_string()).await;
    store.flush().await?;

    println!("{}", notify::opt_out_confirmation(opted_out));
    Ok(0)
}

// Ids come in as text from the command line
fn parse_id(raw: &str) -> Option<u64> {
    raw.trim().parse().ok()
}
