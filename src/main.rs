//! Backchannel CLI entry point.
//!
//! Provides `start`, `migrate`, and `clean` subcommands for running the
//! relay bot and managing its database.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use teloxide::adaptors::throttle::Limits;
use teloxide::requests::RequesterExt;
use teloxide::Bot;
use tracing::info;

use backchannel::config::{self, Config, RuntimePaths};
use backchannel::relay::Relay;
use backchannel::store::{Repos, SqliteStore};
use backchannel::transport::TelegramTransport;

/// Backchannel: relays private chats with a bot into a staff forum group.
#[derive(Parser)]
#[command(name = "backchannel", version, about)]
struct Cli {
    /// Config file (default: `~/.backchannel/config.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Run the relay bot until Ctrl+C.
    Start,
    /// Create the database schema.
    Migrate,
    /// Delete every row from every table.
    Clean,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (config, paths) = load(cli.config.as_deref())?;

    match cli.command {
        Command::Start => handle_start(config, paths).await,
        Command::Migrate => handle_migrate(paths).await,
        Command::Clean => handle_clean(paths).await,
    }
}

/// Load and validate the config, resolving runtime paths around it.
fn load(explicit: Option<&std::path::Path>) -> anyhow::Result<(Config, RuntimePaths)> {
    let paths = match explicit {
        Some(path) => RuntimePaths::for_config_file(path),
        None => config::runtime_paths()?,
    };
    let config = config::load_config(&paths.config_toml)
        .with_context(|| format!("failed to load {}", paths.config_toml.display()))?;
    let paths = paths.with_storage(&config.storage);
    Ok((config, paths))
}

/// Run the relay bot.
async fn handle_start(config: Config, paths: RuntimePaths) -> anyhow::Result<()> {
    let _logging_guard = backchannel::logging::init_production(&paths.logs_dir)?;

    let token = config::bot_token(&config.telegram, &paths.env_file)?;
    let store = SqliteStore::open(&paths.database).await?;
    let bot = Bot::new(token).throttle(Limits::default());

    let relay = Relay::new(
        Arc::new(TelegramTransport::new(bot.clone())),
        Repos::sqlite(store),
        config.relay_settings(&paths),
    );

    info!(
        database = %paths.database.display(),
        staff_chat_id = config.telegram.staff_chat_id,
        "backchannel starting"
    );

    backchannel::telegram::run_bot(bot, relay).await?;

    info!("backchannel stopped");
    Ok(())
}

/// Create the database schema.
async fn handle_migrate(paths: RuntimePaths) -> anyhow::Result<()> {
    backchannel::logging::init_cli()?;
    SqliteStore::open(&paths.database).await?;
    info!(database = %paths.database.display(), "schema is up to date");
    Ok(())
}

/// Delete every row from every table.
async fn handle_clean(paths: RuntimePaths) -> anyhow::Result<()> {
    backchannel::logging::init_cli()?;
    let store = SqliteStore::open(&paths.database).await?;
    store.clean().await?;
    info!(database = %paths.database.display(), "database cleaned");
    Ok(())
}
