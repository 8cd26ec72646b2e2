//! Configuration loading and runtime path resolution.
//!
//! Everything lives under one root directory (`~/.backchannel/` unless the
//! config file is given explicitly, in which case its directory is the root):
//! - `config.toml` with the `[telegram]` and `[storage]` tables
//! - `.env` holding the bot token (optional; the environment wins)
//! - the SQLite database, `logs/` and `tmp/`

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::relay::RelaySettings;

/// Top-level configuration.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Telegram bot settings.
    pub telegram: TelegramConfig,

    /// Database location.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Telegram-specific configuration.
#[derive(Debug, Deserialize)]
pub struct TelegramConfig {
    /// Environment variable name holding the bot token.
    #[serde(default = "default_token_env")]
    pub bot_token_env: String,

    /// The forum group staff work in. Always negative.
    pub staff_chat_id: i64,
}

/// Storage configuration.
#[derive(Debug, Default, Deserialize)]
pub struct StorageConfig {
    /// Database file, relative to the runtime root unless absolute.
    #[serde(default)]
    pub database: Option<PathBuf>,
}

fn default_token_env() -> String {
    "BACKCHANNEL_TELEGRAM_TOKEN".to_owned()
}

const DEFAULT_DATABASE: &str = "backchannel.db";

impl Config {
    /// Reject values the bot cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending key.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.telegram.staff_chat_id >= 0 {
            anyhow::bail!(
                "telegram.staff_chat_id must be a group id (negative), got {}",
                self.telegram.staff_chat_id
            );
        }
        if self.telegram.bot_token_env.trim().is_empty() {
            anyhow::bail!("telegram.bot_token_env must not be empty");
        }
        Ok(())
    }

    /// Settings injected into the relay engines.
    pub fn relay_settings(&self, paths: &RuntimePaths) -> RelaySettings {
        RelaySettings {
            staff_chat_id: self.telegram.staff_chat_id,
            tmp_dir: paths.tmp_dir.clone(),
        }
    }
}

/// Resolved filesystem locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    /// Runtime root directory.
    pub root: PathBuf,
    /// `config.toml`.
    pub config_toml: PathBuf,
    /// `.env` with secrets.
    pub env_file: PathBuf,
    /// SQLite database file.
    pub database: PathBuf,
    /// Log directory.
    pub logs_dir: PathBuf,
    /// Scratch directory for attachments in transit.
    pub tmp_dir: PathBuf,
}

impl RuntimePaths {
    /// Lay out the runtime files under `root`.
    pub fn under(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            config_toml: root.join("config.toml"),
            env_file: root.join(".env"),
            database: root.join(DEFAULT_DATABASE),
            logs_dir: root.join("logs"),
            tmp_dir: root.join("tmp"),
        }
    }

    /// Paths for an explicit config file: its directory becomes the root.
    pub fn for_config_file(config_toml: &Path) -> Self {
        let root = config_toml
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Self {
            config_toml: config_toml.to_path_buf(),
            ..Self::under(root)
        }
    }

    /// Apply the `[storage]` override to the database path.
    pub fn with_storage(mut self, storage: &StorageConfig) -> Self {
        if let Some(database) = &storage.database {
            self.database = self.root.join(database);
        }
        self
    }
}

/// Load the config from a TOML file and validate it.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed, or validated.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config at {}: {e}", path.display()))?;
    let config: Config = toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("failed to parse config at {}: {e}", path.display()))?;
    config.validate()?;
    Ok(config)
}

/// Resolve the default config directory (`~/.backchannel/`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_dir() -> anyhow::Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.home_dir().join(".backchannel"))
}

/// Resolve the runtime paths under [`config_dir`].
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn runtime_paths() -> anyhow::Result<RuntimePaths> {
    Ok(RuntimePaths::under(&config_dir()?))
}

/// Read the bot token from the environment, loading `env_file` first when
/// it exists. Variables already set in the environment are not overridden.
///
/// # Errors
///
/// Returns an error if the `.env` file is malformed or the variable is
/// unset or empty.
pub fn bot_token(telegram: &TelegramConfig, env_file: &Path) -> anyhow::Result<String> {
    if env_file.exists() {
        dotenvy::from_path(env_file)
            .with_context(|| format!("failed to load {}", env_file.display()))?;
    }
    let token = std::env::var(&telegram.bot_token_env)
        .with_context(|| format!("{} is not set", telegram.bot_token_env))?;
    if token.trim().is_empty() {
        anyhow::bail!("{} is empty", telegram.bot_token_env);
    }
    Ok(token)
}
