// Centralized configuration for the bot
// Values come from the environment (a .env file is loaded first by main)

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use poise::serenity_prelude as serenity;
use thiserror::Error;
use tracing::warn;

/// Persisted guild configs (guild id -> GuildConfig)
pub const DISCORD_CONFIG_FILE: &str = "discord_config.json";
/// Suggestion queues (guild id -> {pending, approved, denied})
pub const SUGGESTIONS_FILE: &str = "suggestions.json";
pub const TIPS_FILE: &str = "tips.json";
pub const TESTS_FILE: &str = "tests.json";

/// How often the guild configs are compared against disk and rewritten if changed
pub const AUTOSAVE_INTERVAL: Duration = Duration::from_secs(1800);

/// Lifetime of the "added the role" / "removed the role" notices
pub const CONFIRMATION_TTL: Duration = Duration::from_secs(10);

pub const DEFAULT_COMMAND_SYMBOL: &str = "t!";

/// Discord embed colors
pub mod colors {
    pub const SUCCESS: u32 = 0x2ecc71;
    pub const ERROR: u32 = 0xff0000;
    pub const INFO: u32 = 0x3498db;
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Runtime settings resolved once at startup
#[derive(Debug, Clone)]
pub struct Settings {
    pub discord_token: String,
    /// Directory holding the JSON documents
    pub filecache_path: PathBuf,
    /// Prepended to every document file name
    pub filecache_prefix: String,
    /// Literal prefixes that address the bot, e.g. "t!"
    pub command_symbols: Vec<String>,
    pub owner_id: Option<serenity::UserId>,
    /// Slash commands are registered here instead of globally when set
    pub owner_guild_id: Option<serenity::GuildId>,
    /// Accepted for compatibility with existing deployments; nothing connects to them
    pub database_urls: Vec<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolve settings through an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let discord_token = lookup("DISCORD_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .ok_or(SettingsError::Missing("DISCORD_TOKEN"))?;

        let filecache_path = lookup("FILECACHE_PATH")
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_filecache_path);

        let filecache_prefix = lookup("FILECACHE_PREFIX").unwrap_or_default();

        let mut command_symbols = split_list(lookup("COMMAND_SYMBOLS").as_deref());
        if command_symbols.is_empty() {
            command_symbols.push(DEFAULT_COMMAND_SYMBOL.to_string());
        }

        let owner_id = parse_snowflake("OWNER_ID", lookup("OWNER_ID").as_deref())
            .map(serenity::UserId::new);
        let owner_guild_id = parse_snowflake("OWNER_GUILD_ID", lookup("OWNER_GUILD_ID").as_deref())
            .map(serenity::GuildId::new);

        let database_urls = split_list(lookup("DATABASE_URLS").as_deref());
        if !database_urls.is_empty() {
            warn!(
                "{} database connection(s) configured but no feature uses them",
                database_urls.len()
            );
        }

        Ok(Self {
            discord_token,
            filecache_path,
            filecache_prefix,
            command_symbols,
            owner_id,
            owner_guild_id,
            database_urls,
        })
    }
}

fn default_filecache_path() -> PathBuf {
    env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("json")
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

/// Discord IDs are non-zero u64; anything else is skipped with a warning
fn parse_snowflake(key: &str, raw: Option<&str>) -> Option<u64> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<u64>() {
        Ok(id) if id != 0 => Some(id),
        _ => {
            warn!("Ignoring invalid {}: {:?}", key, raw);
            None
        }
    }
}
