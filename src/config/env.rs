//! Configuration from environment variables.
//!
//! Supported variables (a `.env` file in the working directory is loaded first):
//! - `DISCORD_BOT_TOKEN` - Discord bot token
//! - `STOAT_BOT_TOKEN` - Stoat bot token
//! - `DISCORD_CHANNEL_IDS` - comma separated Discord channel IDs
//! - `STOAT_CHANNEL_IDS` - comma separated Stoat channel IDs, same order
//! - `REVOLT_API_URL` - Stoat API base URL
//! - `MAX_FILE_SIZE` - attachment size limit in bytes
//! - `MSG_CACHE_SIZE` - number of message pairs kept for replies/deletes
//! - `MAX_CONCURRENT_UPLOADS` - attachments buffered at the same time
//! - `NOTIFIED_USERS_FILE` - path of the welcome notice ledger

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::debug;

use crate::common::error::ConfigError;
use crate::config::types::{BridgeConfig, Config, DiscordConfig, StoatConfig, DEFAULT_API_URL};
use crate::config::validate::collect_errors;

pub const DISCORD_BOT_TOKEN: &str = "DISCORD_BOT_TOKEN";
pub const STOAT_BOT_TOKEN: &str = "STOAT_BOT_TOKEN";
pub const DISCORD_CHANNEL_IDS: &str = "DISCORD_CHANNEL_IDS";
pub const STOAT_CHANNEL_IDS: &str = "STOAT_CHANNEL_IDS";
pub const REVOLT_API_URL: &str = "REVOLT_API_URL";
pub const MAX_FILE_SIZE: &str = "MAX_FILE_SIZE";
pub const MSG_CACHE_SIZE: &str = "MSG_CACHE_SIZE";
pub const MAX_CONCURRENT_UPLOADS: &str = "MAX_CONCURRENT_UPLOADS";
pub const NOTIFIED_USERS_FILE: &str = "NOTIFIED_USERS_FILE";

/// Load `.env` (if present) and build a validated config from the process environment.
pub fn load_from_env() -> Result<Config, ConfigError> {
    match dotenvy::dotenv() {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => debug!("Ignoring unreadable .env file: {}", e),
    }
    config_from_lookup(|key| env::var(key).ok())
}

/// Build and validate a config from an arbitrary key/value source.
///
/// Every parse and validation problem is reported in a single error.
pub fn config_from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut errors = Vec::new();
    let mut bridge = BridgeConfig::default();

    if let Some(value) = parse_number(&lookup, MAX_FILE_SIZE, &mut errors) {
        bridge.max_file_size = value;
    }
    if let Some(value) = parse_number(&lookup, MSG_CACHE_SIZE, &mut errors) {
        bridge.msg_cache_size = value;
    }
    if let Some(value) = parse_number(&lookup, MAX_CONCURRENT_UPLOADS, &mut errors) {
        bridge.max_concurrent_uploads = value;
    }
    if let Some(path) = lookup(NOTIFIED_USERS_FILE).filter(|p| !p.trim().is_empty()) {
        bridge.notified_users_file = PathBuf::from(path.trim());
    }

    let api_url = lookup(REVOLT_API_URL)
        .map(|url| url.trim().trim_end_matches('/').to_string())
        .filter(|url| !url.is_empty())
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());

    let config = Config {
        discord: DiscordConfig {
            token: lookup(DISCORD_BOT_TOKEN).unwrap_or_default().trim().to_string(),
            channel_ids: split_ids(lookup(DISCORD_CHANNEL_IDS).as_deref()),
        },
        stoat: StoatConfig {
            token: lookup(STOAT_BOT_TOKEN).unwrap_or_default().trim().to_string(),
            channel_ids: split_ids(lookup(STOAT_CHANNEL_IDS).as_deref()),
            api_url,
        },
        bridge,
    };

    errors.extend(collect_errors(&config));

    if errors.is_empty() {
        Ok(config)
    } else {
        Err(ConfigError::ValidationError {
            message: errors.join("\n"),
        })
    }
}

/// Split a comma separated id list, dropping blanks.
fn split_ids(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_number<F, T>(lookup: &F, key: &str, errors: &mut Vec<String>) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let raw = lookup(key)?;
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            errors.push(format!("{} must be a non-negative integer (got '{}')", key, raw));
            None
        }
    }
}
