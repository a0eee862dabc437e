//! Configuration type definitions.

use std::path::PathBuf;

/// Default Stoat API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.revolt.chat";

/// Discord rejects uploads above 25 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 25 * 1024 * 1024;

/// Number of message pairs kept for reply and delete linking.
pub const DEFAULT_MSG_CACHE_SIZE: usize = 500;

pub const DEFAULT_MAX_CONCURRENT_UPLOADS: usize = 4;

pub const DEFAULT_NOTIFIED_USERS_FILE: &str = "notified_users.json";

/// Root configuration structure.
#[derive(Debug, Clone)]
pub struct Config {
    pub discord: DiscordConfig,
    pub stoat: StoatConfig,
    pub bridge: BridgeConfig,
}

/// Discord bot configuration.
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub token: String,
    /// Bridged channels, in pairing order.
    pub channel_ids: Vec<String>,
}

/// Stoat bot configuration.
#[derive(Debug, Clone)]
pub struct StoatConfig {
    pub token: String,
    /// Bridged channels, in pairing order.
    pub channel_ids: Vec<String>,
    /// API base URL without a trailing slash.
    pub api_url: String,
}

/// Relay limits and persisted state location.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub max_file_size: u64,
    pub msg_cache_size: usize,
    pub max_concurrent_uploads: usize,
    pub notified_users_file: PathBuf,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            msg_cache_size: DEFAULT_MSG_CACHE_SIZE,
            max_concurrent_uploads: DEFAULT_MAX_CONCURRENT_UPLOADS,
            notified_users_file: PathBuf::from(DEFAULT_NOTIFIED_USERS_FILE),
        }
    }
}
