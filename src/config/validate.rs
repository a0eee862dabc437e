//! Configuration validation.
//!
//! Validates configuration values and provides helpful error messages.

use std::collections::HashSet;

use crate::config::types::Config;

const TOKEN_PLACEHOLDERS: [&str; 3] = ["YOUR_DISCORD_TOKEN_HERE", "YOUR_STOAT_TOKEN_HERE", "changeme"];

/// Collect every validation problem in the config.
pub fn collect_errors(config: &Config) -> Vec<String> {
    let mut errors = Vec::new();

    check_token(&config.discord.token, "DISCORD_BOT_TOKEN", &mut errors);
    check_token(&config.stoat.token, "STOAT_BOT_TOKEN", &mut errors);

    let discord_count = config.discord.channel_ids.len();
    let stoat_count = config.stoat.channel_ids.len();

    if discord_count == 0 {
        errors.push("DISCORD_CHANNEL_IDS is required".to_string());
    }
    if stoat_count == 0 {
        errors.push("STOAT_CHANNEL_IDS is required".to_string());
    }
    if discord_count != stoat_count {
        errors.push(format!(
            "Channel list length mismatch: {} Discord IDs vs {} Stoat IDs",
            discord_count, stoat_count
        ));
    }

    for (i, id) in config.discord.channel_ids.iter().enumerate() {
        if !matches!(id.parse::<u64>(), Ok(n) if n != 0) {
            errors.push(format!(
                "DISCORD_CHANNEL_IDS[{}] '{}' is not a valid Discord channel ID",
                i, id
            ));
        }
    }

    report_duplicates("DISCORD_CHANNEL_IDS", &config.discord.channel_ids, &mut errors);
    report_duplicates("STOAT_CHANNEL_IDS", &config.stoat.channel_ids, &mut errors);

    if !config.stoat.api_url.starts_with("http://") && !config.stoat.api_url.starts_with("https://") {
        errors.push(format!(
            "REVOLT_API_URL '{}' must be an http(s) URL",
            config.stoat.api_url
        ));
    }

    if config.bridge.max_file_size == 0 {
        errors.push("MAX_FILE_SIZE must be non-zero".to_string());
    }
    if config.bridge.msg_cache_size == 0 {
        errors.push("MSG_CACHE_SIZE must be non-zero".to_string());
    }
    if config.bridge.max_concurrent_uploads == 0 {
        errors.push("MAX_CONCURRENT_UPLOADS must be non-zero".to_string());
    }

    errors
}

fn check_token(token: &str, name: &str, errors: &mut Vec<String>) {
    if token.is_empty() {
        errors.push(format!("{} is required", name));
    } else if TOKEN_PLACEHOLDERS.contains(&token) {
        errors.push(format!("{} has not been configured (still using placeholder)", name));
    }
}

fn report_duplicates(name: &str, ids: &[String], errors: &mut Vec<String>) {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id.as_str()) {
            errors.push(format!("{} lists '{}' more than once", name, id));
        }
    }
}
