//! Markup resolution for text crossing the bridge.
//!
//! Discord and Stoat both encode mentions and custom emoji as ids inside the
//! message text. Forwarded verbatim those ids are meaningless on the other
//! side, so every token is replaced with a readable name:
//!
//! - Discord: `<@id>` / `<@!id>` users, `<#id>` channels, `<@&id>` roles,
//!   `<:name:id>` / `<a:name:id>` custom emoji.
//! - Stoat: `<@ULID>` users and `:ULID:` custom emoji.
//!
//! Lookups run concurrently and never fail the sanitizer: an unresolved token
//! degrades to a generic placeholder.

use std::collections::HashMap;

use fancy_regex::Regex;
use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::debug;

use crate::bridge::platform::MentionLookup;
use crate::common::types::Platform;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    DiscordUser(String),
    DiscordChannel(String),
    DiscordRole(String),
    /// Custom emoji; the name is already in the markup.
    DiscordEmoji(String),
    StoatUser(String),
    StoatEmoji(String),
}

#[derive(Debug)]
struct Span {
    start: usize,
    end: usize,
    token: Token,
}

/// Rewrites platform markup into plain text.
#[derive(Debug)]
pub struct ContentSanitizer {
    discord_user: Regex,
    discord_channel: Regex,
    discord_role: Regex,
    discord_emoji: Regex,
    stoat_user: Regex,
    stoat_emoji: Regex,
    /// Stoat emoji id -> name, kept for the process lifetime.
    emoji_names: Mutex<HashMap<String, String>>,
}

impl ContentSanitizer {
    pub fn new() -> Result<Self, fancy_regex::Error> {
        Ok(Self {
            discord_user: Regex::new(r"<@!?(\d+)>")?,
            discord_channel: Regex::new(r"<#(\d+)>")?,
            discord_role: Regex::new(r"<@&(\d+)>")?,
            discord_emoji: Regex::new(r"<a?:([A-Za-z0-9_]+):\d+>")?,
            stoat_user: Regex::new(r"<@([A-Z0-9]{26})>")?,
            stoat_emoji: Regex::new(r":([A-Z0-9]{26}):")?,
            emoji_names: Mutex::new(HashMap::new()),
        })
    }

    /// Resolve all markup of `platform` in `text`.
    pub async fn sanitize<L>(
        &self,
        platform: Platform,
        text: &str,
        scope: Option<&str>,
        lookup: &L,
    ) -> String
    where
        L: MentionLookup + ?Sized,
    {
        let spans = self.scan(platform, text);
        if spans.is_empty() {
            return text.to_string();
        }

        let names = join_all(spans.iter().map(|span| self.resolve(&span.token, scope, lookup))).await;

        let mut result = text.to_string();
        for (span, name) in spans.iter().zip(names).rev() {
            result.replace_range(span.start..span.end, &name);
        }
        result
    }

    /// Non-overlapping token matches in document order.
    fn scan(&self, platform: Platform, text: &str) -> Vec<Span> {
        let mut spans = Vec::new();
        match platform {
            Platform::Discord => {
                collect(&self.discord_user, text, Token::DiscordUser, &mut spans);
                collect(&self.discord_channel, text, Token::DiscordChannel, &mut spans);
                collect(&self.discord_role, text, Token::DiscordRole, &mut spans);
                collect(&self.discord_emoji, text, Token::DiscordEmoji, &mut spans);
            }
            Platform::Stoat => {
                collect(&self.stoat_user, text, Token::StoatUser, &mut spans);
                collect(&self.stoat_emoji, text, Token::StoatEmoji, &mut spans);
            }
        }

        spans.sort_by_key(|span| (span.start, std::cmp::Reverse(span.end)));
        let mut kept: Vec<Span> = Vec::with_capacity(spans.len());
        for span in spans {
            if kept.last().map_or(true, |last| span.start >= last.end) {
                kept.push(span);
            }
        }
        kept
    }

    async fn resolve<L>(&self, token: &Token, scope: Option<&str>, lookup: &L) -> String
    where
        L: MentionLookup + ?Sized,
    {
        match token {
            Token::DiscordUser(id) => match lookup.user_name(scope, id).await {
                Ok(Some(name)) => format!("@{}", name),
                Ok(None) => format!("@user{}", id),
                Err(e) => {
                    debug!(user_id = %id, error = %e, "Could not resolve Discord user");
                    format!("@user{}", id)
                }
            },
            Token::DiscordChannel(id) => match lookup.channel_name(scope, id).await {
                Ok(Some(name)) => format!("#{}", name),
                Ok(None) => "#channel".to_string(),
                Err(e) => {
                    debug!(channel_id = %id, error = %e, "Could not resolve Discord channel");
                    "#channel".to_string()
                }
            },
            Token::DiscordRole(id) => match lookup.role_name(scope, id).await {
                Ok(Some(name)) => format!("@{}", name),
                Ok(None) => "@role".to_string(),
                Err(e) => {
                    debug!(role_id = %id, error = %e, "Could not resolve Discord role");
                    "@role".to_string()
                }
            },
            Token::DiscordEmoji(name) => format!(":{}:", name),
            Token::StoatUser(id) => match lookup.user_name(scope, id).await {
                Ok(Some(name)) => format!("@{}", name),
                Ok(None) => "@user".to_string(),
                Err(e) => {
                    debug!(user_id = %id, error = %e, "Could not resolve Stoat user");
                    "@user".to_string()
                }
            },
            Token::StoatEmoji(id) => format!(":{}:", self.stoat_emoji_name(id, lookup).await),
        }
    }

    async fn stoat_emoji_name<L>(&self, id: &str, lookup: &L) -> String
    where
        L: MentionLookup + ?Sized,
    {
        if let Some(name) = self.emoji_names.lock().await.get(id) {
            return name.clone();
        }

        match lookup.emoji_name(id).await {
            Ok(Some(name)) => {
                self.emoji_names
                    .lock()
                    .await
                    .insert(id.to_string(), name.clone());
                name
            }
            Ok(None) => id.to_string(),
            Err(e) => {
                debug!(emoji_id = %id, error = %e, "Could not resolve Stoat emoji");
                id.to_string()
            }
        }
    }
}

fn collect(pattern: &Regex, text: &str, make: fn(String) -> Token, spans: &mut Vec<Span>) {
    for caps in pattern.captures_iter(text).flatten() {
        if let (Some(whole), Some(group)) = (caps.get(0), caps.get(1)) {
            spans.push(Span {
                start: whole.start(),
                end: whole.end(),
                token: make(group.as_str().to_string()),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::common::error::{PlatformError, PlatformResult};

    #[derive(Default)]
    struct FakeLookup {
        users: HashMap<String, String>,
        channels: HashMap<String, String>,
        roles: HashMap<String, String>,
        emoji: HashMap<String, String>,
        emoji_calls: AtomicUsize,
        failing: bool,
    }

    #[async_trait]
    impl MentionLookup for FakeLookup {
        async fn user_name(&self, _scope: Option<&str>, user_id: &str) -> PlatformResult<Option<String>> {
            if self.failing {
                return Err(PlatformError::NotReady {
                    message: "offline".to_string(),
                });
            }
            Ok(self.users.get(user_id).cloned())
        }

        async fn channel_name(&self, _scope: Option<&str>, channel_id: &str) -> PlatformResult<Option<String>> {
            Ok(self.channels.get(channel_id).cloned())
        }

        async fn role_name(&self, _scope: Option<&str>, role_id: &str) -> PlatformResult<Option<String>> {
            Ok(self.roles.get(role_id).cloned())
        }

        async fn emoji_name(&self, emoji_id: &str) -> PlatformResult<Option<String>> {
            self.emoji_calls.fetch_add(1, Ordering::SeqCst);
            if self.failing {
                return Err(PlatformError::NotReady {
                    message: "offline".to_string(),
                });
            }
            Ok(self.emoji.get(emoji_id).cloned())
        }
    }

    const ULID_USER: &str = "01HZX4Q3M5T7V9W1Y3Z5A7C9E1";
    const ULID_EMOJI: &str = "01HZX4Q3M5T7V9W1Y3Z5A7C9E2";

    #[tokio::test]
    async fn test_discord_mentions_resolved() {
        let sanitizer = ContentSanitizer::new().unwrap();
        let mut lookup = FakeLookup::default();
        lookup.users.insert("123".to_string(), "Alex".to_string());
        lookup.channels.insert("456".to_string(), "general".to_string());

        let result = sanitizer
            .sanitize(Platform::Discord, "<@123> said <#456> is fun :joy:", Some("1"), &lookup)
            .await;
        assert_eq!(result, "@Alex said #general is fun :joy:");
    }

    #[tokio::test]
    async fn test_discord_fallbacks() {
        let sanitizer = ContentSanitizer::new().unwrap();
        let lookup = FakeLookup::default();

        let result = sanitizer
            .sanitize(Platform::Discord, "<@!42> <#7> <@&9>", None, &lookup)
            .await;
        assert_eq!(result, "@user42 #channel @role");
    }

    #[tokio::test]
    async fn test_discord_roles_and_emoji() {
        let sanitizer = ContentSanitizer::new().unwrap();
        let mut lookup = FakeLookup::default();
        lookup.roles.insert("9".to_string(), "mods".to_string());

        let result = sanitizer
            .sanitize(Platform::Discord, "ping <@&9> <:pepe:111> <a:party_blob:222>", None, &lookup)
            .await;
        assert_eq!(result, "ping @mods :pepe: :party_blob:");
    }

    #[tokio::test]
    async fn test_stoat_markup_resolved_and_cached() {
        let sanitizer = ContentSanitizer::new().unwrap();
        let mut lookup = FakeLookup::default();
        lookup.users.insert(ULID_USER.to_string(), "Robin".to_string());
        lookup.emoji.insert(ULID_EMOJI.to_string(), "stoat".to_string());

        let text = format!("hi <@{}> :{}: :{}:", ULID_USER, ULID_EMOJI, ULID_EMOJI);
        let result = sanitizer.sanitize(Platform::Stoat, &text, None, &lookup).await;
        assert_eq!(result, "hi @Robin :stoat: :stoat:");

        let again = format!(":{}:", ULID_EMOJI);
        let result = sanitizer.sanitize(Platform::Stoat, &again, None, &lookup).await;
        assert_eq!(result, ":stoat:");
        assert!(lookup.emoji_calls.load(Ordering::SeqCst) <= 2);
        assert!(sanitizer.emoji_names.lock().await.contains_key(ULID_EMOJI));
    }

    #[tokio::test]
    async fn test_stoat_lookup_failure_degrades() {
        let sanitizer = ContentSanitizer::new().unwrap();
        let lookup = FakeLookup {
            failing: true,
            ..Default::default()
        };

        let text = format!("<@{}> :{}:", ULID_USER, ULID_EMOJI);
        let result = sanitizer.sanitize(Platform::Stoat, &text, None, &lookup).await;
        assert_eq!(result, format!("@user :{}:", ULID_EMOJI));
        assert!(sanitizer.emoji_names.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_other_platform_markup_untouched() {
        let sanitizer = ContentSanitizer::new().unwrap();
        let lookup = FakeLookup::default();

        let result = sanitizer.sanitize(Platform::Stoat, "<@123> :joy:", None, &lookup).await;
        assert_eq!(result, "<@123> :joy:");
    }

    #[tokio::test]
    async fn test_plain_text_passthrough() {
        let sanitizer = ContentSanitizer::new().unwrap();
        let lookup = FakeLookup::default();

        let result = sanitizer.sanitize(Platform::Discord, "just text ✓", None, &lookup).await;
        assert_eq!(result, "just text ✓");
    }
}
