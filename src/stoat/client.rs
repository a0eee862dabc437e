//! Outbound side of the Stoat adapter.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::bridge::orchestrator::{truncate_chars, MAX_CONTENT_CHARS};
use crate::bridge::platform::{ChatPlatform, MentionLookup};
use crate::common::error::PlatformResult;
use crate::common::messages::{OutboundMessage, QuotedMessage};
use crate::common::resources::welcome_notice;
use crate::common::types::{MessageKey, Platform};
use crate::stoat::http::StoatHttp;
use crate::stoat::models::{Masquerade, Reply, SendMessage};

/// Stoat rejects masquerade names above 32 characters.
pub const MAX_MASQUERADE_NAME: usize = 32;

pub struct StoatPlatform {
    http: StoatHttp,
}

impl StoatPlatform {
    pub fn new(http: StoatHttp) -> Self {
        Self { http }
    }
}

#[async_trait]
impl MentionLookup for StoatPlatform {
    async fn user_name(&self, _scope: Option<&str>, user_id: &str) -> PlatformResult<Option<String>> {
        Ok(self.http.user(user_id).await?.map(|user| user.name().to_string()))
    }

    async fn emoji_name(&self, emoji_id: &str) -> PlatformResult<Option<String>> {
        Ok(self.http.emoji(emoji_id).await?.map(|emoji| emoji.name))
    }
}

#[async_trait]
impl ChatPlatform for StoatPlatform {
    fn platform(&self) -> Platform {
        Platform::Stoat
    }

    fn accepts_uploads(&self) -> bool {
        false
    }

    fn native_replies(&self) -> bool {
        true
    }

    async fn send_message(&self, message: OutboundMessage) -> PlatformResult<MessageKey> {
        let body = SendMessage {
            content: message.content,
            masquerade: Some(Masquerade {
                name: Some(truncate_chars(&message.masquerade.name, MAX_MASQUERADE_NAME)),
                avatar: message.masquerade.avatar_url,
            }),
            replies: message
                .reply_to
                .into_iter()
                .map(|id| Reply { id, mention: false })
                .collect(),
        };
        let sent = self.http.send_message(&message.channel_id, &body).await?;
        Ok(sent.id)
    }

    async fn delete_message(&self, channel_id: &str, message_id: &str, _mirrored: bool) -> PlatformResult<()> {
        self.http.delete_message(channel_id, message_id).await
    }

    async fn fetch_message(&self, channel_id: &str, message_id: &str) -> PlatformResult<QuotedMessage> {
        let message = self.http.message(channel_id, message_id).await?;

        let masquerade_name = message
            .masquerade
            .as_ref()
            .and_then(|m| m.name.clone())
            .filter(|name| !name.is_empty());
        let author = match masquerade_name {
            Some(name) => name,
            None => match &message.user {
                Some(user) => user.name().to_string(),
                None => match self.http.user(&message.author).await {
                    Ok(Some(user)) => user.name().to_string(),
                    Ok(None) => "unknown".to_string(),
                    Err(e) => {
                        debug!("Stoat: could not resolve author {}: {}", message.author, e);
                        "unknown".to_string()
                    }
                },
            },
        };

        Ok(QuotedMessage {
            author,
            content: message.content.unwrap_or_default(),
        })
    }

    async fn send_notice(&self, user_id: &str) -> PlatformResult<()> {
        let dm = self.http.open_dm(user_id).await?;
        let body = SendMessage {
            content: truncate_chars(&welcome_notice(Platform::Stoat), MAX_CONTENT_CHARS),
            ..Default::default()
        };
        self.http.send_message(&dm.id, &body).await?;
        info!("Stoat: sent welcome notice to user {}", user_id);
        Ok(())
    }
}
