//! Discord side of the bridge.
//!
//! Mirrored messages are posted through one webhook per bridged channel so
//! they carry the original author's name and avatar. The webhook is reused
//! when the bot already owns one, otherwise created on first connect.

use std::collections::HashMap;
use std::sync::Arc;

use serenity::all::{
    Cache, ChannelId, CreateAttachment, CreateEmbed, CreateEmbedFooter, CreateMessage,
    CreateWebhook, ExecuteWebhook, GuildId, Http, MessageId, RoleId, UserId, Webhook, WebhookId,
};
use serenity::async_trait;
use serenity::http::HttpError;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::bridge::orchestrator::truncate_chars;
use crate::bridge::platform::{ChatPlatform, MentionLookup};
use crate::common::error::{PlatformError, PlatformResult};
use crate::common::messages::{OutboundMessage, QuotedMessage};
use crate::common::resources::{welcome_notice, NOTICE_COLOUR, NOTICE_FOOTER, NOTICE_TITLE};
use crate::common::types::{MessageKey, Platform};

/// Name given to webhooks created by the bridge.
pub const WEBHOOK_NAME: &str = "Stoat Bridge";

/// Discord caps webhook usernames at 80 characters.
const MAX_USERNAME_CHARS: usize = 80;

/// Session state learned from the gateway.
#[derive(Default)]
struct Session {
    cache: Option<Arc<Cache>>,
    bot_user: Option<UserId>,
}

pub struct DiscordPlatform {
    http: Arc<Http>,
    session: RwLock<Session>,
    webhooks: RwLock<HashMap<ChannelId, Webhook>>,
}

impl DiscordPlatform {
    pub fn new(http: Arc<Http>) -> Self {
        Self {
            http,
            session: RwLock::new(Session::default()),
            webhooks: RwLock::new(HashMap::new()),
        }
    }

    /// Remember the gateway cache and bot account after `Ready`.
    pub async fn attach_session(&self, cache: Arc<Cache>, bot_user: UserId) {
        let mut session = self.session.write().await;
        session.cache = Some(cache);
        session.bot_user = Some(bot_user);
    }

    pub async fn bot_user(&self) -> Option<UserId> {
        self.session.read().await.bot_user
    }

    /// Ids of the webhooks the bridge posts through.
    pub async fn webhook_ids(&self) -> Vec<WebhookId> {
        self.webhooks.read().await.values().map(|w| w.id).collect()
    }

    /// Find or create the bridge webhook for each channel.
    pub async fn provision_webhooks<'a>(&self, channel_ids: impl IntoIterator<Item = &'a str>) {
        let Some(bot_user) = self.bot_user().await else {
            warn!("Cannot provision webhooks before the Discord session is ready");
            return;
        };

        for raw in channel_ids {
            let channel_id = match parse_snowflake(raw) {
                Ok(id) => ChannelId::new(id),
                Err(e) => {
                    error!("Discord: skipping channel '{}': {}", raw, e);
                    continue;
                }
            };

            match self.find_or_create_webhook(channel_id, bot_user).await {
                Ok(webhook) => {
                    self.webhooks.write().await.insert(channel_id, webhook);
                }
                Err(e) => error!("Discord: could not set up webhook for channel {}: {}", channel_id, e),
            }
        }
    }

    async fn find_or_create_webhook(&self, channel_id: ChannelId, bot_user: UserId) -> serenity::Result<Webhook> {
        let existing = channel_id.webhooks(&self.http).await?;
        if let Some(webhook) = existing
            .into_iter()
            .find(|w| w.user.as_ref().map(|u| u.id) == Some(bot_user))
        {
            info!(
                "Discord: reusing webhook '{}' for channel {}",
                webhook.name.as_deref().unwrap_or(WEBHOOK_NAME),
                channel_id
            );
            return Ok(webhook);
        }

        let webhook = channel_id
            .create_webhook(&self.http, CreateWebhook::new(WEBHOOK_NAME))
            .await?;
        info!("Discord: created webhook for channel {}", channel_id);
        Ok(webhook)
    }

    async fn webhook_for(&self, channel_id: ChannelId) -> Option<Webhook> {
        self.webhooks.read().await.get(&channel_id).cloned()
    }

    async fn cache(&self) -> Option<Arc<Cache>> {
        self.session.read().await.cache.clone()
    }
}

#[async_trait]
impl MentionLookup for DiscordPlatform {
    async fn user_name(&self, scope: Option<&str>, user_id: &str) -> PlatformResult<Option<String>> {
        let user_id = UserId::new(parse_snowflake(user_id)?);
        let guild_id = scope.map(parse_snowflake).transpose()?.map(GuildId::new);

        let Some(guild_id) = guild_id else {
            return lookup(self.http.get_user(user_id).await)
                .map(|user| user.map(|u| u.display_name().to_string()));
        };

        if let Some(cache) = self.cache().await {
            let cached = cache.guild(guild_id).and_then(|guild| {
                guild
                    .members
                    .get(&user_id)
                    .map(|m| m.display_name().to_string())
            });
            if cached.is_some() {
                return Ok(cached);
            }
        }

        lookup(self.http.get_member(guild_id, user_id).await)
            .map(|member| member.map(|m| m.display_name().to_string()))
    }

    async fn channel_name(&self, scope: Option<&str>, channel_id: &str) -> PlatformResult<Option<String>> {
        let channel_id = ChannelId::new(parse_snowflake(channel_id)?);

        if let (Some(cache), Some(scope)) = (self.cache().await, scope) {
            let guild_id = GuildId::new(parse_snowflake(scope)?);
            let cached = cache
                .guild(guild_id)
                .and_then(|guild| guild.channels.get(&channel_id).map(|c| c.name.clone()));
            if cached.is_some() {
                return Ok(cached);
            }
        }

        lookup(self.http.get_channel(channel_id).await)
            .map(|channel| channel.and_then(|c| c.guild()).map(|c| c.name))
    }

    async fn role_name(&self, scope: Option<&str>, role_id: &str) -> PlatformResult<Option<String>> {
        let Some(scope) = scope else {
            return Ok(None);
        };
        let guild_id = GuildId::new(parse_snowflake(scope)?);
        let role_id = RoleId::new(parse_snowflake(role_id)?);

        if let Some(cache) = self.cache().await {
            let cached = cache
                .guild(guild_id)
                .and_then(|guild| guild.roles.get(&role_id).map(|r| r.name.clone()));
            if cached.is_some() {
                return Ok(cached);
            }
        }

        let roles = self.http.get_guild_roles(guild_id).await.map_err(map_error)?;
        Ok(roles.into_iter().find(|r| r.id == role_id).map(|r| r.name))
    }
}

#[async_trait]
impl ChatPlatform for DiscordPlatform {
    fn platform(&self) -> Platform {
        Platform::Discord
    }

    fn accepts_uploads(&self) -> bool {
        true
    }

    /// Webhook messages cannot reference another message.
    fn native_replies(&self) -> bool {
        false
    }

    async fn send_message(&self, message: OutboundMessage) -> PlatformResult<MessageKey> {
        let channel_id = ChannelId::new(parse_snowflake(&message.channel_id)?);
        let webhook = self
            .webhook_for(channel_id)
            .await
            .ok_or_else(|| PlatformError::NotReady {
                message: format!("webhook for channel {} not ready", channel_id),
            })?;

        let mut builder =
            ExecuteWebhook::new().username(truncate_chars(&message.masquerade.name, MAX_USERNAME_CHARS));
        if let Some(avatar_url) = &message.masquerade.avatar_url {
            builder = builder.avatar_url(avatar_url);
        }
        if !message.content.trim().is_empty() {
            builder = builder.content(&message.content);
        }
        let files: Vec<CreateAttachment> = message
            .uploads
            .iter()
            .map(|upload| CreateAttachment::bytes(upload.bytes.to_vec(), upload.filename.clone()))
            .collect();
        if !files.is_empty() {
            builder = builder.add_files(files);
        }

        let sent = webhook.execute(&self.http, true, builder).await.map_err(map_error);
        // Relay buffers are released once the upload call has returned.
        drop(message.uploads);

        match sent? {
            Some(sent) => Ok(sent.id.to_string()),
            None => Err(PlatformError::Decode {
                message: "webhook execute returned no message".to_string(),
            }),
        }
    }

    async fn delete_message(&self, channel_id: &str, message_id: &str, mirrored: bool) -> PlatformResult<()> {
        let channel_id = ChannelId::new(parse_snowflake(channel_id)?);
        let message_id = MessageId::new(parse_snowflake(message_id)?);

        if mirrored {
            if let Some(webhook) = self.webhook_for(channel_id).await {
                return webhook
                    .delete_message(&self.http, None, message_id)
                    .await
                    .map_err(map_error);
            }
        }

        channel_id
            .delete_message(&self.http, message_id)
            .await
            .map_err(map_error)
    }

    async fn fetch_message(&self, channel_id: &str, message_id: &str) -> PlatformResult<QuotedMessage> {
        let channel_id = ChannelId::new(parse_snowflake(channel_id)?);
        let message_id = MessageId::new(parse_snowflake(message_id)?);

        let message = channel_id
            .message(&self.http, message_id)
            .await
            .map_err(map_error)?;

        Ok(QuotedMessage {
            author: message.author.display_name().to_string(),
            content: message.content,
        })
    }

    async fn send_notice(&self, user_id: &str) -> PlatformResult<()> {
        let user_id = UserId::new(parse_snowflake(user_id)?);
        let embed = CreateEmbed::new()
            .title(NOTICE_TITLE)
            .description(welcome_notice(Platform::Discord))
            .colour(NOTICE_COLOUR)
            .footer(CreateEmbedFooter::new(NOTICE_FOOTER));

        user_id
            .direct_message(&self.http, CreateMessage::new().embed(embed))
            .await
            .map_err(map_error)?;
        Ok(())
    }
}

/// Parse a Discord snowflake; zero is not a valid id.
pub fn parse_snowflake(raw: &str) -> PlatformResult<u64> {
    match raw.trim().parse::<u64>() {
        Ok(id) if id != 0 => Ok(id),
        _ => Err(PlatformError::InvalidId { id: raw.to_string() }),
    }
}

/// Map a serenity error, turning HTTP 404 into `AlreadyGone`.
fn map_error(error: serenity::Error) -> PlatformError {
    if let serenity::Error::Http(HttpError::UnsuccessfulRequest(response)) = &error {
        if response.status_code.as_u16() == 404 {
            return PlatformError::AlreadyGone;
        }
    }
    PlatformError::Discord(error)
}

/// A lookup result where "not found" is an answer rather than a failure.
fn lookup<T>(result: serenity::Result<T>) -> PlatformResult<Option<T>> {
    match result.map_err(map_error) {
        Ok(value) => Ok(Some(value)),
        Err(PlatformError::AlreadyGone) => Ok(None),
        Err(e) => Err(e),
    }
}
