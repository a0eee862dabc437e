//! Discord gateway event handling.
//!
//! Converts serenity events into bridge events and sets up webhooks once
//! the session is ready.

use std::sync::Arc;

use serenity::all::{ChannelId, Context, Message, MessageId, Ready};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::common::messages::{
    Author, DeleteEvent, InboundAttachment, InboundEvent, InboundMessage, QuotedMessage, ReplyRef,
};
use crate::common::types::Platform;
use crate::discord::api::DiscordPlatform;

/// Discord event handler.
pub struct BridgeHandler {
    platform: Arc<DiscordPlatform>,
    /// Bridged Discord channels, provisioned with webhooks on ready.
    channels: Vec<String>,
    events_tx: mpsc::UnboundedSender<InboundEvent>,
}

impl BridgeHandler {
    pub fn new(
        platform: Arc<DiscordPlatform>,
        channels: Vec<String>,
        events_tx: mpsc::UnboundedSender<InboundEvent>,
    ) -> Self {
        Self {
            platform,
            channels,
            events_tx,
        }
    }

    pub async fn handle_ready(&self, context: Context, ready: Ready) {
        info!("Discord: connected as {}", ready.user.name);
        info!("Discord: bridging {} channel pair(s)", self.channels.len());

        self.platform
            .attach_session(context.cache.clone(), ready.user.id)
            .await;
        self.platform
            .provision_webhooks(self.channels.iter().map(String::as_str))
            .await;
    }

    pub async fn handle_message(&self, message: Message) {
        let from_bridge = self.is_bridge_author(&message).await;
        self.emit(InboundEvent::Message(to_inbound(&message, from_bridge)));
    }

    pub fn handle_delete(&self, channel_id: ChannelId, message_ids: Vec<MessageId>) {
        for message_id in message_ids {
            self.emit(InboundEvent::Delete(DeleteEvent {
                platform: Platform::Discord,
                channel_id: channel_id.to_string(),
                message_id: message_id.to_string(),
            }));
        }
    }

    /// Own account, or one of the bridge webhooks.
    async fn is_bridge_author(&self, message: &Message) -> bool {
        if self.platform.bot_user().await == Some(message.author.id) {
            return true;
        }
        match message.webhook_id {
            Some(webhook_id) => self.platform.webhook_ids().await.contains(&webhook_id),
            None => false,
        }
    }

    fn emit(&self, event: InboundEvent) {
        if let Err(e) = self.events_tx.send(event) {
            warn!("Failed to queue Discord event: {}", e);
        }
    }
}

/// Normalize a Discord message.
pub fn to_inbound(message: &Message, from_bridge: bool) -> InboundMessage {
    let nick = message.member.as_ref().and_then(|m| m.nick.as_deref());
    let display_name = display_name(
        nick,
        message.author.global_name.as_deref(),
        &message.author.name,
    );

    let reply_to = message
        .message_reference
        .as_ref()
        .and_then(|reference| reference.message_id)
        .map(|message_id| ReplyRef {
            message_id: message_id.to_string(),
            resolved: message
                .referenced_message
                .as_ref()
                .map(|referenced| QuotedMessage {
                    author: referenced.author.display_name().to_string(),
                    content: referenced.content.clone(),
                }),
        });

    InboundMessage {
        platform: Platform::Discord,
        channel_id: message.channel_id.to_string(),
        message_id: message.id.to_string(),
        author: Author {
            id: message.author.id.to_string(),
            display_name,
            avatar_url: Some(message.author.face()),
        },
        content: message.content.clone(),
        reply_to,
        attachments: message
            .attachments
            .iter()
            .map(|attachment| InboundAttachment {
                url: attachment.url.clone(),
                filename: Some(attachment.filename.clone()),
            })
            .collect(),
        from_bridge,
        scope: message.guild_id.map(|id| id.to_string()),
    }
}

/// Server nickname, then global display name, then username.
pub fn display_name(nick: Option<&str>, global_name: Option<&str>, username: &str) -> String {
    nick.or(global_name)
        .filter(|name| !name.trim().is_empty())
        .unwrap_or(username)
        .to_string()
}
