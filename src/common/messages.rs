//! Canonical message types for bridge communication.
//!
//! Each platform adapter converts its native SDK/API types into these
//! structures; the bridge core never inspects platform-native types.

use crate::bridge::attachments::PendingAttachment;
use crate::common::types::{ChannelKey, MessageKey, Platform};

/// Author of an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// A message fetched for a reply quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotedMessage {
    pub author: String,
    pub content: String,
}

/// Reference to the message an inbound message replies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyRef {
    pub message_id: MessageKey,
    /// Set when the platform already delivered the referenced message inline.
    pub resolved: Option<QuotedMessage>,
}

/// An attachment on an inbound message, by source URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundAttachment {
    pub url: String,
    pub filename: Option<String>,
}

/// A message observed on one platform.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub platform: Platform,
    pub channel_id: ChannelKey,
    pub message_id: MessageKey,
    pub author: Author,
    pub content: String,
    pub reply_to: Option<ReplyRef>,
    pub attachments: Vec<InboundAttachment>,
    /// Authored by the bridge itself (own account or own webhook).
    pub from_bridge: bool,
    /// Lookup scope for mentions (the Discord guild id).
    pub scope: Option<String>,
}

/// A message deletion observed on one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteEvent {
    pub platform: Platform,
    pub channel_id: ChannelKey,
    pub message_id: MessageKey,
}

/// Event emitted by a platform adapter into the bridge.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    Message(InboundMessage),
    Delete(DeleteEvent),
}

impl InboundEvent {
    pub fn channel_id(&self) -> &str {
        match self {
            Self::Message(msg) => &msg.channel_id,
            Self::Delete(event) => &event.channel_id,
        }
    }
}

/// Identity the destination message is displayed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Masquerade {
    pub name: String,
    pub avatar_url: Option<String>,
}

/// A message to send on the target platform.
#[derive(Debug)]
pub struct OutboundMessage {
    pub channel_id: ChannelKey,
    pub content: String,
    pub masquerade: Masquerade,
    /// Native reply target on the destination platform.
    pub reply_to: Option<MessageKey>,
    pub uploads: Vec<PendingAttachment>,
}
