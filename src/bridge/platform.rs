//! Capabilities the bridge core needs from each chat platform.

use async_trait::async_trait;

use crate::common::error::PlatformResult;
use crate::common::messages::{OutboundMessage, QuotedMessage};
use crate::common::types::{MessageKey, Platform};

/// Name lookups used to turn markup into readable text.
///
/// `Ok(None)` means the entity does not exist; errors are transient failures.
/// `scope` is the lookup context of the message (the Discord guild).
#[async_trait]
pub trait MentionLookup: Send + Sync {
    async fn user_name(&self, scope: Option<&str>, user_id: &str) -> PlatformResult<Option<String>>;

    async fn channel_name(
        &self,
        _scope: Option<&str>,
        _channel_id: &str,
    ) -> PlatformResult<Option<String>> {
        Ok(None)
    }

    async fn role_name(&self, _scope: Option<&str>, _role_id: &str) -> PlatformResult<Option<String>> {
        Ok(None)
    }

    async fn emoji_name(&self, _emoji_id: &str) -> PlatformResult<Option<String>> {
        Ok(None)
    }
}

/// One side of the bridge.
#[async_trait]
pub trait ChatPlatform: MentionLookup {
    fn platform(&self) -> Platform;

    /// Whether relayed files can be uploaded, rather than linked.
    fn accepts_uploads(&self) -> bool;

    /// Whether `OutboundMessage::reply_to` is rendered as a native reply.
    fn native_replies(&self) -> bool;

    /// Post a message and return its id.
    async fn send_message(&self, message: OutboundMessage) -> PlatformResult<MessageKey>;

    /// Delete a message. `mirrored` is true when the bridge created it.
    ///
    /// A missing target yields `PlatformError::AlreadyGone`.
    async fn delete_message(
        &self,
        channel_id: &str,
        message_id: &str,
        mirrored: bool,
    ) -> PlatformResult<()>;

    /// Fetch a message for a reply quote.
    async fn fetch_message(&self, channel_id: &str, message_id: &str) -> PlatformResult<QuotedMessage>;

    /// Send the one-time welcome notice to a user.
    async fn send_notice(&self, user_id: &str) -> PlatformResult<()>;
}
