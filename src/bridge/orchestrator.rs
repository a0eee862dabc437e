//! Bridge orchestrator that ties Discord and Stoat together.
//!
//! Every inbound event passes through here: messages are filtered, sanitized,
//! given reply context and attachments, then sent to the paired channel and
//! correlated. Deletes are mirrored using the correlation cache, with the loop
//! guard swallowing the echo of the bridge's own deletes.
//!
//! Nothing in this module returns an error to its caller. Failures are logged
//! with platform, channel and message id and the event is abandoned.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::common::error::PlatformError;
use crate::common::messages::{
    DeleteEvent, InboundAttachment, InboundMessage, Masquerade, OutboundMessage, QuotedMessage,
};
use crate::common::types::{MessageKey, Platform};

use super::attachments::{AttachmentRelay, PendingAttachment, UploadSlots};
use super::correlation::MessageCorrelationCache;
use super::guard::LoopGuard;
use super::ledger::NotificationLedger;
use super::platform::ChatPlatform;
use super::registry::ChannelPairRegistry;
use super::sanitizer::ContentSanitizer;

/// Message length limit shared by both platforms.
pub const MAX_CONTENT_CHARS: usize = 2000;
const QUOTE_AUTHOR_CHARS: usize = 50;
const QUOTE_SNIPPET_CHARS: usize = 80;

/// The main bridge that orchestrates message flow.
pub struct Bridge {
    registry: ChannelPairRegistry,
    correlation: Mutex<MessageCorrelationCache>,
    guard: LoopGuard,
    sanitizer: ContentSanitizer,
    relay: AttachmentRelay,
    ledger: NotificationLedger,
    discord: Arc<dyn ChatPlatform>,
    stoat: Arc<dyn ChatPlatform>,
}

impl Bridge {
    pub fn new(
        registry: ChannelPairRegistry,
        correlation: MessageCorrelationCache,
        sanitizer: ContentSanitizer,
        relay: AttachmentRelay,
        ledger: NotificationLedger,
        discord: Arc<dyn ChatPlatform>,
        stoat: Arc<dyn ChatPlatform>,
    ) -> Self {
        Self {
            registry,
            correlation: Mutex::new(correlation),
            guard: LoopGuard::new(),
            sanitizer,
            relay,
            ledger,
            discord,
            stoat,
        }
    }

    pub fn registry(&self) -> &ChannelPairRegistry {
        &self.registry
    }

    fn side(&self, platform: Platform) -> &Arc<dyn ChatPlatform> {
        match platform {
            Platform::Discord => &self.discord,
            Platform::Stoat => &self.stoat,
        }
    }

    /// Forward a message to the paired channel.
    pub async fn on_message(&self, msg: InboundMessage) {
        if msg.from_bridge {
            return;
        }
        let Some(target_channel) = self.registry.peer_of(msg.platform, &msg.channel_id) else {
            debug!(platform = %msg.platform, channel_id = %msg.channel_id, "Message in unbridged channel");
            return;
        };
        let target_channel = target_channel.to_string();

        let source = Arc::clone(self.side(msg.platform));
        let target = Arc::clone(self.side(msg.platform.peer()));

        self.claim_notice(&source, &msg.author.id).await;

        let mut content = self
            .sanitizer
            .sanitize(msg.platform, &msg.content, msg.scope.as_deref(), source.as_ref())
            .await;

        let mut reply_to = None;
        if let Some(reply) = &msg.reply_to {
            let peer = self
                .correlation
                .lock()
                .await
                .lookup(msg.platform, &reply.message_id);

            match peer {
                Some(peer) if target.native_replies() => {
                    debug!(
                        platform = %msg.platform,
                        reply_to = %reply.message_id,
                        peer_id = %peer.id,
                        "Linking native reply"
                    );
                    reply_to = Some(peer.id);
                }
                _ => {
                    let quoted = match &reply.resolved {
                        Some(quoted) => Some(quoted.clone()),
                        None => match source.fetch_message(&msg.channel_id, &reply.message_id).await {
                            Ok(quoted) => Some(quoted),
                            Err(e) => {
                                debug!(
                                    platform = %msg.platform,
                                    channel_id = %msg.channel_id,
                                    message_id = %reply.message_id,
                                    error = %e,
                                    "Could not fetch reply target, forwarding without quote"
                                );
                                None
                            }
                        },
                    };
                    if let Some(quoted) = quoted {
                        content = format!("{}\n{}", quote_line(&quoted), content);
                    }
                }
            }
        }

        let ResolvedAttachments {
            uploads,
            links,
            _slots,
        } = self.resolve_attachments(&msg, target.accepts_uploads()).await;
        for link in links {
            if !content.is_empty() {
                content.push('\n');
            }
            content.push_str(&link);
        }

        if content.trim().is_empty() && uploads.is_empty() {
            debug!(platform = %msg.platform, message_id = %msg.message_id, "Nothing to forward");
            return;
        }

        let outbound = OutboundMessage {
            channel_id: target_channel.clone(),
            content: truncate_chars(&content, MAX_CONTENT_CHARS),
            masquerade: Masquerade {
                name: msg.author.display_name.clone(),
                avatar_url: msg.author.avatar_url.clone(),
            },
            reply_to,
            uploads,
        };

        match target.send_message(outbound).await {
            Ok(sent_id) => {
                self.correlate(msg.platform, &msg.message_id, &sent_id).await;
                info!(
                    from = %msg.platform,
                    channel_id = %msg.channel_id,
                    message_id = %msg.message_id,
                    peer_id = %sent_id,
                    "{} -> {}: message from {}",
                    msg.platform,
                    msg.platform.peer(),
                    msg.author.display_name
                );
            }
            Err(e) => {
                error!(
                    from = %msg.platform,
                    channel_id = %target_channel,
                    message_id = %msg.message_id,
                    error = %e,
                    "Failed to forward message"
                );
            }
        }
    }

    /// Mirror a deletion to the paired channel.
    pub async fn on_delete(&self, event: DeleteEvent) {
        if self
            .guard
            .consume_if_self_initiated(event.platform, &event.message_id)
            .await
        {
            debug!(platform = %event.platform, message_id = %event.message_id, "Suppressed echo of bridge delete");
            return;
        }

        let Some(target_channel) = self.registry.peer_of(event.platform, &event.channel_id) else {
            return;
        };

        let peer = self
            .correlation
            .lock()
            .await
            .lookup(event.platform, &event.message_id);
        let Some(peer) = peer else {
            debug!(platform = %event.platform, message_id = %event.message_id, "Deleted message not bridged");
            return;
        };

        let target_platform = event.platform.peer();
        let target = self.side(target_platform);

        self.guard.mark_self_initiated(target_platform, &peer.id).await;
        match target
            .delete_message(target_channel, &peer.id, peer.mirrored)
            .await
        {
            Ok(()) => {
                info!(
                    from = %event.platform,
                    message_id = %event.message_id,
                    peer_id = %peer.id,
                    "{} -> {}: deleted mirrored message",
                    event.platform,
                    target_platform
                );
            }
            Err(PlatformError::AlreadyGone) => {
                self.guard.release(target_platform, &peer.id).await;
                debug!(platform = %target_platform, message_id = %peer.id, "Peer message already gone");
            }
            Err(e) => {
                self.guard.release(target_platform, &peer.id).await;
                error!(
                    platform = %target_platform,
                    channel_id = %target_channel,
                    message_id = %peer.id,
                    error = %e,
                    "Failed to delete peer message"
                );
            }
        }
    }

    /// Send the welcome notice the first time a user writes in a bridged channel.
    async fn claim_notice(&self, source: &Arc<dyn ChatPlatform>, user_id: &str) {
        let platform = source.platform();
        if !self.ledger.mark_notified(platform, user_id).await {
            return;
        }

        let source = Arc::clone(source);
        let user_id = user_id.to_string();
        tokio::spawn(async move {
            match source.send_notice(&user_id).await {
                Ok(()) => info!(platform = %platform, user_id = %user_id, "Sent welcome notice"),
                Err(e) => debug!(platform = %platform, user_id = %user_id, error = %e, "Could not send welcome notice"),
            }
        });
    }

    /// Download attachments for upload, or fall back to links.
    ///
    /// Attachments beyond the relay pool size are linked instead of waiting
    /// for slots this message would never release.
    async fn resolve_attachments(
        &self,
        msg: &InboundMessage,
        accepts_uploads: bool,
    ) -> ResolvedAttachments {
        let all_links = || -> Vec<String> { msg.attachments.iter().map(|a| a.url.clone()).collect() };
        if !accepts_uploads || msg.attachments.is_empty() {
            return ResolvedAttachments {
                uploads: Vec::new(),
                links: all_links(),
                _slots: None,
            };
        }

        let slots = match self.relay.reserve(msg.attachments.len()).await {
            Ok(slots) => slots,
            Err(e) => {
                warn!(platform = %msg.platform, message_id = %msg.message_id, error = %e, "Attachment relay unavailable, forwarding links");
                return ResolvedAttachments {
                    uploads: Vec::new(),
                    links: all_links(),
                    _slots: None,
                };
            }
        };

        let (relayed, overflow) = msg.attachments.split_at(slots.count());
        if !overflow.is_empty() {
            debug!(
                platform = %msg.platform,
                message_id = %msg.message_id,
                linked = overflow.len(),
                "More attachments than relay slots, linking the rest"
            );
        }

        let results = join_all(relayed.iter().map(|attachment| self.relay_one(msg, attachment))).await;

        let mut uploads = Vec::new();
        let mut links = Vec::new();
        for result in results {
            match result {
                Ok(pending) => uploads.push(pending),
                Err(url) => links.push(url),
            }
        }
        links.extend(overflow.iter().map(|a| a.url.clone()));

        ResolvedAttachments {
            uploads,
            links,
            _slots: Some(slots),
        }
    }

    async fn relay_one(
        &self,
        msg: &InboundMessage,
        attachment: &InboundAttachment,
    ) -> Result<PendingAttachment, String> {
        self.relay
            .relay(&attachment.url, attachment.filename.as_deref())
            .await
            .map_err(|e| {
                warn!(
                    platform = %msg.platform,
                    message_id = %msg.message_id,
                    url = %attachment.url,
                    error = %e,
                    "Attachment relay failed, forwarding link"
                );
                attachment.url.clone()
            })
    }

    async fn correlate(&self, origin: Platform, source_id: &str, sent_id: &MessageKey) {
        let mut correlation = self.correlation.lock().await;
        match origin {
            Platform::Discord => correlation.record(source_id, sent_id, origin),
            Platform::Stoat => correlation.record(sent_id, source_id, origin),
        }
        debug!(
            entries = correlation.len(),
            capacity = correlation.capacity(),
            "Recorded message pair"
        );
    }
}

/// Attachments ready for one outbound message.
struct ResolvedAttachments {
    uploads: Vec<PendingAttachment>,
    links: Vec<String>,
    /// Keeps the relay slots until the message has been sent.
    _slots: Option<UploadSlots>,
}

/// `↩ author: snippet` header for a reply without native linkage.
pub fn quote_line(quoted: &QuotedMessage) -> String {
    let author = truncate_chars(&quoted.author, QUOTE_AUTHOR_CHARS);
    let snippet = truncate_chars(&quoted.content, QUOTE_SNIPPET_CHARS).replace('\n', " ");
    format!("↩ {}: {}", author, snippet)
}

/// First `max` characters of `text`.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((index, _)) => text[..index].to_string(),
        None => text.to_string(),
    }
}
