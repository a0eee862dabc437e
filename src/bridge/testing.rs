//! In-memory platform and bridge fixtures for tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::Client;

use crate::bridge::platform::{ChatPlatform, MentionLookup};
use crate::bridge::{
    AttachmentRelay, Bridge, ChannelPairRegistry, ContentSanitizer, MessageCorrelationCache,
    NotificationLedger,
};
use crate::common::error::{PlatformError, PlatformResult};
use crate::common::messages::{
    Author, DeleteEvent, InboundMessage, OutboundMessage, QuotedMessage,
};
use crate::common::types::{MessageKey, Platform};

/// What a fake platform was asked to send.
#[derive(Debug, Clone)]
pub struct Sent {
    pub channel_id: String,
    pub content: String,
    pub name: String,
    pub reply_to: Option<String>,
    pub uploads: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeleteOutcome {
    Ok,
    Gone,
    Fail,
}

/// Records calls and answers lookups for user `123` (Alex) and channel `456` (general).
pub struct FakePlatform {
    platform: Platform,
    uploads: bool,
    native_replies: bool,
    pub sent: Mutex<Vec<Sent>>,
    pub deleted: Mutex<Vec<(String, String, bool)>>,
    pub delete_outcome: Mutex<DeleteOutcome>,
    pub quoted: Mutex<Option<QuotedMessage>>,
    pub notices: Mutex<Vec<String>>,
    pub fail_send: AtomicBool,
}

impl FakePlatform {
    pub fn new(platform: Platform, uploads: bool, native_replies: bool) -> Arc<Self> {
        Arc::new(Self {
            platform,
            uploads,
            native_replies,
            sent: Default::default(),
            deleted: Default::default(),
            delete_outcome: Mutex::new(DeleteOutcome::Ok),
            quoted: Default::default(),
            notices: Default::default(),
            fail_send: AtomicBool::new(false),
        })
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<(String, String, bool)> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl MentionLookup for FakePlatform {
    async fn user_name(&self, _scope: Option<&str>, user_id: &str) -> PlatformResult<Option<String>> {
        Ok((user_id == "123").then(|| "Alex".to_string()))
    }

    async fn channel_name(&self, _scope: Option<&str>, channel_id: &str) -> PlatformResult<Option<String>> {
        Ok((channel_id == "456").then(|| "general".to_string()))
    }
}

#[async_trait]
impl ChatPlatform for FakePlatform {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn accepts_uploads(&self) -> bool {
        self.uploads
    }

    fn native_replies(&self) -> bool {
        self.native_replies
    }

    async fn send_message(&self, message: OutboundMessage) -> PlatformResult<MessageKey> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(PlatformError::Rejected {
                status: 500,
                body: "boom".to_string(),
            });
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(Sent {
            channel_id: message.channel_id,
            content: message.content,
            name: message.masquerade.name,
            reply_to: message.reply_to,
            uploads: message.uploads.into_iter().map(|u| u.filename).collect(),
        });
        Ok(format!("{}-sent-{}", self.platform, sent.len()))
    }

    async fn delete_message(&self, channel_id: &str, message_id: &str, mirrored: bool) -> PlatformResult<()> {
        self.deleted
            .lock()
            .unwrap()
            .push((channel_id.to_string(), message_id.to_string(), mirrored));
        match *self.delete_outcome.lock().unwrap() {
            DeleteOutcome::Ok => Ok(()),
            DeleteOutcome::Gone => Err(PlatformError::AlreadyGone),
            DeleteOutcome::Fail => Err(PlatformError::Rejected {
                status: 403,
                body: "forbidden".to_string(),
            }),
        }
    }

    async fn fetch_message(&self, _channel_id: &str, _message_id: &str) -> PlatformResult<QuotedMessage> {
        self.quoted.lock().unwrap().clone().ok_or(PlatformError::AlreadyGone)
    }

    async fn send_notice(&self, user_id: &str) -> PlatformResult<()> {
        self.notices.lock().unwrap().push(user_id.to_string());
        Ok(())
    }
}

pub struct Harness {
    pub bridge: Bridge,
    pub discord: Arc<FakePlatform>,
    pub stoat: Arc<FakePlatform>,
    _dir: tempfile::TempDir,
}

/// Bridge over one pair `D1 <-> S1`.
///
/// The Discord side behaves like a webhook target (uploads, no native
/// replies); the Stoat side links attachments and supports native replies.
pub fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let discord = FakePlatform::new(Platform::Discord, true, false);
    let stoat = FakePlatform::new(Platform::Stoat, false, true);
    let registry = ChannelPairRegistry::new(&["D1".to_string()], &["S1".to_string()]).unwrap();

    let bridge = Bridge::new(
        registry,
        MessageCorrelationCache::new(10),
        ContentSanitizer::new().unwrap(),
        AttachmentRelay::new(Client::new(), 1024, 2),
        NotificationLedger::load(dir.path().join("notified.json")),
        discord.clone(),
        stoat.clone(),
    );
    Harness {
        bridge,
        discord,
        stoat,
        _dir: dir,
    }
}

pub fn message(platform: Platform, channel: &str, id: &str, content: &str) -> InboundMessage {
    InboundMessage {
        platform,
        channel_id: channel.to_string(),
        message_id: id.to_string(),
        author: Author {
            id: "user-1".to_string(),
            display_name: "Sam".to_string(),
            avatar_url: None,
        },
        content: content.to_string(),
        reply_to: None,
        attachments: Vec::new(),
        from_bridge: false,
        scope: Some("guild".to_string()),
    }
}

pub fn delete(platform: Platform, channel: &str, id: &str) -> DeleteEvent {
    DeleteEvent {
        platform,
        channel_id: channel.to_string(),
        message_id: id.to_string(),
    }
}
