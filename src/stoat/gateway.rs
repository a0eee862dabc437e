//! Stoat events websocket.
//!
//! Keeps one authenticated session open, answers with a `Ping` every
//! [`PING_INTERVAL`] and turns message events into bridge events.
//! Reconnects with the same backoff as the Discord client.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::{anyhow, Result};
use backon::BackoffBuilder;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as Frame;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::common::messages::{
    Author, DeleteEvent, InboundAttachment, InboundEvent, InboundMessage, ReplyRef,
};
use crate::common::types::Platform;
use crate::stoat::http::StoatHttp;
use crate::stoat::models::{ClientFrame, Message, ServerFrame};

pub const PING_INTERVAL: Duration = Duration::from_secs(20);

fn stoat_backoff() -> impl Iterator<Item = Duration> {
    backon::ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(5))
        .with_max_delay(Duration::from_secs(5 * 60))
        .with_factor(1.1)
        .with_jitter()
        .without_max_times()
        .build()
}

pub struct StoatGateway {
    ws_url: String,
    token: String,
    http: StoatHttp,
    /// File server base for attachment and avatar URLs.
    file_server: String,
    bot_user: String,
    /// Bridged channel ids; events elsewhere are dropped before any lookup.
    channels: HashSet<String>,
    events_tx: mpsc::UnboundedSender<InboundEvent>,
    cancel: CancellationToken,
}

impl StoatGateway {
    pub fn new(
        ws_url: String,
        token: String,
        http: StoatHttp,
        file_server: String,
        bot_user: String,
        channels: HashSet<String>,
        events_tx: mpsc::UnboundedSender<InboundEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            ws_url,
            token,
            http,
            file_server,
            bot_user,
            channels,
            events_tx,
            cancel,
        }
    }

    pub async fn run(self) {
        let mut backoff = stoat_backoff();

        loop {
            info!("Connecting to Stoat...");
            let mut authenticated = false;

            let result = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = self.connect_and_run(&mut authenticated) => result,
            };

            match result {
                Ok(()) => warn!("Stoat gateway closed the connection"),
                Err(e) => error!("Stoat gateway error: {}", e),
            }
            if authenticated {
                backoff = stoat_backoff();
            }

            let delay = backoff.next().unwrap_or(Duration::from_secs(5 * 60));
            warn!("Stoat disconnected. Reconnecting in {:.1}s...", delay.as_secs_f64());
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = sleep(delay) => {}
            }
        }
        info!("Stoat task ended");
    }

    async fn connect_and_run(&self, authenticated: &mut bool) -> Result<()> {
        let url = format!("{}?version=1&format=json", self.ws_url.trim_end_matches('/'));
        let (stream, _response) = connect_async(url.as_str()).await?;
        let (mut sink, mut stream) = stream.split();

        let auth = ClientFrame::Authenticate {
            token: self.token.clone(),
        };
        sink.send(Frame::Text(serde_json::to_string(&auth)?.into()))
            .await?;

        let mut ping = tokio::time::interval(PING_INTERVAL);
        ping.tick().await;
        let mut sequence: u64 = 0;

        loop {
            tokio::select! {
                _ = ping.tick() => {
                    sequence += 1;
                    let frame = serde_json::to_string(&ClientFrame::Ping { data: sequence })?;
                    sink.send(Frame::Text(frame.into())).await?;
                }
                frame = stream.next() => match frame {
                    Some(Ok(Frame::Text(text))) => self.handle_frame(&text, authenticated).await?,
                    Some(Ok(Frame::Ping(data))) => sink.send(Frame::Pong(data)).await?,
                    Some(Ok(Frame::Close(_))) | None => return Ok(()),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                },
            }
        }
    }

    async fn handle_frame(&self, text: &str, authenticated: &mut bool) -> Result<()> {
        let frame = match serde_json::from_str::<ServerFrame>(text) {
            Ok(frame) => frame,
            Err(e) => {
                debug!("Ignoring undecodable Stoat frame: {}", e);
                return Ok(());
            }
        };

        match frame {
            ServerFrame::Authenticated => {
                info!("Stoat: authenticated");
                *authenticated = true;
            }
            ServerFrame::Ready => info!("Stoat: ready"),
            ServerFrame::Message(message) => {
                if message.author == self.bot_user {
                    debug!(message_id = %message.id, "Stoat: skipping own message");
                } else if !self.channels.contains(&message.channel) {
                    debug!(channel_id = %message.channel, "Stoat: message in unbridged channel");
                } else {
                    let inbound = self.to_inbound(message).await;
                    self.emit(InboundEvent::Message(inbound));
                }
            }
            ServerFrame::MessageDelete { id, channel } if self.channels.contains(&channel) => {
                self.emit(InboundEvent::Delete(DeleteEvent {
                    platform: Platform::Stoat,
                    channel_id: channel,
                    message_id: id,
                }));
            }
            ServerFrame::Error { error } => return Err(anyhow!("Stoat rejected session: {}", error)),
            ServerFrame::MessageDelete { .. } | ServerFrame::Pong | ServerFrame::Other => {}
        }
        Ok(())
    }

    async fn to_inbound(&self, message: Message) -> InboundMessage {
        let user = match message.user.clone() {
            Some(user) => Some(user),
            None => match self.http.user(&message.author).await {
                Ok(user) => user,
                Err(e) => {
                    debug!("Stoat: could not resolve author {}: {}", message.author, e);
                    None
                }
            },
        };

        let nickname = message
            .member
            .as_ref()
            .and_then(|member| member.nickname.clone())
            .filter(|name| !name.trim().is_empty());
        let display_name = nickname
            .or_else(|| user.as_ref().map(|user| user.name().to_string()))
            .unwrap_or_else(|| "unknown".to_string());

        let avatar_url = message
            .member
            .as_ref()
            .and_then(|member| member.avatar.as_ref())
            .or_else(|| user.as_ref().and_then(|user| user.avatar.as_ref()))
            .map(|file| file.url(&self.file_server));

        InboundMessage {
            platform: Platform::Stoat,
            channel_id: message.channel,
            from_bridge: message.author == self.bot_user,
            author: Author {
                id: message.author,
                display_name,
                avatar_url,
            },
            content: message.content.unwrap_or_default(),
            reply_to: message.replies.into_iter().next().map(|id| ReplyRef {
                message_id: id,
                resolved: None,
            }),
            attachments: message
                .attachments
                .iter()
                .map(|file| InboundAttachment {
                    url: file.url(&self.file_server),
                    filename: file.filename.clone(),
                })
                .collect(),
            message_id: message.id,
            scope: None,
        }
    }

    fn emit(&self, event: InboundEvent) {
        if let Err(e) = self.events_tx.send(event) {
            warn!("Failed to queue Stoat event: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use reqwest::Client;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway(api: &str) -> (StoatGateway, mpsc::UnboundedReceiver<InboundEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let gateway = StoatGateway::new(
            "wss://events.example".to_string(),
            "secret".to_string(),
            StoatHttp::new(Client::new(), api, "secret"),
            "https://cdn.example".to_string(),
            "BOT".to_string(),
            HashSet::from(["S1".to_string()]),
            tx,
            CancellationToken::new(),
        );
        (gateway, rx)
    }

    #[tokio::test]
    async fn test_message_frame_becomes_inbound_event() {
        let (gateway, mut rx) = gateway("http://127.0.0.1:9");
        let mut authenticated = false;
        let frame = json!({
            "type": "Message",
            "_id": "M1",
            "channel": "S1",
            "author": "U1",
            "content": "hi",
            "replies": ["M0"],
            "attachments": [{"_id": "f1", "tag": "attachments", "filename": "cat.png"}],
            "user": {"_id": "U1", "username": "alex", "avatar": {"_id": "av", "tag": "avatars"}},
            "member": {"nickname": "Alexandra"}
        })
        .to_string();

        gateway.handle_frame(&frame, &mut authenticated).await.unwrap();

        match rx.recv().await {
            Some(InboundEvent::Message(msg)) => {
                assert_eq!(msg.author.display_name, "Alexandra");
                assert_eq!(msg.author.avatar_url.as_deref(), Some("https://cdn.example/avatars/av"));
                assert_eq!(msg.reply_to.unwrap().message_id, "M0");
                assert_eq!(msg.attachments[0].url, "https://cdn.example/attachments/f1");
                assert!(!msg.from_bridge);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_author_fetched_when_not_embedded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/U2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "_id": "U2", "username": "robin"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (gateway, mut rx) = gateway(&server.uri());
        let mut authenticated = false;
        let frame = json!({"type": "Message", "_id": "M2", "channel": "S1", "author": "U2"}).to_string();
        gateway.handle_frame(&frame, &mut authenticated).await.unwrap();

        match rx.recv().await {
            Some(InboundEvent::Message(msg)) => {
                assert_eq!(msg.author.display_name, "robin");
                assert!(!msg.from_bridge);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_own_and_unbridged_messages_dropped_without_lookup() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "_id": "U2", "username": "robin"
            })))
            .expect(0)
            .mount(&server)
            .await;

        let (gateway, mut rx) = gateway(&server.uri());
        let mut authenticated = false;
        let echo = json!({
            "type": "Message", "_id": "M3", "channel": "S1", "author": "BOT",
            "masquerade": {"name": "Sam"}
        })
        .to_string();
        let elsewhere = json!({"type": "Message", "_id": "M4", "channel": "S9", "author": "U2"}).to_string();
        let foreign_delete = json!({"type": "MessageDelete", "id": "M5", "channel": "S9"}).to_string();

        for frame in [echo, elsewhere, foreign_delete] {
            gateway.handle_frame(&frame, &mut authenticated).await.unwrap();
        }

        assert!(rx.try_recv().is_err());
        server.verify().await;
    }

    #[tokio::test]
    async fn test_control_frames() {
        let (gateway, mut rx) = gateway("http://127.0.0.1:9");
        let mut authenticated = false;

        gateway
            .handle_frame(r#"{"type": "Authenticated"}"#, &mut authenticated)
            .await
            .unwrap();
        assert!(authenticated);

        gateway
            .handle_frame(r#"{"type": "MessageDelete", "id": "M1", "channel": "S1"}"#, &mut authenticated)
            .await
            .unwrap();
        match rx.recv().await {
            Some(InboundEvent::Delete(event)) => assert_eq!(event.message_id, "M1"),
            other => panic!("unexpected event: {:?}", other),
        }

        assert!(gateway.handle_frame("garbage", &mut authenticated).await.is_ok());
        assert!(gateway
            .handle_frame(r#"{"type": "Error", "error": "InvalidSession"}"#, &mut authenticated)
            .await
            .is_err());
    }
}
