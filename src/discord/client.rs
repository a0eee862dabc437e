//! Discord bot client abstraction.
//!
//! Builds the serenity client, keeps the gateway connected and hands
//! gateway events to the [`BridgeHandler`].

use std::sync::Arc;
use std::time::Duration;

use backon::BackoffBuilder;
use serenity::all::{ChannelId, GuildId, MessageId};
use serenity::async_trait;
use serenity::http::HttpBuilder;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::prelude::*;
use serenity::Client;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::common::messages::InboundEvent;
use crate::discord::api::DiscordPlatform;
use crate::discord::handler::BridgeHandler;

#[derive(Debug, Clone)]
pub enum DiscordBotEvent {
    /// Bot connected and ready.
    Ready { context: Context, ready: Ready },
    /// Message received.
    Message(Message),
    /// One or more messages deleted.
    MessageDelete {
        channel_id: ChannelId,
        message_ids: Vec<MessageId>,
    },
    Disconnected,
}

struct DiscordBotEvents {
    discord_events_tx: mpsc::UnboundedSender<DiscordBotEvent>,
}

impl DiscordBotEvents {
    fn new(discord_events_tx: mpsc::UnboundedSender<DiscordBotEvent>) -> Self {
        Self { discord_events_tx }
    }

    fn forward(&self, event: DiscordBotEvent) {
        if let Err(error) = self.discord_events_tx.send(event) {
            warn!("Failed to process discord event: {}", error);
        }
    }
}

#[async_trait]
impl EventHandler for DiscordBotEvents {
    async fn ready(&self, context: Context, ready: Ready) {
        self.forward(DiscordBotEvent::Ready { context, ready });
    }

    async fn message(&self, _context: Context, message: Message) {
        self.forward(DiscordBotEvent::Message(message));
    }

    async fn message_delete(
        &self,
        _context: Context,
        channel_id: ChannelId,
        deleted_message_id: MessageId,
        _guild_id: Option<GuildId>,
    ) {
        self.forward(DiscordBotEvent::MessageDelete {
            channel_id,
            message_ids: vec![deleted_message_id],
        });
    }

    async fn message_delete_bulk(
        &self,
        _context: Context,
        channel_id: ChannelId,
        multiple_deleted_messages_ids: Vec<MessageId>,
        _guild_id: Option<GuildId>,
    ) {
        self.forward(DiscordBotEvent::MessageDelete {
            channel_id,
            message_ids: multiple_deleted_messages_ids,
        });
    }
}

/// Builder for creating the Discord bot.
pub struct DiscordBotBuilder {
    token: String,
    channels: Vec<String>,
    events_tx: mpsc::UnboundedSender<InboundEvent>,
    cancel: CancellationToken,
}

impl DiscordBotBuilder {
    /// Create a new Discord bot builder.
    ///
    /// `channels` are the bridged Discord channel ids; `events_tx` receives
    /// normalized events for the bridge.
    pub fn new(
        token: String,
        channels: Vec<String>,
        events_tx: mpsc::UnboundedSender<InboundEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            token,
            channels,
            events_tx,
            cancel,
        }
    }

    /// Build the Discord bot.
    pub async fn build(self) -> anyhow::Result<DiscordBot> {
        let (discord_events_tx, discord_events_rx) = mpsc::unbounded_channel::<DiscordBotEvent>();

        let client = build_client(&self.token, discord_events_tx.clone()).await?;
        let platform = Arc::new(DiscordPlatform::new(client.http.clone()));
        let handler = BridgeHandler::new(platform.clone(), self.channels, self.events_tx);

        Ok(DiscordBot {
            client: Some(client),
            token: self.token,
            platform,
            handler,
            discord_events_rx,
            discord_events_tx,
            cancel: self.cancel,
        })
    }
}

async fn build_client(
    token: &str,
    discord_events_tx: mpsc::UnboundedSender<DiscordBotEvent>,
) -> anyhow::Result<Client> {
    let intents = GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_WEBHOOKS;

    // Build a custom reqwest client with timeout settings
    let reqwest_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .connect_timeout(Duration::from_secs(10))
        .build()?;

    let http = HttpBuilder::new(token).client(reqwest_client).build();

    let events = DiscordBotEvents::new(discord_events_tx);
    let client = serenity::client::ClientBuilder::new_with_http(http, intents)
        .event_handler(events)
        .await?;
    Ok(client)
}

/// Create an exponential backoff iterator for Discord reconnection.
/// 5s initial, 5min max, factor 1.1, with jitter, unlimited retries.
fn discord_backoff() -> impl Iterator<Item = Duration> {
    backon::ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(5))
        .with_max_delay(Duration::from_secs(5 * 60))
        .with_factor(1.1)
        .with_jitter()
        .without_max_times()
        .build()
}

pub struct DiscordBot {
    client: Option<Client>,
    token: String,
    platform: Arc<DiscordPlatform>,
    handler: BridgeHandler,
    discord_events_rx: mpsc::UnboundedReceiver<DiscordBotEvent>,
    discord_events_tx: mpsc::UnboundedSender<DiscordBotEvent>,
    cancel: CancellationToken,
}

impl DiscordBot {
    /// Outbound side of the Discord adapter.
    pub fn platform(&self) -> Arc<DiscordPlatform> {
        self.platform.clone()
    }

    pub async fn run(mut self) {
        // Extract shard manager before we move client into run_connection
        let shard_manager = self.client.as_ref().map(|c| c.shard_manager.clone());
        let client = &mut self.client;
        let discord_events_rx = &mut self.discord_events_rx;
        let handler = &self.handler;
        let cancel = self.cancel.clone();

        tokio::select! {
            _ = Self::run_connection(client, &self.token, &self.discord_events_tx) => {},
            _ = Self::process_events(discord_events_rx, handler) => {},
            _ = async {
                cancel.cancelled().await;
                if let Some(ref manager) = shard_manager {
                    info!("Initiating graceful Discord shutdown...");
                    manager.shutdown_all().await;
                    info!("Discord shutdown complete");
                }
            } => {}
        }
        info!("Discord task ended");
    }

    async fn run_connection(
        client: &mut Option<Client>,
        token: &str,
        discord_events_tx: &mpsc::UnboundedSender<DiscordBotEvent>,
    ) {
        let mut backoff = discord_backoff();

        loop {
            info!("Connecting to Discord...");

            let mut client = match client.take() {
                Some(client) => client,
                None => {
                    // serenity mostly handles reconnections itself.
                    match build_client(token, discord_events_tx.clone()).await {
                        Ok(client) => {
                            backoff = discord_backoff();
                            client
                        }
                        Err(e) => {
                            error!("Failed to rebuild Discord client: {}", e);
                            let delay = backoff.next().unwrap_or(Duration::from_secs(5 * 60));
                            warn!("Retrying in {:.1}s...", delay.as_secs_f64());
                            sleep(delay).await;
                            continue;
                        }
                    }
                }
            };

            match client.start().await {
                Ok(()) => {
                    info!("Discord client disconnected normally");
                    if let Err(error) = discord_events_tx.send(DiscordBotEvent::Disconnected) {
                        warn!("Failed to process discord event: {}", error);
                    }
                    break;
                }
                Err(e) => {
                    error!("Discord client error: {}", e);
                    let delay = backoff.next().unwrap_or(Duration::from_secs(5 * 60));
                    warn!(
                        "Discord disconnected. Reconnecting in {:.1}s...",
                        delay.as_secs_f64(),
                    );
                    if let Err(error) = discord_events_tx.send(DiscordBotEvent::Disconnected) {
                        warn!("Failed to process discord event: {}", error);
                    }
                    sleep(delay).await;
                }
            }
        }
    }

    async fn process_events(
        discord_events_rx: &mut mpsc::UnboundedReceiver<DiscordBotEvent>,
        handler: &BridgeHandler,
    ) {
        let mut connected = false;

        while let Some(event) = discord_events_rx.recv().await {
            match event {
                DiscordBotEvent::Ready { context, ready } => {
                    handler.handle_ready(context, ready).await;
                    connected = true;
                }
                DiscordBotEvent::Message(message) => {
                    if !connected {
                        debug!("Dropping Discord message received before Ready");
                        continue;
                    }
                    handler.handle_message(message).await;
                }
                DiscordBotEvent::MessageDelete {
                    channel_id,
                    message_ids,
                } => {
                    handler.handle_delete(channel_id, message_ids);
                }
                DiscordBotEvent::Disconnected => {
                    connected = false;
                }
            }
        }
        debug!("Discord events channel closed.");
    }
}
