//! Ferryman - Discord-Stoat chat bridge
//!
//! Mirrors messages between paired Discord and Stoat channels, keeping
//! author identity, replies, attachments and deletions in sync.

mod bridge;
mod common;
mod config;
mod discord;
mod stoat;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use bridge::{
    AttachmentRelay, Bridge, ChannelBundle, ChannelPairRegistry, ContentSanitizer, Dispatcher,
    MessageCorrelationCache, NotificationLedger, SHUTDOWN_TIMEOUT,
};
use common::types::Platform;
use config::load_from_env;
use discord::DiscordBotBuilder;
use stoat::{StoatGateway, StoatHttp, StoatPlatform};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let _ = rustls::crypto::ring::default_provider().install_default();

    info!("Ferryman v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = match load_from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            error!("Set the variables in the environment or a .env file.");
            std::process::exit(1);
        }
    };

    let registry = ChannelPairRegistry::new(&config.discord.channel_ids, &config.stoat.channel_ids)?;
    info!("Configuration loaded successfully");
    info!("  Stoat API: {}", config.stoat.api_url);
    info!("  Channel pairs: {}", registry.len());
    for pair in registry.pairs() {
        info!("  Discord {} <-> Stoat {}", pair.discord_id, pair.stoat_id);
    }

    let cancel = CancellationToken::new();
    let channels = ChannelBundle::new();

    // ============================================================
    // Discord
    // ============================================================
    let discord_bot = DiscordBotBuilder::new(
        config.discord.token.clone(),
        registry.channels(Platform::Discord).map(String::from).collect(),
        channels.adapters.discord_tx.clone(),
        cancel.clone(),
    )
    .build()
    .await?;
    let discord = discord_bot.platform();

    // ============================================================
    // Stoat
    // ============================================================
    let api_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .connect_timeout(Duration::from_secs(10))
        .build()?;
    let stoat_http = StoatHttp::new(api_client, &config.stoat.api_url, &config.stoat.token);

    let node = match stoat_http.node_info().await {
        Ok(node) => node,
        Err(e) => {
            error!("Failed to query Stoat node at {}: {}", config.stoat.api_url, e);
            std::process::exit(1);
        }
    };
    let me = match stoat_http.current_user().await {
        Ok(me) => me,
        Err(e) => {
            error!("Failed to authenticate with Stoat: {}", e);
            std::process::exit(1);
        }
    };
    info!("Stoat: logged in as {}", me.username);

    let stoat = Arc::new(StoatPlatform::new(stoat_http.clone()));
    let stoat_gateway = StoatGateway::new(
        node.ws,
        config.stoat.token.clone(),
        stoat_http,
        node.features.autumn.url,
        me.id,
        registry.channels(Platform::Stoat).map(String::from).collect(),
        channels.adapters.stoat_tx.clone(),
        cancel.clone(),
    );

    // ============================================================
    // Bridge
    // ============================================================
    let download_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(120))
        .connect_timeout(Duration::from_secs(10))
        .build()?;
    let relay = AttachmentRelay::new(
        download_client,
        config.bridge.max_file_size,
        config.bridge.max_concurrent_uploads,
    );
    info!("Attachment limit: {} bytes", relay.max_bytes());

    let bridge = Arc::new(Bridge::new(
        registry,
        MessageCorrelationCache::new(config.bridge.msg_cache_size),
        ContentSanitizer::new()?,
        relay,
        NotificationLedger::load(&config.bridge.notified_users_file),
        discord,
        stoat,
    ));

    let dispatcher = Dispatcher::new(bridge, cancel);
    dispatcher.start(channels.bridge);
    drop(channels.adapters);

    let mut discord_task = tokio::spawn(discord_bot.run());
    let mut stoat_task = tokio::spawn(stoat_gateway.run());

    let failed = tokio::select! {
        biased;
        _ = shutdown_signal() => {
            info!("Shutdown signal received - stopping bridge...");
            None
        }
        _ = &mut discord_task => Some(Platform::Discord),
        _ = &mut stoat_task => Some(Platform::Stoat),
    };

    if let Some(platform) = failed {
        error!("{} task exited unexpectedly", platform);
    }
    dispatcher.shutdown(SHUTDOWN_TIMEOUT).await;

    if failed.is_none() {
        let gateways = async {
            let _ = tokio::join!(discord_task, stoat_task);
        };
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, gateways).await.is_err() {
            warn!("Gateway shutdown timed out");
        }
    }

    info!("Exiting...");
    exit_status(failed)
}

/// Process result once the bridge has stopped: an error if a gateway died.
fn exit_status(failed: Option<Platform>) -> Result<()> {
    match failed {
        None => Ok(()),
        Some(platform) => Err(anyhow!("{} gateway exited unexpectedly", platform)),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
