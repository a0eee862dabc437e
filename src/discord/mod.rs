//! Discord bot integration.
//!
//! Gateway intake via serenity, outbound delivery through per-channel
//! webhooks so relayed messages carry the original author's name and avatar.

pub mod api;
pub mod client;
pub mod handler;

pub use api::DiscordPlatform;
pub use client::{DiscordBot, DiscordBotBuilder};
