//! Stoat integration.
//!
//! REST calls authenticate with the bot token; events arrive over the
//! websocket gateway advertised by the node info endpoint.

pub mod client;
pub mod gateway;
pub mod http;
pub mod models;

pub use client::StoatPlatform;
pub use gateway::StoatGateway;
pub use http::StoatHttp;
