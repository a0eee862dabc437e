//! Error types for the application.

use thiserror::Error;

/// Configuration-related errors. Fatal, only raised at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config validation failed:\n{message}")]
    ValidationError { message: String },

    #[error("Channel list length mismatch: {discord} Discord IDs vs {stoat} Stoat IDs")]
    ChannelCountMismatch { discord: usize, stoat: usize },

    #[error("No channel pairs configured")]
    NoChannels,

    #[error("Channel {channel_id} is listed more than once")]
    DuplicateChannel { channel_id: String },
}

/// Errors returned by a platform adapter (send, delete, fetch, lookups).
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Platform session not ready: {message}")]
    NotReady { message: String },

    #[error("Invalid identifier '{id}'")]
    InvalidId { id: String },

    /// The target of a delete or fetch no longer exists.
    #[error("Target already gone")]
    AlreadyGone,

    #[error("Request rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Discord error: {0}")]
    Discord(#[from] serenity::Error),

    #[error("Unexpected response: {message}")]
    Decode { message: String },
}

/// Errors from the attachment relay.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Attachment too large ({size} B, limit {limit} B)")]
    TooLarge { size: u64, limit: u64 },

    #[error("Attachment fetch failed with HTTP {status}")]
    FetchFailed { status: u16 },

    #[error("Attachment transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Attachment relay closed")]
    Closed,
}

/// Errors while persisting the notification ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger IO error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Ledger serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type alias for platform operations.
pub type PlatformResult<T> = std::result::Result<T, PlatformError>;
