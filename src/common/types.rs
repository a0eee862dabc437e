//! Shared types used across the application.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the two bridged chat platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Discord,
    Stoat,
}

impl Platform {
    /// The platform on the other side of the bridge.
    pub fn peer(self) -> Self {
        match self {
            Self::Discord => Self::Stoat,
            Self::Stoat => Self::Discord,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Discord => "discord",
            Self::Stoat => "stoat",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque channel identifier on either platform.
pub type ChannelKey = String;

/// Opaque message identifier on either platform.
pub type MessageKey = String;

/// A message id on the peer platform, as returned by a correlation lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerMessage {
    pub id: MessageKey,
    /// True when the peer copy was created by the bridge (webhook/masquerade send).
    pub mirrored: bool,
}
