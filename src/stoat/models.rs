//! Stoat API payloads.

use serde::{Deserialize, Serialize};

/// Response of `GET /`.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeInfo {
    /// Websocket endpoint.
    pub ws: String,
    pub features: NodeFeatures,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeFeatures {
    pub autumn: FileServer,
}

/// The file server that hosts attachments and avatars.
#[derive(Debug, Clone, Deserialize)]
pub struct FileServer {
    pub url: String,
}

/// An uploaded file.
#[derive(Debug, Clone, Deserialize)]
pub struct File {
    #[serde(rename = "_id")]
    pub id: String,
    /// Bucket the file lives in (`attachments`, `avatars`, ...).
    pub tag: String,
    #[serde(default)]
    pub filename: Option<String>,
}

impl File {
    pub fn url(&self, file_server: &str) -> String {
        format!("{}/{}/{}", file_server.trim_end_matches('/'), self.tag, self.id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<File>,
}

impl User {
    /// Display name, falling back to the username.
    pub fn name(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.username)
    }
}

/// Server member data attached to a message.
#[derive(Debug, Clone, Deserialize)]
pub struct Member {
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub avatar: Option<File>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Masquerade {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    #[serde(rename = "_id")]
    pub id: String,
    pub channel: String,
    pub author: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub attachments: Vec<File>,
    /// Ids of the messages this one replies to.
    #[serde(default)]
    pub replies: Vec<String>,
    #[serde(default)]
    pub masquerade: Option<Masquerade>,
    /// Author, when the event embeds it.
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub member: Option<Member>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Channel {
    #[serde(rename = "_id")]
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Emoji {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Reply {
    pub id: String,
    pub mention: bool,
}

/// Body of `POST /channels/{id}/messages`.
#[derive(Debug, Clone, Serialize, Default)]
pub struct SendMessage {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub masquerade: Option<Masquerade>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<Reply>,
}

/// Frames sent to the events websocket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    Authenticate { token: String },
    Ping { data: u64 },
}

/// Frames received from the events websocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerFrame {
    Authenticated,
    Ready,
    Message(Message),
    MessageDelete { id: String, channel: String },
    Pong,
    Error { error: String },
    #[serde(other)]
    Other,
}
