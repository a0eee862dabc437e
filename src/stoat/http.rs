//! Stoat REST client.

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::common::error::{PlatformError, PlatformResult};
use crate::stoat::models::{Channel, Emoji, Message, NodeInfo, SendMessage, User};

const TOKEN_HEADER: &str = "x-bot-token";

#[derive(Debug, Clone)]
pub struct StoatHttp {
    client: Client,
    base_url: String,
    token: String,
}

impl StoatHttp {
    pub fn new(client: Client, base_url: &str, token: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    pub async fn node_info(&self) -> PlatformResult<NodeInfo> {
        let response = self.client.get(format!("{}/", self.base_url)).send().await?;
        decode(check(response).await?).await
    }

    pub async fn current_user(&self) -> PlatformResult<User> {
        self.get("/users/@me").await
    }

    /// `Ok(None)` when the user does not exist.
    pub async fn user(&self, user_id: &str) -> PlatformResult<Option<User>> {
        found(self.get(&format!("/users/{}", user_id)).await)
    }

    /// `Ok(None)` when the emoji does not exist.
    pub async fn emoji(&self, emoji_id: &str) -> PlatformResult<Option<Emoji>> {
        found(self.get(&format!("/custom/emoji/{}", emoji_id)).await)
    }

    /// Open (or fetch the existing) direct message channel with a user.
    pub async fn open_dm(&self, user_id: &str) -> PlatformResult<Channel> {
        self.get(&format!("/users/{}/dm", user_id)).await
    }

    pub async fn send_message(&self, channel_id: &str, body: &SendMessage) -> PlatformResult<Message> {
        let request = self
            .request(Method::POST, &format!("/channels/{}/messages", channel_id))
            .json(body);
        decode(check(request.send().await?).await?).await
    }

    pub async fn message(&self, channel_id: &str, message_id: &str) -> PlatformResult<Message> {
        self.get(&format!("/channels/{}/messages/{}", channel_id, message_id))
            .await
    }

    pub async fn delete_message(&self, channel_id: &str, message_id: &str) -> PlatformResult<()> {
        let path = format!("/channels/{}/messages/{}", channel_id, message_id);
        let response = self.request(Method::DELETE, &path).send().await?;
        check(response).await?;
        Ok(())
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> PlatformResult<T> {
        let response = self.request(Method::GET, path).send().await?;
        decode(check(response).await?).await
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        debug!(method = %method, path = path, "Stoat request");
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header(TOKEN_HEADER, &self.token)
    }
}

async fn check(response: Response) -> PlatformResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(PlatformError::AlreadyGone);
    }
    let body = response.text().await.unwrap_or_default();
    Err(PlatformError::Rejected {
        status: status.as_u16(),
        body: body.chars().take(200).collect(),
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> PlatformResult<T> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| PlatformError::Decode {
        message: e.to_string(),
    })
}

fn found<T>(result: PlatformResult<T>) -> PlatformResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(PlatformError::AlreadyGone) => Ok(None),
        Err(e) => Err(e),
    }
}
