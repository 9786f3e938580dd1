use async_trait::async_trait;
use tracing::debug;

use parley_types::api::{ApiEnvelope, MessagePage, SendMessageRequest};
use parley_types::models::MessageEnvelope;

use crate::error::ClientError;

/// REST boundary the realtime core depends on. The full resource layer
/// (chats, users, notifications) lives behind this seam; the core only
/// needs message create and history pagination.
#[async_trait]
pub trait MessageApi: Send + Sync {
    /// `POST /chats/:chatId/messages`. The client key is echoed back on
    /// the returned canonical envelope.
    async fn send_message(
        &self,
        chat_id: &str,
        content: &str,
        client_key: &str,
    ) -> Result<MessageEnvelope, ClientError>;

    /// `GET /chats/:chatId/messages?page&limit`, newest-relevant page
    /// first; callers prepend older pages as the user scrolls up.
    async fn fetch_messages(
        &self,
        chat_id: &str,
        page: u32,
        limit: usize,
    ) -> Result<MessagePage, ClientError>;
}

/// reqwest-backed implementation speaking the `{status, data}` envelope
/// with bearer-token auth.
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl MessageApi for RestClient {
    async fn send_message(
        &self,
        chat_id: &str,
        content: &str,
        client_key: &str,
    ) -> Result<MessageEnvelope, ClientError> {
        let url = format!("{}/chats/{}/messages", self.base_url, chat_id);
        let body = SendMessageRequest {
            content: content.to_string(),
            client_key: client_key.to_string(),
        };
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::Rejected(format!(
                "message create returned {}",
                response.status()
            )));
        }

        let envelope: ApiEnvelope<MessageEnvelope> = response.json().await?;
        if !envelope.is_success() {
            return Err(ClientError::Rejected(envelope.status));
        }
        debug!("message persisted as {}", envelope.data.id);
        Ok(envelope.data)
    }

    async fn fetch_messages(
        &self,
        chat_id: &str,
        page: u32,
        limit: usize,
    ) -> Result<MessagePage, ClientError> {
        let url = format!("{}/chats/{}/messages", self.base_url, chat_id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[("page", page.to_string()), ("limit", limit.to_string())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::Rejected(format!(
                "history fetch returned {}",
                response.status()
            )));
        }

        let envelope: ApiEnvelope<MessagePage> = response.json().await?;
        if !envelope.is_success() {
            return Err(ClientError::Rejected(envelope.status));
        }
        Ok(envelope.data)
    }
}
