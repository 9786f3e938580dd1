use serde::{Deserialize, Serialize};

use crate::models::MessageEnvelope;

/// Standard REST response envelope: `{status, data}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub status: String,
    pub data: T,
}

impl<T> ApiEnvelope<T> {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// Body for `POST /chats/:chatId/messages`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub content: String,
    /// Echoed back as `clientKey` on the canonical envelope.
    pub client_key: String,
}

/// Query for `GET /chats/:chatId/messages?page&limit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageQuery {
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub limit: u32,
}

/// Observed page size of the message history endpoint.
pub fn default_page_size() -> u32 {
    15
}

pub type MessagePage = Vec<MessageEnvelope>;
