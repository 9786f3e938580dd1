use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix reserved for client-generated optimistic message ids. The document
/// store never assigns ids with this prefix, so an entry carrying it is
/// always a speculative local copy awaiting confirmation.
pub const TEMP_ID_PREFIX: &str = "temp-";

/// A user as embedded in wire payloads (sender expansion, chat member lists).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

/// A chat as embedded in a message envelope, including its member list.
/// The member list is what the fan-out relay walks to address personal rooms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub is_group: bool,
    pub users: Vec<UserSummary>,
}

/// The canonical message record as returned by the REST layer and relayed
/// over the socket. A server-persisted envelope always carries a
/// store-assigned id; only client-local optimistic copies use a `temp-` id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEnvelope {
    #[serde(rename = "_id")]
    pub id: String,
    pub content: String,
    pub sender: UserSummary,
    pub chat: ChatSummary,
    /// Client-generated idempotency key, attached to the REST create request
    /// and echoed back in the canonical record. Primary merge key when
    /// reconciling an optimistic entry with its confirmed copy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl MessageEnvelope {
    /// True if this entry is a local speculative copy (never persisted).
    pub fn is_optimistic(&self) -> bool {
        self.id.starts_with(TEMP_ID_PREFIX)
    }
}

/// Mint an id for an optimistic message, distinguishable from any
/// store-assigned id by its reserved prefix.
pub fn new_temp_id() -> String {
    format!("{}{}", TEMP_ID_PREFIX, Uuid::new_v4())
}
