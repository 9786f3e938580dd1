use serde::{Deserialize, Serialize};

use crate::models::{ChatSummary, MessageEnvelope};

/// Commands sent FROM client TO server over the socket.
///
/// Wire names match the original event vocabulary (`setup`, `isTyping`,
/// `new message`, ...) so payloads stay readable in transport captures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum SocketCommand {
    /// Bind this session to the personal room named by the user id.
    /// The server replies with `connected`.
    #[serde(rename = "setup")]
    Setup { id: String },

    /// Join the room for a chat the client is now viewing.
    #[serde(rename = "join chat")]
    JoinChat(String),

    /// Advisory typing signal for a chat.
    #[serde(rename = "isTyping")]
    #[serde(rename_all = "camelCase")]
    Typing {
        chat_id: String,
        user_id: String,
        user_name: String,
    },

    #[serde(rename = "stop typing")]
    #[serde(rename_all = "camelCase")]
    StopTyping { chat_id: String, user_id: String },

    /// A message that was just persisted via REST; triggers fan-out.
    #[serde(rename = "new message")]
    NewMessage(MessageEnvelope),

    /// Group membership changes completed via REST, mirrored to peers.
    /// `user_id` is the acting user, excluded from the fan-out.
    #[serde(rename = "group rename")]
    #[serde(rename_all = "camelCase")]
    GroupRename { chat: ChatSummary, user_id: String },

    #[serde(rename = "group add")]
    #[serde(rename_all = "camelCase")]
    GroupAdd { chat: ChatSummary, user_id: String },

    /// `removed_user` is notified directly even though they no longer
    /// appear in `chat.users`, so their client can evict the chat.
    #[serde(rename = "group remove")]
    #[serde(rename_all = "camelCase")]
    GroupRemove {
        chat: ChatSummary,
        user_id: String,
        removed_user: String,
    },
}

/// Events sent FROM server TO clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum SocketEvent {
    /// Acknowledges `setup`; the session now receives user-targeted events.
    #[serde(rename = "connected")]
    Connected,

    #[serde(rename = "isTyping")]
    #[serde(rename_all = "camelCase")]
    Typing {
        chat_id: String,
        user_id: String,
        user_name: String,
    },

    #[serde(rename = "stop typing")]
    #[serde(rename_all = "camelCase")]
    StopTyping { chat_id: String, user_id: String },

    #[serde(rename = "message received")]
    MessageReceived(MessageEnvelope),

    #[serde(rename = "group rename")]
    #[serde(rename_all = "camelCase")]
    GroupRename { chat: ChatSummary, user_id: String },

    #[serde(rename = "group add")]
    #[serde(rename_all = "camelCase")]
    GroupAdd { chat: ChatSummary, user_id: String },

    #[serde(rename = "group remove")]
    #[serde(rename_all = "camelCase")]
    GroupRemove {
        chat: ChatSummary,
        user_id: String,
        removed_user: String,
    },
}
