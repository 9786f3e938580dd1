use std::sync::Arc;

use tracing::{debug, warn};

use parley_types::events::{SocketCommand, SocketEvent};
use parley_types::models::{ChatSummary, MessageEnvelope};

use crate::directory::UserDirectory;
use crate::registry::{Registry, RoomId, SessionId};

/// Name used when a typing event carries no usable display name and the
/// directory lookup comes up empty.
const FALLBACK_DISPLAY_NAME: &str = "Someone";

/// Event relay over the session registry: typing/presence signals, message
/// fan-out, and group membership fan-out. Holds no per-chat state of its
/// own; all addressing goes through the registry's rooms.
#[derive(Clone)]
pub struct Relay {
    registry: Registry,
    directory: Arc<dyn UserDirectory>,
}

impl Relay {
    pub fn new(registry: Registry, directory: Arc<dyn UserDirectory>) -> Self {
        Self {
            registry,
            directory,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Dispatch one inbound command. Malformed or incomplete payloads are
    /// logged and skipped; a bad event from one session must never take
    /// down the loop or affect other sessions.
    pub async fn handle_command(&self, session: SessionId, cmd: SocketCommand) {
        match cmd {
            SocketCommand::Setup { id } => {
                if id.is_empty() {
                    warn!("session {} sent setup without a user id", session);
                    return;
                }
                self.registry.register(session, &id).await;
                self.registry
                    .send_to_session(session, SocketEvent::Connected)
                    .await;
                debug!("session {} set up as user {}", session, id);
            }

            SocketCommand::JoinChat(chat_id) => {
                self.registry
                    .join_room(session, RoomId::Chat(chat_id))
                    .await;
            }

            SocketCommand::Typing {
                chat_id,
                user_id,
                user_name,
            } => {
                // A user may type before ever opening the room explicitly.
                self.ensure_joined(session, &chat_id).await;
                let user_name = self.resolve_display_name(&user_id, &user_name).await;
                self.registry
                    .broadcast(
                        &RoomId::Chat(chat_id.clone()),
                        SocketEvent::Typing {
                            chat_id,
                            user_id,
                            user_name,
                        },
                        None,
                    )
                    .await;
            }

            SocketCommand::StopTyping { chat_id, user_id } => {
                self.ensure_joined(session, &chat_id).await;
                self.registry
                    .broadcast(
                        &RoomId::Chat(chat_id.clone()),
                        SocketEvent::StopTyping { chat_id, user_id },
                        None,
                    )
                    .await;
            }

            SocketCommand::NewMessage(envelope) => {
                self.fan_out_message(session, envelope).await;
            }

            SocketCommand::GroupRename { chat, user_id } => {
                self.fan_out_group(&chat, &user_id, |chat, user_id| {
                    SocketEvent::GroupRename { chat, user_id }
                })
                .await;
            }

            SocketCommand::GroupAdd { chat, user_id } => {
                self.fan_out_group(&chat, &user_id, |chat, user_id| SocketEvent::GroupAdd {
                    chat,
                    user_id,
                })
                .await;
            }

            SocketCommand::GroupRemove {
                chat,
                user_id,
                removed_user,
            } => {
                let event = SocketEvent::GroupRemove {
                    chat: chat.clone(),
                    user_id: user_id.clone(),
                    removed_user: removed_user.clone(),
                };
                for member in &chat.users {
                    if member.id == user_id {
                        continue;
                    }
                    self.registry
                        .broadcast(&RoomId::User(member.id.clone()), event.clone(), None)
                        .await;
                }
                // The removed user is no longer in chat.users but still
                // needs the event to evict the chat from their view.
                if removed_user != user_id && !chat.users.iter().any(|u| u.id == removed_user) {
                    self.registry
                        .broadcast(&RoomId::User(removed_user), event, None)
                        .await;
                }
            }
        }
    }

    /// Join a chat room if not already a member. Membership is a set, so
    /// this is safe to call on every typing event.
    async fn ensure_joined(&self, session: SessionId, chat_id: &str) {
        self.registry
            .join_room(session, RoomId::Chat(chat_id.to_string()))
            .await;
    }

    /// Deliver a persisted message to every other participant's personal
    /// room, and to the chat room for sessions actively viewing it. The
    /// relay never deduplicates; receivers collapse duplicate copies.
    async fn fan_out_message(&self, session: SessionId, envelope: MessageEnvelope) {
        if envelope.chat.users.is_empty() {
            warn!(
                "new message {} has no chat.users, skipping fan-out",
                envelope.id
            );
            return;
        }
        if envelope.is_optimistic() {
            warn!(
                "refusing to fan out unpersisted message id {}",
                envelope.id
            );
            return;
        }

        let sender_id = envelope.sender.id.clone();
        for member in &envelope.chat.users {
            if member.id == sender_id {
                continue;
            }
            self.registry
                .broadcast(
                    &RoomId::User(member.id.clone()),
                    SocketEvent::MessageReceived(envelope.clone()),
                    None,
                )
                .await;
        }

        // Sessions viewing the chat without a personal-room setup still
        // get the message; the sending session already has local state.
        self.registry
            .broadcast(
                &RoomId::Chat(envelope.chat.id.clone()),
                SocketEvent::MessageReceived(envelope),
                Some(session),
            )
            .await;
    }

    /// Membership-change fan-out shared by rename and add: every member of
    /// the updated chat except the actor gets the event in their personal
    /// room. A newly added user is covered by the standard walk since the
    /// chat payload already reflects the updated member list.
    async fn fan_out_group<F>(&self, chat: &ChatSummary, actor_id: &str, build: F)
    where
        F: Fn(ChatSummary, String) -> SocketEvent,
    {
        if chat.users.is_empty() {
            warn!("group event for chat {} has no users, skipping", chat.id);
            return;
        }
        for member in &chat.users {
            if member.id == actor_id {
                continue;
            }
            self.registry
                .broadcast(
                    &RoomId::User(member.id.clone()),
                    build(chat.clone(), actor_id.to_string()),
                    None,
                )
                .await;
        }
    }

    async fn resolve_display_name(&self, user_id: &str, supplied: &str) -> String {
        match self.directory.display_name(user_id).await {
            Ok(Some(name)) => name,
            Ok(None) => fallback_name(supplied),
            Err(e) => {
                warn!("display name lookup failed for {}: {}", user_id, e);
                fallback_name(supplied)
            }
        }
    }
}

fn fallback_name(supplied: &str) -> String {
    if supplied.trim().is_empty() {
        FALLBACK_DISPLAY_NAME.to_string()
    } else {
        supplied.to_string()
    }
}
