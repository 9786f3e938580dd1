use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::debug;
use uuid::Uuid;

use parley_types::events::SocketEvent;

/// Identifies one transport connection. A user with several devices holds
/// several sessions, all members of the same personal room.
pub type SessionId = Uuid;

/// A logical broadcast group: the personal inbox room of a user, or the
/// room of a chat currently being viewed. Rooms are pure addressing over
/// live sessions, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoomId {
    User(String),
    Chat(String),
}

struct SessionEntry {
    tx: mpsc::UnboundedSender<SocketEvent>,
    user_id: Option<String>,
    rooms: HashSet<RoomId>,
}

struct RegistryInner {
    sessions: HashMap<SessionId, SessionEntry>,
    rooms: HashMap<RoomId, HashSet<SessionId>>,
}

/// Tracks which sessions belong to which rooms. The room maps are the only
/// shared mutable state in the relay and are mutated exclusively through
/// the operations below.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(RegistryInner {
                sessions: HashMap::new(),
                rooms: HashMap::new(),
            })),
        }
    }

    /// Create a session on transport connect. Returns the session id and
    /// the receiver the connection loop drains toward the socket.
    pub async fn connect(&self) -> (SessionId, mpsc::UnboundedReceiver<SocketEvent>) {
        let session = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.write().await.sessions.insert(
            session,
            SessionEntry {
                tx,
                user_id: None,
                rooms: HashSet::new(),
            },
        );
        (session, rx)
    }

    /// Bind a session to its personal room after the `setup` handshake.
    /// Idempotent: re-registering the same id is a no-op.
    pub async fn register(&self, session: SessionId, user_id: &str) {
        {
            let inner = self.inner.read().await;
            match inner.sessions.get(&session) {
                Some(entry) if entry.user_id.as_deref() == Some(user_id) => return,
                Some(_) => {}
                None => return,
            }
        }
        let mut inner = self.inner.write().await;
        if let Some(entry) = inner.sessions.get_mut(&session) {
            entry.user_id = Some(user_id.to_string());
        }
        drop(inner);
        self.join_room(session, RoomId::User(user_id.to_string())).await;
    }

    /// Add a session to a room. Membership is a set: joining twice leaves
    /// the room unchanged. No other member is notified.
    pub async fn join_room(&self, session: SessionId, room: RoomId) {
        let mut inner = self.inner.write().await;
        if let Some(entry) = inner.sessions.get_mut(&session) {
            if !entry.rooms.insert(room.clone()) {
                return;
            }
        } else {
            return;
        }
        inner.rooms.entry(room).or_default().insert(session);
    }

    /// Remove a session from every room it joined and drop it. Called on
    /// disconnect; skipping it leaks dangling room members but broadcast
    /// to a dead session is already a silent no-op.
    pub async fn leave_all(&self, session: SessionId) {
        let mut inner = self.inner.write().await;
        let Some(entry) = inner.sessions.remove(&session) else {
            return;
        };
        for room in entry.rooms {
            if let Some(members) = inner.rooms.get_mut(&room) {
                members.remove(&session);
                if members.is_empty() {
                    inner.rooms.remove(&room);
                }
            }
        }
        debug!("session {} left all rooms", session);
    }

    /// Deliver an event to every live member of a room, except the
    /// optionally excluded session. An empty or unknown room is a no-op,
    /// not an error: rooms legitimately go empty when everyone is offline.
    pub async fn broadcast(&self, room: &RoomId, event: SocketEvent, exclude: Option<SessionId>) {
        let inner = self.inner.read().await;
        let Some(members) = inner.rooms.get(room) else {
            return;
        };
        for member in members {
            if Some(*member) == exclude {
                continue;
            }
            if let Some(entry) = inner.sessions.get(member) {
                // Receiver side gone means the connection is tearing down.
                let _ = entry.tx.send(event.clone());
            }
        }
    }

    /// Deliver an event to a single session (used for the `connected` ack).
    pub async fn send_to_session(&self, session: SessionId, event: SocketEvent) {
        let inner = self.inner.read().await;
        if let Some(entry) = inner.sessions.get(&session) {
            let _ = entry.tx.send(event);
        }
    }

    /// Current member count of a room. Zero for unknown rooms.
    pub async fn room_len(&self, room: &RoomId) -> usize {
        self.inner
            .read()
            .await
            .rooms
            .get(room)
            .map(|m| m.len())
            .unwrap_or(0)
    }

    /// The user id a session registered with, if the handshake happened.
    pub async fn user_of(&self, session: SessionId) -> Option<String> {
        self.inner
            .read()
            .await
            .sessions
            .get(&session)
            .and_then(|e| e.user_id.clone())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn drain(rx: &mut UnboundedReceiver<SocketEvent>) -> Vec<SocketEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    #[tokio::test]
    async fn broadcast_reaches_only_room_members() {
        let registry = Registry::new();
        let (s1, mut rx1) = registry.connect().await;
        let (s2, mut rx2) = registry.connect().await;
        let (_s3, mut rx3) = registry.connect().await;

        registry.join_room(s1, RoomId::Chat("c1".into())).await;
        registry.join_room(s2, RoomId::Chat("c1".into())).await;

        registry
            .broadcast(&RoomId::Chat("c1".into()), SocketEvent::Connected, None)
            .await;

        assert_eq!(drain(&mut rx1).len(), 1);
        assert_eq!(drain(&mut rx2).len(), 1);
        assert!(drain(&mut rx3).is_empty());
    }

    #[tokio::test]
    async fn join_is_idempotent() {
        let registry = Registry::new();
        let (s1, _rx) = registry.connect().await;

        registry.join_room(s1, RoomId::Chat("c1".into())).await;
        registry.join_room(s1, RoomId::Chat("c1".into())).await;

        assert_eq!(registry.room_len(&RoomId::Chat("c1".into())).await, 1);
    }

    #[tokio::test]
    async fn register_is_idempotent_and_joins_personal_room() {
        let registry = Registry::new();
        let (s1, _rx) = registry.connect().await;

        registry.register(s1, "u1").await;
        registry.register(s1, "u1").await;

        assert_eq!(registry.room_len(&RoomId::User("u1".into())).await, 1);
        assert_eq!(registry.user_of(s1).await.as_deref(), Some("u1"));
    }

    #[tokio::test]
    async fn two_devices_share_a_personal_room() {
        let registry = Registry::new();
        let (tab1, mut rx1) = registry.connect().await;
        let (tab2, mut rx2) = registry.connect().await;

        registry.register(tab1, "u1").await;
        registry.register(tab2, "u1").await;

        registry
            .broadcast(&RoomId::User("u1".into()), SocketEvent::Connected, None)
            .await;

        // Each connected device receives exactly one copy.
        assert_eq!(drain(&mut rx1).len(), 1);
        assert_eq!(drain(&mut rx2).len(), 1);
    }

    #[tokio::test]
    async fn broadcast_excludes_the_originator() {
        let registry = Registry::new();
        let (s1, mut rx1) = registry.connect().await;
        let (s2, mut rx2) = registry.connect().await;
        registry.join_room(s1, RoomId::Chat("c1".into())).await;
        registry.join_room(s2, RoomId::Chat("c1".into())).await;

        registry
            .broadcast(&RoomId::Chat("c1".into()), SocketEvent::Connected, Some(s1))
            .await;

        assert!(drain(&mut rx1).is_empty());
        assert_eq!(drain(&mut rx2).len(), 1);
    }

    #[tokio::test]
    async fn empty_room_broadcast_is_a_noop() {
        let registry = Registry::new();
        registry
            .broadcast(&RoomId::Chat("ghost".into()), SocketEvent::Connected, None)
            .await;
    }

    #[tokio::test]
    async fn leave_all_clears_memberships() {
        let registry = Registry::new();
        let (s1, mut rx1) = registry.connect().await;
        registry.register(s1, "u1").await;
        registry.join_room(s1, RoomId::Chat("c1".into())).await;

        registry.leave_all(s1).await;

        assert_eq!(registry.room_len(&RoomId::User("u1".into())).await, 0);
        assert_eq!(registry.room_len(&RoomId::Chat("c1".into())).await, 0);

        registry
            .broadcast(&RoomId::Chat("c1".into()), SocketEvent::Connected, None)
            .await;
        assert!(drain(&mut rx1).is_empty());
    }
}
