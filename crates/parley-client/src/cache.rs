use std::collections::HashMap;

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use parley_types::models::{ChatSummary, MessageEnvelope, UserSummary, new_temp_id};

/// Observed page size of the history endpoint.
pub const PAGE_SIZE: usize = 15;

/// Handle to an optimistic entry, kept by the send path so the REST
/// outcome can confirm or roll it back.
#[derive(Debug, Clone)]
pub struct OptimisticHandle {
    pub temp_id: String,
    /// Idempotency key attached to the REST create request and echoed on
    /// the canonical envelope; primary merge key for reconciliation.
    pub client_key: String,
}

/// Ordered, deduplicated, paginated view of one chat's messages, merged
/// from three racing streams: the local optimistic copy, the REST
/// confirmation, and the socket-delivered copy. Whichever of the latter
/// two arrives first replaces the optimistic entry; the loser becomes a
/// no-op. Exactly one entry survives per logical message.
#[derive(Debug, Default)]
pub struct ChatThread {
    /// Ascending by creation timestamp for display.
    messages: Vec<MessageEnvelope>,
    fetch_in_flight: bool,
    end_of_history: bool,
    next_page: u32,
    page_size: usize,
}

impl ChatThread {
    pub fn new() -> Self {
        Self::with_page_size(PAGE_SIZE)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            messages: Vec::new(),
            fetch_in_flight: false,
            end_of_history: false,
            next_page: 1,
            page_size,
        }
    }

    pub fn messages(&self) -> &[MessageEnvelope] {
        &self.messages
    }

    pub fn end_of_history(&self) -> bool {
        self.end_of_history
    }

    /// Append a speculative entry at the tail so the sender sees their
    /// message immediately, before the REST round trip completes.
    pub fn push_optimistic(
        &mut self,
        content: &str,
        sender: UserSummary,
        chat: ChatSummary,
    ) -> OptimisticHandle {
        let handle = OptimisticHandle {
            temp_id: new_temp_id(),
            client_key: Uuid::new_v4().to_string(),
        };
        self.messages.push(MessageEnvelope {
            id: handle.temp_id.clone(),
            content: content.to_string(),
            sender,
            chat,
            client_key: Some(handle.client_key.clone()),
            created_at: Utc::now(),
        });
        handle
    }

    /// Merge the REST confirmation of a send. If the socket copy already
    /// replaced the optimistic entry this collapses to a no-op.
    pub fn confirm(&mut self, key: &str, canonical: MessageEnvelope) {
        if let Some(pos) = self.position_by_key(key) {
            self.messages[pos] = canonical;
            return;
        }
        if self.contains_id(&canonical.id) {
            return;
        }
        if let Some(pos) = self.newest_optimistic_with_content(&canonical.content) {
            self.messages[pos] = canonical;
            return;
        }
        self.messages.push(canonical);
    }

    /// Merge a socket-delivered copy. Idempotent on the canonical id;
    /// otherwise replaces a matching optimistic entry (by echoed client
    /// key, then by content against the newest optimistic copy), else
    /// appends as a genuinely new message.
    pub fn apply_socket(&mut self, incoming: MessageEnvelope) {
        if self.contains_id(&incoming.id) {
            return;
        }
        if let Some(key) = incoming.client_key.as_deref() {
            if let Some(pos) = self.position_by_key(key) {
                self.messages[pos] = incoming;
                return;
            }
        }
        if let Some(pos) = self.newest_optimistic_with_content(&incoming.content) {
            if self.messages[pos].sender.id == incoming.sender.id {
                self.messages[pos] = incoming;
                return;
            }
        }
        self.messages.push(incoming);
    }

    /// Remove an optimistic entry whose REST create failed. It must not
    /// linger as a phantom message.
    pub fn rollback(&mut self, key: &str) {
        if let Some(pos) = self.position_by_key(key) {
            let removed = self.messages.remove(pos);
            debug!("rolled back unconfirmed message {}", removed.id);
        }
    }

    /// Gate for "load more": false while a fetch for this chat is already
    /// in flight or history is exhausted. Pair with [`complete_fetch`] or
    /// [`abort_fetch`].
    ///
    /// [`complete_fetch`]: ChatThread::complete_fetch
    /// [`abort_fetch`]: ChatThread::abort_fetch
    pub fn begin_fetch(&mut self) -> Option<u32> {
        if self.fetch_in_flight || self.end_of_history {
            return None;
        }
        self.fetch_in_flight = true;
        Some(self.next_page)
    }

    /// Prepend an older page of history. The page is sorted internally,
    /// then spliced at the front of the ascending sequence; the existing
    /// tail is never re-sorted. A short page marks end-of-history.
    pub fn complete_fetch(&mut self, mut page: Vec<MessageEnvelope>) {
        self.fetch_in_flight = false;
        if page.len() < self.page_size {
            self.end_of_history = true;
        }
        self.next_page += 1;

        page.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        page.retain(|m| !self.contains_id(&m.id));
        self.messages.splice(0..0, page);
    }

    pub fn abort_fetch(&mut self) {
        self.fetch_in_flight = false;
    }

    fn contains_id(&self, id: &str) -> bool {
        self.messages.iter().any(|m| m.id == id)
    }

    fn position_by_key(&self, key: &str) -> Option<usize> {
        self.messages
            .iter()
            .position(|m| m.is_optimistic() && m.client_key.as_deref() == Some(key))
    }

    /// Content fallback for envelopes lacking an echoed client key. The
    /// newest optimistic entry wins so two quick identical sends collapse
    /// against the right copy.
    fn newest_optimistic_with_content(&self, content: &str) -> Option<usize> {
        self.messages
            .iter()
            .rposition(|m| m.is_optimistic() && m.content == content)
    }
}

/// Per-chat thread cache for the whole client session.
#[derive(Debug, Default)]
pub struct MessageCache {
    threads: HashMap<String, ChatThread>,
}

impl MessageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn thread_mut(&mut self, chat_id: &str) -> &mut ChatThread {
        self.threads.entry(chat_id.to_string()).or_default()
    }

    pub fn thread(&self, chat_id: &str) -> Option<&ChatThread> {
        self.threads.get(chat_id)
    }

    /// Route a socket-delivered message into the right thread. Chats the
    /// user never opened are skipped; history is fetched on open instead.
    pub fn apply_message_received(&mut self, envelope: MessageEnvelope) {
        if let Some(thread) = self.threads.get_mut(&envelope.chat.id) {
            thread.apply_socket(envelope);
        }
    }

    /// Drop a chat's local view, e.g. after being removed from a group.
    pub fn evict(&mut self, chat_id: &str) {
        self.threads.remove(chat_id);
    }
}
