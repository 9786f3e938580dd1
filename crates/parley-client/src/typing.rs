use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Inactivity window after which the sender's typing state self-cancels.
pub const TYPING_TIMEOUT: Duration = Duration::from_millis(3000);

/// Sender-side typing state for one chat. Re-arms on every keystroke; the
/// caller polls it (e.g. from its input loop) and emits `stop typing` when
/// the window lapses. The server tracks nothing.
#[derive(Debug)]
pub struct TypingTimer {
    deadline: Option<Instant>,
    timeout: Duration,
}

impl TypingTimer {
    pub fn new() -> Self {
        Self::with_timeout(TYPING_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: None,
            timeout,
        }
    }

    /// Record a keystroke. Returns true when this transitions idle to
    /// typing, i.e. the caller should emit `isTyping`.
    pub fn keystroke(&mut self, now: Instant) -> bool {
        let was_idle = self.deadline.is_none();
        self.deadline = Some(now + self.timeout);
        was_idle
    }

    /// Check for expiry. Returns true exactly once per lapse, when the
    /// caller should emit `stop typing`.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Explicit stop (message sent, input blurred). Returns true if the
    /// state was typing, i.e. a `stop typing` should be emitted.
    pub fn stop(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    pub fn is_typing(&self) -> bool {
        self.deadline.is_some()
    }
}

impl Default for TypingTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver-side advisory indicator state, keyed by (chat, user). Events
/// are applied in delivery order; a stop with no preceding start is a
/// valid no-op. Entries also age out on read in case a peer's stop event
/// was lost.
#[derive(Debug)]
pub struct TypingIndicators {
    active: HashMap<(String, String), (String, Instant)>,
    ttl: Duration,
}

impl TypingIndicators {
    pub fn new() -> Self {
        Self::with_ttl(TYPING_TIMEOUT)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            active: HashMap::new(),
            ttl,
        }
    }

    pub fn on_typing(&mut self, chat_id: &str, user_id: &str, user_name: &str, now: Instant) {
        self.active.insert(
            (chat_id.to_string(), user_id.to_string()),
            (user_name.to_string(), now + self.ttl),
        );
    }

    pub fn on_stop(&mut self, chat_id: &str, user_id: &str) {
        self.active
            .remove(&(chat_id.to_string(), user_id.to_string()));
    }

    /// Names currently typing in a chat, pruning expired entries.
    pub fn active_in(&mut self, chat_id: &str, now: Instant) -> Vec<String> {
        self.active.retain(|_, (_, expiry)| *expiry > now);
        let mut names: Vec<String> = self
            .active
            .iter()
            .filter(|((chat, _), _)| chat == chat_id)
            .map(|(_, (name, _))| name.clone())
            .collect();
        names.sort();
        names
    }
}

impl Default for TypingIndicators {
    fn default() -> Self {
        Self::new()
    }
}
