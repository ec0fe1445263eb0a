use crate::types::{Message, Role};

/// Number of turns kept when no explicit cap is configured
pub const DEFAULT_MAX_HISTORY: usize = 10;

/// Bounded conversation history (sliding window over the most recent turns)
///
/// Eviction is FIFO by count: after every append the oldest entries are
/// dropped until at most `max_history` remain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History {
    max_history: usize,
    messages: Vec<Message>,
}

impl History {
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history,
            messages: Vec::new(),
        }
    }

    /// Rebuild a history from stored turns, keeping only the newest `max_history`
    pub fn from_messages(max_history: usize, messages: Vec<Message>) -> Self {
        let mut history = Self {
            max_history,
            messages,
        };
        history.evict();
        history
    }

    pub fn append(&mut self, role: Role, content: impl Into<String>) {
        self.push(Message::new(role, content));
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.evict();
    }

    /// Current turns, oldest first
    pub fn snapshot(&self) -> &[Message] {
        &self.messages
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    fn evict(&mut self) {
        if self.messages.len() > self.max_history {
            let excess = self.messages.len() - self.max_history;
            self.messages.drain(..excess);
        }
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}
