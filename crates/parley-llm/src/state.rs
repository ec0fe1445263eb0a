use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::history::{History, DEFAULT_MAX_HISTORY};
use crate::types::Message;

/// Serializable snapshot of one provider adapter
///
/// This is what survives between requests: the window size and the turns
/// currently inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderState {
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    #[serde(default, rename = "conversation_history")]
    pub history: Vec<Message>,
}

fn default_max_history() -> usize {
    DEFAULT_MAX_HISTORY
}

impl ProviderState {
    /// State of a freshly constructed adapter
    pub fn empty(max_history: usize) -> Self {
        Self {
            max_history,
            history: Vec::new(),
        }
    }
}

impl Default for ProviderState {
    fn default() -> Self {
        Self::empty(DEFAULT_MAX_HISTORY)
    }
}

impl From<&History> for ProviderState {
    fn from(history: &History) -> Self {
        Self {
            max_history: history.max_history(),
            history: history.snapshot().to_vec(),
        }
    }
}

impl From<ProviderState> for History {
    fn from(state: ProviderState) -> Self {
        History::from_messages(state.max_history, state.history)
    }
}

/// Per-browser-session mapping from provider name to its saved state
///
/// Handlers load this value at request start, hand it to the dispatcher and
/// write back whatever the dispatcher returns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionState {
    providers: HashMap<String, ProviderState>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, provider: &str) -> Option<&ProviderState> {
        self.providers.get(provider)
    }

    pub fn contains(&self, provider: &str) -> bool {
        self.providers.contains_key(provider)
    }

    pub fn insert(&mut self, provider: impl Into<String>, state: ProviderState) {
        self.providers.insert(provider.into(), state);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ProviderState)> {
        self.providers.iter()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
