use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parley_llm::{ProviderState, SessionState};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{SessionId, SessionStore};

struct Entry {
    state: SessionState,
    last_seen: DateTime<Utc>,
}

/// Process-local session store with idle expiry
///
/// Expired sessions read as empty immediately and are physically removed on
/// the next write.
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Entry>>,
    idle_timeout: Duration,
}

impl MemorySessionStore {
    pub fn new(idle_timeout: std::time::Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_timeout: Duration::from_std(idle_timeout).unwrap_or_else(|_| Duration::days(365)),
        }
    }

    /// Number of sessions currently held, expired ones included
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    fn is_expired(&self, entry: &Entry, now: DateTime<Utc>) -> bool {
        now - entry.last_seen > self.idle_timeout
    }

    fn sweep(&self, sessions: &mut HashMap<SessionId, Entry>, now: DateTime<Utc>) {
        let before = sessions.len();
        sessions.retain(|_, entry| !self.is_expired(entry, now));
        if sessions.len() < before {
            tracing::debug!(removed = before - sessions.len(), "Swept expired sessions");
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self) -> Result<SessionId> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        self.sweep(&mut sessions, now);

        let id = SessionId::new();
        sessions.insert(
            id,
            Entry {
                state: SessionState::new(),
                last_seen: now,
            },
        );

        Ok(id)
    }

    async fn exists(&self, id: &SessionId) -> Result<bool> {
        let now = Utc::now();
        let sessions = self.sessions.read().await;

        Ok(sessions.get(id).is_some_and(|entry| !self.is_expired(entry, now)))
    }

    async fn load(&self, id: &SessionId) -> Result<SessionState> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;

        let Some(entry) = sessions.get_mut(id) else {
            return Ok(SessionState::new());
        };

        if self.is_expired(entry, now) {
            tracing::debug!(session = %id, "Session expired");
            sessions.remove(id);
            return Ok(SessionState::new());
        }

        entry.last_seen = now;
        Ok(entry.state.clone())
    }

    async fn save_provider(&self, id: &SessionId, provider: &str, state: ProviderState) -> Result<()> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        self.sweep(&mut sessions, now);

        let entry = sessions.entry(*id).or_insert_with(|| Entry {
            state: SessionState::new(),
            last_seen: now,
        });
        entry.state.insert(provider, state);
        entry.last_seen = now;

        Ok(())
    }
}
