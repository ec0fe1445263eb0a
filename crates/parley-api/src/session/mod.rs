//! Server-side session storage
//!
//! The browser only carries an opaque id in a cookie; provider states live
//! behind a [`SessionStore`].

mod memory;

pub use memory::MemorySessionStore;

use anyhow::Result;
use async_trait::async_trait;
use parley_llm::{ProviderState, SessionState};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque session identifier carried in the session cookie
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Mint a fresh id and register it as a live session
    async fn create(&self) -> Result<SessionId>;

    /// Whether `id` was issued by this store and has not expired
    async fn exists(&self, id: &SessionId) -> Result<bool>;

    /// Provider states saved for `id`; empty for unknown or expired sessions
    async fn load(&self, id: &SessionId) -> Result<SessionState>;

    /// Replace the state of one provider, creating the session if needed
    async fn save_provider(&self, id: &SessionId, provider: &str, state: ProviderState) -> Result<()>;
}
