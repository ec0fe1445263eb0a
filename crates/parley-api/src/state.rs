use std::sync::Arc;

use parley_llm::ProviderFactory;

use crate::config::Config;
use crate::session::SessionStore;

/// Shared application state passed to all handlers
///
/// The factory holds one vendor client per configured provider, built once
/// at startup. Per-user data lives in the session store.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub factory: Arc<ProviderFactory>,
    pub sessions: Arc<dyn SessionStore>,
}

impl AppState {
    pub fn new(config: Config, factory: ProviderFactory, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            config: Arc::new(config),
            factory: Arc::new(factory),
            sessions,
        }
    }
}
