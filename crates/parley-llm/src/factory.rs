// Provider registry: maps a provider name to an adapter carrying its vendor client
//
// Vendor clients are built once at startup from the available credentials.
// A vendor without a credential simply has no client, and resolving it fails
// before any network call is attempted.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::anthropic::{AnthropicClient, DEFAULT_MAX_TOKENS};
use crate::error::{LlmError, Result};
use crate::gemini::GeminiClient;
use crate::history::DEFAULT_MAX_HISTORY;
use crate::openai::OpenAIClient;
use crate::provider::LlmProvider;
use crate::state::{ProviderState, SessionState};
use crate::traits::{ChatClient, ChatOptions};

/// The closed set of supported vendors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAI,
    Groq,
    Anthropic,
    Gemini,
    Cerebras,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 5] = [
        ProviderKind::OpenAI,
        ProviderKind::Groq,
        ProviderKind::Anthropic,
        ProviderKind::Gemini,
        ProviderKind::Cerebras,
    ];

    /// Name used in requests and as the session key
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "openai",
            ProviderKind::Groq => "groq",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Cerebras => "cerebras",
        }
    }

    /// Environment variable holding the vendor credential
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "OPENAI_API_KEY",
            ProviderKind::Groq => "GROQ_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
            ProviderKind::Cerebras => "CEREBRAS_API_KEY",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self> {
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| LlmError::UnknownProvider(s.to_string()))
    }
}

/// Everything needed to build the vendor clients
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_keys: HashMap<ProviderKind, String>,
    /// Base URL overrides, mostly for pointing a vendor at a mock server
    pub base_urls: HashMap<ProviderKind, String>,
    pub request_timeout: Option<Duration>,
    pub anthropic_max_tokens: u32,
    pub max_history: usize,
    /// Sampling options applied to every adapter the factory hands out
    pub options: ChatOptions,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_keys: HashMap::new(),
            base_urls: HashMap::new(),
            request_timeout: None,
            anthropic_max_tokens: DEFAULT_MAX_TOKENS,
            max_history: DEFAULT_MAX_HISTORY,
            options: ChatOptions::default(),
        }
    }
}

impl ProviderConfig {
    /// Read credentials from `OPENAI_API_KEY`, `GROQ_API_KEY` and friends
    ///
    /// Unset or blank variables leave the vendor unconfigured.
    pub fn from_env() -> Self {
        let api_keys = ProviderKind::ALL
            .into_iter()
            .filter_map(|kind| {
                std::env::var(kind.api_key_env())
                    .ok()
                    .map(|key| key.trim().to_string())
                    .filter(|key| !key.is_empty())
                    .map(|key| (kind, key))
            })
            .collect();

        Self {
            api_keys,
            ..Self::default()
        }
    }

    pub fn with_api_key(mut self, kind: ProviderKind, api_key: impl Into<String>) -> Self {
        self.api_keys.insert(kind, api_key.into());
        self
    }

    pub fn with_base_url(mut self, kind: ProviderKind, base_url: impl Into<String>) -> Self {
        self.base_urls.insert(kind, base_url.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_anthropic_max_tokens(mut self, max_tokens: u32) -> Self {
        self.anthropic_max_tokens = max_tokens;
        self
    }

    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }
}

/// Resolves provider names to adapters
///
/// Cheap to share behind an `Arc`; the registered clients are reused by
/// every adapter it hands out.
#[derive(Clone)]
pub struct ProviderFactory {
    clients: HashMap<ProviderKind, Arc<dyn ChatClient>>,
    max_history: usize,
    options: ChatOptions,
}

impl ProviderFactory {
    /// Factory with no vendor configured
    pub fn new(max_history: usize) -> Self {
        Self {
            clients: HashMap::new(),
            max_history,
            options: ChatOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    /// Build a client for every vendor that has a credential
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let mut factory = Self::new(config.max_history).with_options(config.options.clone());

        for kind in ProviderKind::ALL {
            let Some(api_key) = config.api_keys.get(&kind) else {
                tracing::warn!(
                    provider = %kind,
                    env = kind.api_key_env(),
                    "No credential found, provider disabled"
                );
                continue;
            };

            let client = Self::create_client(kind, api_key, config)?;
            factory.register(kind, client);
        }

        Ok(factory)
    }

    /// Create the vendor client for `kind`
    pub fn create_client(
        kind: ProviderKind,
        api_key: &str,
        config: &ProviderConfig,
    ) -> Result<Arc<dyn ChatClient>> {
        let base_url = config.base_urls.get(&kind);
        let configuration_error =
            |e: anyhow::Error| LlmError::Configuration(format!("{}: {:#}", kind, e));

        let client: Arc<dyn ChatClient> = match kind {
            ProviderKind::OpenAI | ProviderKind::Groq | ProviderKind::Cerebras => {
                let mut client = match kind {
                    ProviderKind::Groq => OpenAIClient::groq(api_key),
                    ProviderKind::Cerebras => OpenAIClient::cerebras(api_key),
                    _ => OpenAIClient::new(api_key),
                }
                .map_err(configuration_error)?;

                if let Some(url) = base_url {
                    client = client.with_base_url(url.as_str());
                }
                if let Some(timeout) = config.request_timeout {
                    client = client.with_timeout(timeout);
                }
                Arc::new(client)
            }
            ProviderKind::Anthropic => {
                let mut client = AnthropicClient::new(api_key)
                    .map_err(configuration_error)?
                    .with_max_tokens(config.anthropic_max_tokens);

                if let Some(url) = base_url {
                    client = client.with_base_url(url.as_str());
                }
                if let Some(timeout) = config.request_timeout {
                    client = client.with_timeout(timeout);
                }
                Arc::new(client)
            }
            ProviderKind::Gemini => {
                let mut client = GeminiClient::new(api_key).map_err(configuration_error)?;

                if let Some(url) = base_url {
                    client = client.with_base_url(url.as_str());
                }
                if let Some(timeout) = config.request_timeout {
                    client = client.with_timeout(timeout);
                }
                Arc::new(client)
            }
        };

        Ok(client)
    }

    pub fn register(&mut self, kind: ProviderKind, client: Arc<dyn ChatClient>) {
        self.clients.insert(kind, client);
    }

    pub fn with_client(mut self, kind: ProviderKind, client: Arc<dyn ChatClient>) -> Self {
        self.register(kind, client);
        self
    }

    pub fn is_configured(&self, kind: ProviderKind) -> bool {
        self.clients.contains_key(&kind)
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// State of an adapter that has not seen any turn yet
    pub fn fresh_state(&self) -> ProviderState {
        ProviderState::empty(self.max_history)
    }

    /// Adapter for `name`, restored from `session` unless `force_new` is set
    ///
    /// Fails with [`LlmError::UnknownProvider`] for names outside the vendor
    /// set and with [`LlmError::Configuration`] when the vendor has no
    /// credential.
    pub fn resolve(&self, name: &str, force_new: bool, session: &SessionState) -> Result<LlmProvider> {
        let kind: ProviderKind = name.parse()?;

        let client = self.clients.get(&kind).cloned().ok_or_else(|| {
            LlmError::Configuration(format!(
                "{} is not configured (set {})",
                kind,
                kind.api_key_env()
            ))
        })?;

        let provider = match session.get(kind.as_str()) {
            Some(state) if !force_new => {
                LlmProvider::from_state(kind.as_str(), client, state.clone())
            }
            _ => LlmProvider::new(kind.as_str(), client, self.max_history),
        };

        Ok(provider.with_options(self.options.clone()))
    }
}

impl fmt::Debug for ProviderFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut configured: Vec<&ProviderKind> = self.clients.keys().collect();
        configured.sort();
        f.debug_struct("ProviderFactory")
            .field("configured", &configured)
            .field("max_history", &self.max_history)
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;

    fn factory_with(kinds: &[ProviderKind]) -> ProviderFactory {
        let mut config = ProviderConfig::default().with_max_history(4);
        for kind in kinds {
            config = config.with_api_key(*kind, "test-key");
        }
        ProviderFactory::from_config(&config).unwrap()
    }

    #[test]
    fn test_kind_round_trip() {
        for kind in ProviderKind::ALL {
            assert_eq!(kind.as_str().parse::<ProviderKind>().unwrap(), kind);
        }
        assert_eq!(ProviderKind::Gemini.to_string(), "gemini");
        assert_eq!(ProviderKind::Cerebras.api_key_env(), "CEREBRAS_API_KEY");
    }

    #[test]
    fn test_unknown_provider() {
        let factory = factory_with(&ProviderKind::ALL);
        let err = factory.resolve("mistral", false, &SessionState::new()).unwrap_err();

        assert!(matches!(err, LlmError::UnknownProvider(name) if name == "mistral"));
    }

    #[test]
    fn test_names_are_case_sensitive() {
        assert!("OpenAI".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_missing_credential_fails_fast() {
        let factory = factory_with(&[ProviderKind::OpenAI]);
        let err = factory.resolve("groq", false, &SessionState::new()).unwrap_err();

        assert!(matches!(err, LlmError::Configuration(_)));
        assert!(err.to_string().contains("GROQ_API_KEY"));
        assert!(factory.is_configured(ProviderKind::OpenAI));
        assert!(!factory.is_configured(ProviderKind::Groq));
    }

    #[test]
    fn test_resolve_fresh_adapter() {
        let factory = factory_with(&[ProviderKind::Anthropic]);
        let provider = factory.resolve("anthropic", false, &SessionState::new()).unwrap();

        assert_eq!(provider.name(), "anthropic");
        assert!(provider.history().is_empty());
        assert_eq!(provider.history().max_history(), 4);
    }

    #[test]
    fn test_resolve_restores_and_force_new_discards() {
        let factory = factory_with(&[ProviderKind::Gemini]);
        let mut session = SessionState::new();
        session.insert(
            "gemini",
            ProviderState {
                max_history: 6,
                history: vec![Message::user("q"), Message::assistant("a")],
            },
        );

        let restored = factory.resolve("gemini", false, &session).unwrap();
        assert_eq!(restored.history().len(), 2);
        assert_eq!(restored.history().max_history(), 6);

        let fresh = factory.resolve("gemini", true, &session).unwrap();
        assert!(fresh.history().is_empty());
        assert_eq!(fresh.to_state(), factory.fresh_state());
    }

    #[test]
    fn test_resolved_adapters_carry_options() {
        let options = ChatOptions::new().temperature(0.7);
        let config = ProviderConfig::default()
            .with_api_key(ProviderKind::OpenAI, "test-key")
            .with_options(options.clone());
        let factory = ProviderFactory::from_config(&config).unwrap();

        let provider = factory.resolve("openai", false, &SessionState::new()).unwrap();
        assert_eq!(provider.options(), &options);
    }
}
