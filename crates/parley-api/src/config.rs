use config::{Config as ConfigLoader, ConfigError, File};
use parley_llm::{ChatOptions, ProviderConfig, DEFAULT_MAX_HISTORY};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub session: SessionConfig,
    pub llm: LlmConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Time allowed until response headers are sent; 0 disables it
    ///
    /// SSE bodies are not bounded by it. Keep it above twice
    /// `llm.request_timeout_secs` so a slow two-stage batch call fails inside
    /// its own slot instead of timing out the whole request.
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5152,
            request_timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub enabled: bool,
    pub origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            origins: vec!["*".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cookie_name: String,
    /// Sessions untouched for longer than this are dropped
    pub idle_timeout_secs: u64,
    /// History window given to freshly created adapters
    pub max_history: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "parley_session".to_string(),
            idle_timeout_secs: 86_400,
            max_history: DEFAULT_MAX_HISTORY,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Timeout for non-streaming vendor calls; 0 disables it
    pub request_timeout_secs: u64,
    pub anthropic_max_tokens: u32,
    /// Sampling temperature sent to every vendor; vendor default when unset
    pub temperature: Option<f32>,
    /// Completion cap sent to every vendor; overrides `anthropic_max_tokens`
    pub max_tokens: Option<u32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 120,
            anthropic_max_tokens: 1024,
            temperature: None,
            max_tokens: None,
        }
    }
}

impl LlmConfig {
    pub fn chat_options(&self) -> ChatOptions {
        ChatOptions {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Environment variables that override single keys
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("SERVER_HOST", "server.host"),
    ("SERVER_PORT", "server.port"),
    ("SERVER_REQUEST_TIMEOUT_SECS", "server.request_timeout_secs"),
    ("SESSION_COOKIE_NAME", "session.cookie_name"),
    ("SESSION_IDLE_TIMEOUT_SECS", "session.idle_timeout_secs"),
    ("SESSION_MAX_HISTORY", "session.max_history"),
    ("LLM_REQUEST_TIMEOUT_SECS", "llm.request_timeout_secs"),
    ("LLM_ANTHROPIC_MAX_TOKENS", "llm.anthropic_max_tokens"),
    ("LLM_TEMPERATURE", "llm.temperature"),
    ("LLM_MAX_TOKENS", "llm.max_tokens"),
    ("LOG_LEVEL", "logging.level"),
    ("LOG_FORMAT", "logging.format"),
];

impl Config {
    /// Load configuration from TOML files and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. built-in defaults
    /// 2. config/default.toml
    /// 3. config/{ENV}.toml (if ENV is set)
    /// 4. Environment variables (SERVER_, SESSION_, LLM_ and LOG_ prefixes)
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "dev".to_string());

        let mut builder = ConfigLoader::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false));

        for (var, key) in ENV_OVERRIDES {
            builder = builder.set_override_option(*key, std::env::var(var).ok())?;
        }

        builder.build()?.try_deserialize()
    }

    /// Load config from a specific path (useful for testing)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let builder = ConfigLoader::builder().add_source(File::from(path.as_ref()));

        builder.build()?.try_deserialize()
    }

    /// Vendor client settings; credentials come from the environment only
    pub fn provider_config(&self) -> ProviderConfig {
        let mut provider_config = ProviderConfig::from_env()
            .with_anthropic_max_tokens(self.llm.anthropic_max_tokens)
            .with_max_history(self.session.max_history)
            .with_options(self.llm.chat_options());

        if self.llm.request_timeout_secs > 0 {
            provider_config =
                provider_config.with_request_timeout(Duration::from_secs(self.llm.request_timeout_secs));
        }

        provider_config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_structure() {
        let toml = r#"
            [server]
            host = "127.0.0.1"
            port = 3000

            [cors]
            enabled = true
            origins = ["http://localhost:3000"]

            [session]
            cookie_name = "sid"
            max_history = 4

            [llm]
            request_timeout_secs = 0
            temperature = 0.5

            [logging]
            level = "debug"
            format = "json"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.session.cookie_name, "sid");
        assert_eq!(config.session.max_history, 4);
        // Keys missing from the file fall back to defaults
        assert_eq!(config.session.idle_timeout_secs, 86_400);
        assert_eq!(config.llm.anthropic_max_tokens, 1024);
        assert_eq!(config.provider_config().options.temperature, Some(0.5));
        assert_eq!(config.provider_config().options.max_tokens, None);
        assert!(config.provider_config().request_timeout.is_none());
        assert_eq!(config.server.request_timeout(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_zero_server_timeout_disables_it() {
        let config: Config = toml::from_str("[server]\nrequest_timeout_secs = 0").unwrap();
        assert!(config.server.request_timeout().is_none());
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 5152);
        assert_eq!(config.session.max_history, DEFAULT_MAX_HISTORY);
        assert_eq!(config.logging.format, "pretty");
    }
}
