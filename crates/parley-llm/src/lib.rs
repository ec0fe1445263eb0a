pub mod types;
pub mod traits;
pub mod streaming;
pub mod buffer_utils;
pub mod history;
pub mod state;
pub mod error;
pub mod openai;
pub mod anthropic;
pub mod gemini;
pub mod provider;
pub mod factory;

pub use traits::{
    ChatClient,
    ChatRequest, ChatResponse, ChatOptions,
    EventStream,
    TokenUsage,
};

pub use error::{LlmError, Result};
pub use streaming::StreamEvent;
pub use buffer_utils::CircularLineBuffer;
pub use history::{History, DEFAULT_MAX_HISTORY};
pub use state::{ProviderState, SessionState};
pub use openai::OpenAIClient;
pub use anthropic::AnthropicClient;
pub use gemini::GeminiClient;
pub use provider::LlmProvider;
pub use factory::{ProviderConfig, ProviderFactory, ProviderKind};
pub use types::{Message, Role};
