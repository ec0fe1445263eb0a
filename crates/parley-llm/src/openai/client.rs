// OpenAI chat-completions client, shared by every vendor speaking the same wire format

use crate::buffer_utils::{parse_sse_stream, SseLineParser};
use crate::streaming::StreamEvent;
use crate::traits::{ChatClient, ChatOptions, ChatRequest, ChatResponse, EventStream, TokenUsage};
use crate::types::Message;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";
pub const CEREBRAS_API_BASE: &str = "https://api.cerebras.ai/v1";

/// OpenAI-compatible client (HTTP direct, no SDK)
///
/// Groq and Cerebras expose the same `/chat/completions` contract, so they
/// reuse this client with a different base URL and label.
#[derive(Debug, Clone)]
pub struct OpenAIClient {
    http_client: reqwest::Client,
    base_url: String,
    vendor: String,
    timeout: Option<Duration>,
}

impl OpenAIClient {
    /// Create new OpenAI client with API key
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::for_vendor("OpenAI", OPENAI_API_BASE, api_key)
    }

    /// Client for the Groq OpenAI-compatible endpoint
    pub fn groq(api_key: impl Into<String>) -> Result<Self> {
        Self::for_vendor("Groq", GROQ_API_BASE, api_key)
    }

    /// Client for the Cerebras OpenAI-compatible endpoint
    pub fn cerebras(api_key: impl Into<String>) -> Result<Self> {
        Self::for_vendor("Cerebras", CEREBRAS_API_BASE, api_key)
    }

    fn for_vendor(vendor: &str, base_url: &str, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .context("Invalid API key format")?,
        );

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            base_url: base_url.to_string(),
            vendor: vendor.to_string(),
            timeout: None,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Upper bound for non-streaming calls
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build chat completion request payload
    fn build_chat_request(
        &self,
        model: &str,
        messages: &[Message],
        options: &ChatOptions,
        stream: bool,
    ) -> Value {
        let openai_messages: Vec<Value> = messages
            .iter()
            .map(|msg| {
                serde_json::json!({
                    "role": msg.role.as_str(),
                    "content": msg.content,
                })
            })
            .collect();

        let mut request = serde_json::json!({
            "model": model,
            "messages": openai_messages,
            "stream": stream,
        });

        if let Some(obj) = request.as_object_mut() {
            if let Some(temp) = options.temperature {
                obj.insert("temperature".to_string(), serde_json::json!(temp));
            }
            if let Some(max_tokens) = options.max_tokens {
                obj.insert("max_tokens".to_string(), serde_json::json!(max_tokens));
            }
        }

        request
    }

    async fn post_completions(&self, payload: &Value, stream: bool) -> Result<reqwest::Response> {
        let mut builder = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .json(payload);

        if let (false, Some(timeout)) = (stream, self.timeout) {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .with_context(|| format!("Failed to send request to {} API", self.vendor))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("{} API error ({}): {}", self.vendor, status, error_text);
        }

        Ok(response)
    }
}

#[async_trait]
impl ChatClient for OpenAIClient {
    fn vendor(&self) -> &str {
        &self.vendor
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let payload = self.build_chat_request(&request.model, &request.messages, &request.options, false);
        let response = self.post_completions(&payload, false).await?;

        let parsed: OpenAIChatResponse = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", self.vendor))?;

        let choice = parsed.choices.first();
        Ok(ChatResponse {
            content: choice.and_then(|c| c.message.content.clone()),
            usage: parsed.usage.as_ref().map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            finish_reason: choice.and_then(|c| c.finish_reason.clone()),
        })
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<EventStream> {
        let payload = self.build_chat_request(&request.model, &request.messages, &request.options, true);
        let response = self.post_completions(&payload, true).await?;

        Ok(parse_sse_stream(response, OpenAIChunkParser))
    }
}

/// Parses `data:` payloads of a chat-completions stream
pub struct OpenAIChunkParser;

impl SseLineParser for OpenAIChunkParser {
    fn parse_data_line(&self, data: &str) -> Result<Vec<StreamEvent>> {
        let chunk: ChatStreamChunk =
            serde_json::from_str(data).context("Failed to parse chat chunk")?;
        Ok(chunk.to_stream_events())
    }
}

// ============================================================================
// WIRE TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAIChatResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Choice {
    #[serde(default)]
    pub index: u32,
    pub message: ResponseMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ResponseMessage {
    pub role: String,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatStreamChunk {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamChoice {
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Delta {
    pub content: Option<String>,
}

impl ChatStreamChunk {
    fn to_stream_events(&self) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        if let Some(choice) = self.choices.first() {
            if let Some(content) = &choice.delta.content {
                if !content.is_empty() {
                    events.push(StreamEvent::delta(content.clone()));
                }
            }

            if let Some(finish_reason) = &choice.finish_reason {
                events.push(StreamEvent::Done {
                    finish_reason: Some(finish_reason.clone()),
                });
            }
        }

        events
    }
}
