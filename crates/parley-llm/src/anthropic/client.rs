// Anthropic Messages API client
//
// POST {base}/v1/messages, authenticated with `x-api-key` and pinned to an
// `anthropic-version`. `max_tokens` is mandatory on every request.

use crate::buffer_utils::{parse_sse_stream, SseLineParser};
use crate::streaming::StreamEvent;
use crate::traits::{ChatClient, ChatOptions, ChatRequest, ChatResponse, EventStream, TokenUsage};
use crate::types::{Message, Role};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http_client: reqwest::Client,
    base_url: String,
    max_tokens: u32,
    timeout: Option<Duration>,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&api_key).context("Invalid API key format")?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            base_url: ANTHROPIC_API_BASE.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: None,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Default `max_tokens` when the request does not set one
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn build_api_request(
        &self,
        model: &str,
        messages: &[Message],
        options: &ChatOptions,
        stream: bool,
    ) -> ApiRequest {
        // The conversation must open with a user turn; a sliding window can
        // leave an assistant turn at the front.
        let api_messages = messages
            .iter()
            .skip_while(|msg| msg.role == Role::Assistant)
            .map(|msg| ApiMessage {
                role: msg.role.as_str().to_string(),
                content: msg.content.clone(),
            })
            .collect();

        ApiRequest {
            model: model.to_string(),
            max_tokens: options.max_tokens.unwrap_or(self.max_tokens),
            messages: api_messages,
            temperature: options.temperature,
            stream,
        }
    }

    async fn post_messages(&self, payload: &ApiRequest) -> Result<reqwest::Response> {
        let mut builder = self
            .http_client
            .post(format!("{}/v1/messages", self.base_url))
            .json(payload);

        if let (false, Some(timeout)) = (payload.stream, self.timeout) {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .context("Failed to send request to Anthropic API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Anthropic API error ({}): {}", status, error_text);
        }

        Ok(response)
    }
}

#[async_trait]
impl ChatClient for AnthropicClient {
    fn vendor(&self) -> &str {
        "Anthropic"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let payload = self.build_api_request(&request.model, &request.messages, &request.options, false);
        let response = self.post_messages(&payload).await?;

        let parsed: ApiResponse = response
            .json()
            .await
            .context("Failed to parse Anthropic API response")?;

        let text: String = parsed
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect();

        Ok(ChatResponse {
            content: Some(text),
            usage: parsed.usage.map(|u| TokenUsage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
                total_tokens: u.input_tokens + u.output_tokens,
            }),
            finish_reason: parsed.stop_reason,
        })
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<EventStream> {
        let payload = self.build_api_request(&request.model, &request.messages, &request.options, true);
        let response = self.post_messages(&payload).await?;

        Ok(parse_sse_stream(response, AnthropicEventParser))
    }
}

/// Parses the `data:` payloads of a Messages API stream
pub struct AnthropicEventParser;

impl SseLineParser for AnthropicEventParser {
    fn parse_data_line(&self, data: &str) -> Result<Vec<StreamEvent>> {
        let event: StreamPayload =
            serde_json::from_str(data).context("Failed to parse Anthropic stream event")?;

        match event {
            StreamPayload::ContentBlockDelta {
                delta: BlockDelta::TextDelta { text },
            } if !text.is_empty() => Ok(vec![StreamEvent::delta(text)]),
            StreamPayload::MessageStop => Ok(vec![StreamEvent::Done {
                finish_reason: None,
            }]),
            StreamPayload::Error { error } => {
                anyhow::bail!("Anthropic stream error ({}): {}", error.kind, error.message)
            }
            _ => Ok(Vec::new()),
        }
    }

    // Anthropic has no `[DONE]` sentinel; `message_stop` ends the stream
    fn is_done_marker(&self, _data: &str) -> bool {
        false
    }
}

// ============================================================================
// WIRE TYPES
// ============================================================================

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamPayload {
    ContentBlockDelta { delta: BlockDelta },
    MessageStop,
    Error { error: StreamError },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockDelta {
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leading_assistant_turns_dropped() {
        let client = AnthropicClient::new("test-key").unwrap();
        let messages = vec![
            Message::assistant("stale"),
            Message::user("q"),
            Message::assistant("a"),
            Message::user("q2"),
        ];

        let request = client.build_api_request("claude-3-5-haiku-latest", &messages, &ChatOptions::new(), false);

        assert_eq!(request.messages.len(), 3);
        assert_eq!(request.messages[0].role, "user");
        assert_eq!(request.max_tokens, DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn test_request_max_tokens_override() {
        let client = AnthropicClient::new("test-key").unwrap().with_max_tokens(300);
        let messages = vec![Message::user("q")];

        let request = client.build_api_request("m", &messages, &ChatOptions::new(), true);
        assert_eq!(request.max_tokens, 300);

        let request = client.build_api_request("m", &messages, &ChatOptions::new().max_tokens(50), true);
        assert_eq!(request.max_tokens, 50);
    }

    #[test]
    fn test_event_parser() {
        let parser = AnthropicEventParser;

        let events = parser
            .parse_data_line(r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hel"}}"#)
            .unwrap();
        assert_eq!(events, vec![StreamEvent::delta("Hel")]);

        let events = parser
            .parse_data_line(r#"{"type":"message_start","message":{"id":"msg_1"}}"#)
            .unwrap();
        assert!(events.is_empty());

        let events = parser.parse_data_line(r#"{"type":"message_stop"}"#).unwrap();
        assert!(events[0].is_done());

        let err = parser
            .parse_data_line(r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("Overloaded"));
    }
}
