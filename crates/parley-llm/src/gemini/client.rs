// Google Gemini generateContent client
//
// Gemini names the assistant role "model" and wraps text in `parts`.
// Streaming goes through `:streamGenerateContent?alt=sse`, which emits one
// JSON candidate batch per `data:` line and simply closes the body when done.

use crate::buffer_utils::{parse_sse_stream, SseLineParser};
use crate::streaming::StreamEvent;
use crate::traits::{ChatClient, ChatOptions, ChatRequest, ChatResponse, EventStream, TokenUsage};
use crate::types::{Message, Role};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http_client: reqwest::Client,
    base_url: String,
    timeout: Option<Duration>,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(&api_key).context("Invalid API key format")?,
        );

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            base_url: GEMINI_API_BASE.to_string(),
            timeout: None,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn build_payload(&self, messages: &[Message], options: &ChatOptions) -> Value {
        let contents: Vec<Value> = messages
            .iter()
            .map(|msg| {
                let role = match msg.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                };
                json!({
                    "role": role,
                    "parts": [{ "text": msg.content }],
                })
            })
            .collect();

        let mut payload = json!({ "contents": contents });

        let mut generation_config = serde_json::Map::new();
        if let Some(temp) = options.temperature {
            generation_config.insert("temperature".to_string(), json!(temp));
        }
        if let Some(max_tokens) = options.max_tokens {
            generation_config.insert("maxOutputTokens".to_string(), json!(max_tokens));
        }
        if !generation_config.is_empty() {
            payload["generationConfig"] = Value::Object(generation_config);
        }

        payload
    }

    async fn post(&self, url: String, payload: &Value, stream: bool) -> Result<reqwest::Response> {
        let mut builder = self.http_client.post(url).json(payload);

        if let (false, Some(timeout)) = (stream, self.timeout) {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .context("Failed to send request to Gemini API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            // Gemini wraps errors as {"error": {"message": ...}}
            let message = serde_json::from_str::<Value>(&error_text)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
                .unwrap_or(error_text);
            anyhow::bail!("Gemini API error ({}): {}", status, message);
        }

        Ok(response)
    }
}

#[async_trait]
impl ChatClient for GeminiClient {
    fn vendor(&self) -> &str {
        "Gemini"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let payload = self.build_payload(&request.messages, &request.options);
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, request.model);
        let response = self.post(url, &payload, false).await?;

        let parsed: GenerateResponse = response
            .json()
            .await
            .context("Failed to parse Gemini API response")?;

        let candidate = parsed.candidates.first();
        Ok(ChatResponse {
            content: candidate.map(Candidate::text),
            usage: parsed.usage_metadata.map(|u| TokenUsage {
                input_tokens: u.prompt_token_count,
                output_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            }),
            finish_reason: candidate.and_then(|c| c.finish_reason.clone()),
        })
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<EventStream> {
        let payload = self.build_payload(&request.messages, &request.options);
        let url = format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url, request.model
        );
        let response = self.post(url, &payload, true).await?;

        Ok(parse_sse_stream(response, GeminiChunkParser))
    }
}

/// Parses the `data:` payloads of a `streamGenerateContent?alt=sse` body
pub struct GeminiChunkParser;

impl SseLineParser for GeminiChunkParser {
    fn parse_data_line(&self, data: &str) -> Result<Vec<StreamEvent>> {
        let chunk: GenerateResponse =
            serde_json::from_str(data).context("Failed to parse Gemini chunk")?;

        let Some(candidate) = chunk.candidates.first() else {
            return Ok(Vec::new());
        };

        let text = candidate.text();
        let mut events = Vec::new();
        if !text.is_empty() {
            events.push(StreamEvent::delta(text));
        }
        Ok(events)
    }

    fn is_done_marker(&self, _data: &str) -> bool {
        false
    }
}

// ============================================================================
// WIRE TYPES
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

impl Candidate {
    fn text(&self) -> String {
        self.content
            .as_ref()
            .map(|c| c.parts.iter().filter_map(|p| p.text.as_deref()).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}
