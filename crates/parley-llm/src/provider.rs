use async_stream::try_stream;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use std::sync::Arc;

use crate::error::{LlmError, Result};
use crate::history::History;
use crate::state::ProviderState;
use crate::traits::{ChatClient, ChatOptions, ChatRequest, EventStream};
use crate::types::{Message, Role};

pub const REASONING_HEADER: &str = "Reasoning:\n";
pub const FINAL_RESPONSE_HEADER: &str = "\n\nFinal Response:\n";

/// First-stage prompt: reason about the message on its own, without history
pub fn reasoning_prompt(message: &str) -> String {
    format!("Reason step-by-step about the following message: {}", message)
}

/// Second-stage prompt, identical for batch and streaming calls
pub fn final_response_prompt(message: &str, reasoning: &str) -> String {
    format!(
        "Based on the following reasoning, provide a final response to the message.\n\n\
         Message:\n{}\n\nReasoning:\n{}\n\nFinal response:",
        message, reasoning
    )
}

/// One named provider: a vendor transport plus the conversation window kept for it
///
/// Every operation appends the user turn first. The assistant turn is only
/// recorded once the vendor answered successfully, so a failed call leaves
/// a dangling user turn behind.
pub struct LlmProvider {
    name: String,
    client: Arc<dyn ChatClient>,
    history: History,
    options: ChatOptions,
}

impl LlmProvider {
    pub fn new(name: impl Into<String>, client: Arc<dyn ChatClient>, max_history: usize) -> Self {
        Self {
            name: name.into(),
            client,
            history: History::new(max_history),
            options: ChatOptions::default(),
        }
    }

    /// Rebuild an adapter from a stored snapshot
    pub fn from_state(name: impl Into<String>, client: Arc<dyn ChatClient>, state: ProviderState) -> Self {
        Self {
            name: name.into(),
            client,
            history: state.into(),
            options: ChatOptions::default(),
        }
    }

    /// Sampling options sent with every vendor call
    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    pub fn to_state(&self) -> ProviderState {
        ProviderState::from(&self.history)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn options(&self) -> &ChatOptions {
        &self.options
    }

    /// Plain completion over the whole window
    pub async fn respond(&mut self, message: &str, model: &str) -> Result<String> {
        self.history.append(Role::User, message);

        let context = self.history.snapshot().to_vec();
        let reply = self.complete(model, context).await?;

        self.history.append(Role::Assistant, reply.clone());
        Ok(reply)
    }

    /// Two-stage completion: reasoning first, then a final answer built on it
    ///
    /// Only the final answer enters the history.
    pub async fn respond_with_reasoning(&mut self, message: &str, model: &str) -> Result<String> {
        self.history.append(Role::User, message);

        let reasoning = self
            .complete(model, vec![Message::user(reasoning_prompt(message))])
            .await?;
        let final_response = self
            .complete(model, vec![Message::user(final_response_prompt(message, &reasoning))])
            .await?;

        self.history.append(Role::Assistant, final_response.clone());
        Ok(format!(
            "{}{}{}{}",
            REASONING_HEADER, reasoning, FINAL_RESPONSE_HEADER, final_response
        ))
    }

    /// Incremental variant of [`respond`](Self::respond) and
    /// [`respond_with_reasoning`](Self::respond_with_reasoning)
    ///
    /// The final-stage text is appended to the history once the stream has
    /// been drained. Dropping the stream early drops the vendor connection
    /// and records no assistant turn.
    pub fn stream<'a>(
        &'a mut self,
        message: &'a str,
        model: &'a str,
        use_reasoning: bool,
    ) -> impl Stream<Item = Result<String>> + Send + 'a {
        try_stream! {
            self.history.append(Role::User, message);

            let final_messages = if use_reasoning {
                yield REASONING_HEADER.to_string();

                let mut reasoning = String::new();
                let mut fragments = self
                    .open_stream(model, vec![Message::user(reasoning_prompt(message))])
                    .await?;
                while let Some(fragment) = fragments.next().await {
                    let fragment = fragment?;
                    reasoning.push_str(&fragment);
                    yield fragment;
                }

                yield FINAL_RESPONSE_HEADER.to_string();
                vec![Message::user(final_response_prompt(message, &reasoning))]
            } else {
                self.history.snapshot().to_vec()
            };

            let mut final_text = String::new();
            let mut fragments = self.open_stream(model, final_messages).await?;
            while let Some(fragment) = fragments.next().await {
                let fragment = fragment?;
                final_text.push_str(&fragment);
                yield fragment;
            }

            self.history.append(Role::Assistant, final_text);
        }
    }

    async fn complete(&self, model: &str, messages: Vec<Message>) -> Result<String> {
        let request = ChatRequest::new(model, messages).with_options(self.options.clone());
        let response = match self.client.chat(request).await {
            Ok(response) => response,
            Err(e) => return Err(self.vendor_failure(e)),
        };

        if let Some(usage) = &response.usage {
            tracing::debug!(
                provider = %self.name,
                model,
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                finish_reason = response.finish_reason.as_deref().unwrap_or("unknown"),
                "Completion finished"
            );
        }

        Ok(response.text())
    }

    async fn open_stream(
        &self,
        model: &str,
        messages: Vec<Message>,
    ) -> Result<BoxStream<'static, Result<String>>> {
        let request = ChatRequest::new(model, messages).with_options(self.options.clone());
        let events = match self.client.chat_stream(request).await {
            Ok(events) => events,
            Err(e) => return Err(self.vendor_failure(e)),
        };
        Ok(text_fragments(self.name.clone(), events).boxed())
    }

    fn vendor_failure(&self, err: anyhow::Error) -> LlmError {
        tracing::error!(
            provider = %self.name,
            vendor = self.client.vendor(),
            error = %format!("{:#}", err),
            "Vendor call failed"
        );
        LlmError::from(err)
    }
}

impl std::fmt::Debug for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmProvider")
            .field("name", &self.name)
            .field("vendor", &self.client.vendor())
            .field("history", &self.history)
            .finish()
    }
}

/// Text deltas of a vendor stream, ending at the first `Done` event
fn text_fragments(provider: String, mut events: EventStream) -> impl Stream<Item = Result<String>> + Send {
    try_stream! {
        while let Some(event) = events.next().await {
            let event = event.map_err(|e| {
                tracing::error!(provider = %provider, error = %format!("{:#}", e), "Vendor stream failed");
                LlmError::from(e)
            })?;

            if event.is_done() {
                break;
            }
            if let Some(text) = event.text() {
                yield text.to_string();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::StreamEvent;
    use crate::traits::ChatResponse;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted replies and records every request it receives
    struct ScriptedClient {
        replies: Mutex<VecDeque<anyhow::Result<String>>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedClient {
        fn new(replies: Vec<anyhow::Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn next_reply(&self, request: ChatRequest) -> anyhow::Result<String> {
            self.requests.lock().unwrap().push(request);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow::anyhow!("no scripted reply")))
        }

        fn requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatClient for ScriptedClient {
        fn vendor(&self) -> &str {
            "Scripted"
        }

        async fn chat(&self, request: ChatRequest) -> anyhow::Result<ChatResponse> {
            let text = self.next_reply(request)?;
            Ok(ChatResponse {
                content: Some(text),
                usage: None,
                finish_reason: Some("stop".to_string()),
            })
        }

        // Splits the scripted reply into one delta per whitespace-separated word
        async fn chat_stream(&self, request: ChatRequest) -> anyhow::Result<EventStream> {
            let text = self.next_reply(request)?;
            let mut events: Vec<anyhow::Result<StreamEvent>> = text
                .split_inclusive(' ')
                .map(|word| Ok(StreamEvent::delta(word)))
                .collect();
            events.push(Ok(StreamEvent::Done { finish_reason: None }));
            Ok(Box::pin(futures::stream::iter(events)))
        }
    }

    #[tokio::test]
    async fn test_respond_records_both_turns() {
        let client = ScriptedClient::new(vec![Ok("hi there".to_string())]);
        let mut provider = LlmProvider::new("openai", client.clone(), 10);

        let reply = provider.respond("hello", "gpt-x").await.unwrap();

        assert_eq!(reply, "hi there");
        assert_eq!(
            provider.history().snapshot(),
            &[Message::user("hello"), Message::assistant("hi there")]
        );
        assert_eq!(client.requests()[0].model, "gpt-x");
        assert_eq!(client.requests()[0].messages, vec![Message::user("hello")]);
    }

    #[tokio::test]
    async fn test_respond_sends_whole_window() {
        let client = ScriptedClient::new(vec![Ok("one".to_string()), Ok("two".to_string())]);
        let mut provider = LlmProvider::new("groq", client.clone(), 10);

        provider.respond("first", "m").await.unwrap();
        provider.respond("second", "m").await.unwrap();

        assert_eq!(
            client.requests()[1].messages,
            vec![
                Message::user("first"),
                Message::assistant("one"),
                Message::user("second"),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_respond_keeps_user_turn_only() {
        let client = ScriptedClient::new(vec![Err(anyhow::anyhow!("API error (401): bad key"))]);
        let mut provider = LlmProvider::new("openai", client, 10);

        let err = provider.respond("hello", "m").await.unwrap_err();

        assert!(matches!(err, LlmError::Provider(_)));
        assert!(err.to_string().contains("bad key"));
        assert_eq!(provider.history().snapshot(), &[Message::user("hello")]);
    }

    #[tokio::test]
    async fn test_reasoning_format_and_history() {
        let client = ScriptedClient::new(vec![Ok("think".to_string()), Ok("answer".to_string())]);
        let mut provider = LlmProvider::new("anthropic", client.clone(), 10);

        let reply = provider.respond_with_reasoning("why?", "m").await.unwrap();

        assert_eq!(reply, "Reasoning:\nthink\n\nFinal Response:\nanswer");
        assert_eq!(
            provider.history().snapshot(),
            &[Message::user("why?"), Message::assistant("answer")]
        );

        let requests = client.requests();
        assert_eq!(requests[0].messages, vec![Message::user(reasoning_prompt("why?"))]);
        let stage_two = &requests[1].messages[0].content;
        assert!(stage_two.contains("why?"));
        assert!(stage_two.contains("think"));
    }

    #[tokio::test]
    async fn test_stream_writes_back_final_text() {
        let client = ScriptedClient::new(vec![Ok("hello world".to_string())]);
        let mut provider = LlmProvider::new("gemini", client, 10);

        let fragments: Vec<String> = provider
            .stream("hi", "m", false)
            .map(|f| f.unwrap())
            .collect()
            .await;

        assert_eq!(fragments, vec!["hello ", "world"]);
        assert_eq!(
            provider.history().snapshot(),
            &[Message::user("hi"), Message::assistant("hello world")]
        );
    }

    #[tokio::test]
    async fn test_stream_with_reasoning_layout() {
        let client = ScriptedClient::new(vec![Ok("step one".to_string()), Ok("done".to_string())]);
        let mut provider = LlmProvider::new("cerebras", client.clone(), 10);

        let fragments: Vec<String> = provider
            .stream("q", "m", true)
            .map(|f| f.unwrap())
            .collect()
            .await;

        assert_eq!(
            fragments,
            vec!["Reasoning:\n", "step ", "one", "\n\nFinal Response:\n", "done"]
        );
        assert_eq!(
            provider.history().snapshot(),
            &[Message::user("q"), Message::assistant("done")]
        );
        assert!(client.requests()[1].messages[0].content.contains("step one"));
    }

    #[tokio::test]
    async fn test_stream_error_records_no_reply() {
        let client = ScriptedClient::new(vec![Err(anyhow::anyhow!("timeout"))]);
        let mut provider = LlmProvider::new("openai", client, 10);

        let results: Vec<Result<String>> = provider.stream("hi", "m", false).collect().await;

        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
        assert_eq!(provider.history().snapshot(), &[Message::user("hi")]);
    }

    #[tokio::test]
    async fn test_failed_final_stage_keeps_user_turn_only() {
        let client = ScriptedClient::new(vec![Ok("think".to_string()), Err(anyhow::anyhow!("boom"))]);
        let mut provider = LlmProvider::new("groq", client.clone(), 10);

        let err = provider.respond_with_reasoning("q", "m").await.unwrap_err();

        assert!(matches!(err, LlmError::Provider(_)));
        assert!(err.to_string().contains("boom"));
        assert_eq!(provider.history().snapshot(), &[Message::user("q")]);
        assert_eq!(client.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_dropped_stream_records_no_reply() {
        let client = ScriptedClient::new(vec![Ok("a b c".to_string())]);
        let mut provider = LlmProvider::new("openai", client, 10);

        {
            let fragments = provider.stream("hi", "m", false);
            futures::pin_mut!(fragments);
            let first = fragments.next().await.unwrap().unwrap();
            assert_eq!(first, "a ");
        }

        assert_eq!(provider.history().snapshot(), &[Message::user("hi")]);
    }

    #[tokio::test]
    async fn test_options_sent_with_every_call() {
        let client = ScriptedClient::new(vec![Ok("s1".to_string()), Ok("s2".to_string())]);
        let options = ChatOptions::new().temperature(0.3).max_tokens(256);
        let mut provider = LlmProvider::new("anthropic", client.clone(), 10).with_options(options.clone());

        provider.respond_with_reasoning("q", "m").await.unwrap();

        let requests = client.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r.options == options));
    }

    #[tokio::test]
    async fn test_state_round_trip() {
        let client = ScriptedClient::new(vec![Ok("b".to_string())]);
        let mut provider = LlmProvider::new("openai", client.clone(), 3);
        provider.respond("a", "m").await.unwrap();

        let state = provider.to_state();
        let restored = LlmProvider::from_state("openai", client, state.clone());

        assert_eq!(restored.to_state(), state);
        assert_eq!(restored.history().max_history(), 3);
    }
}
