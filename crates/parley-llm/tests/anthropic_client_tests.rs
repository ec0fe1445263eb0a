use futures::StreamExt;
use mockito::Matcher;
use parley_llm::{AnthropicClient, ChatClient, ChatRequest, Message, StreamEvent};
use serde_json::json;

#[tokio::test]
async fn test_messages_request() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/messages")
        .match_header("x-api-key", "test-key")
        .match_header("anthropic-version", "2023-06-01")
        .match_body(Matcher::PartialJson(json!({
            "model": "claude-test",
            "max_tokens": 300,
            "messages": [{"role": "user", "content": "hello"}]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "id": "msg_1",
                "type": "message",
                "role": "assistant",
                "content": [{"type": "text", "text": "hi there"}],
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 4, "output_tokens": 2}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = AnthropicClient::new("test-key")
        .unwrap()
        .with_base_url(server.url())
        .with_max_tokens(300);
    let response = client
        .chat(ChatRequest::new("claude-test", vec![Message::user("hello")]))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(response.text(), "hi there");
    assert_eq!(response.usage.unwrap().total_tokens, 6);
}

#[tokio::test]
async fn test_streamed_text_deltas() {
    let mut server = mockito::Server::new_async().await;
    let body = concat!(
        "event: message_start\n",
        "data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_1\"}}\n\n",
        "event: content_block_start\n",
        "data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n",
        "event: content_block_delta\n",
        "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi \"}}\n\n",
        "event: content_block_delta\n",
        "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"you\"}}\n\n",
        "event: message_stop\n",
        "data: {\"type\":\"message_stop\"}\n\n",
    );
    server
        .mock("POST", "/v1/messages")
        .match_body(Matcher::PartialJson(json!({"stream": true})))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(body)
        .create_async()
        .await;

    let client = AnthropicClient::new("test-key").unwrap().with_base_url(server.url());
    let events: Vec<StreamEvent> = client
        .chat_stream(ChatRequest::new("claude-test", vec![Message::user("hello")]))
        .await
        .unwrap()
        .map(|e| e.unwrap())
        .collect()
        .await;

    assert_eq!(
        events,
        vec![
            StreamEvent::delta("Hi "),
            StreamEvent::delta("you"),
            StreamEvent::Done { finish_reason: None },
        ]
    );
}

#[tokio::test]
async fn test_overloaded_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/messages")
        .with_status(529)
        .with_body(r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#)
        .create_async()
        .await;

    let client = AnthropicClient::new("test-key").unwrap().with_base_url(server.url());
    let err = client
        .chat(ChatRequest::new("claude-test", vec![Message::user("hello")]))
        .await
        .unwrap_err();

    assert!(err.to_string().starts_with("Anthropic API error (529"));
}
