use futures::StreamExt;
use mockito::Matcher;
use parley_llm::{ChatClient, ChatRequest, Message, OpenAIClient, StreamEvent};
use serde_json::json;

fn client_for(server: &mockito::Server) -> OpenAIClient {
    OpenAIClient::new("test-key").unwrap().with_base_url(server.url())
}

#[tokio::test]
async fn test_chat_completion() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer test-key")
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-x",
            "messages": [{"role": "user", "content": "hello"}],
            "stream": false
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "id": "chatcmpl-1",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "hi there"},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let response = client_for(&server)
        .chat(ChatRequest::new("gpt-x", vec![Message::user("hello")]))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(response.text(), "hi there");
    assert_eq!(response.finish_reason.as_deref(), Some("stop"));
    assert_eq!(response.usage.unwrap().total_tokens, 7);
}

#[tokio::test]
async fn test_error_status_is_reported_with_body() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(401)
        .with_body(r#"{"error":{"message":"Incorrect API key provided"}}"#)
        .create_async()
        .await;

    let err = OpenAIClient::groq("test-key")
        .unwrap()
        .with_base_url(server.url())
        .chat(ChatRequest::new("llama", vec![Message::user("hello")]))
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(message.starts_with("Groq API error (401"));
    assert!(message.contains("Incorrect API key provided"));
}

#[tokio::test]
async fn test_streaming_chunks() {
    let mut server = mockito::Server::new_async().await;
    let body = concat!(
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\"}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hel\"}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"lo\"}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
        "data: [DONE]\n\n",
    );
    server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::PartialJson(json!({"stream": true})))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(body)
        .create_async()
        .await;

    let stream = client_for(&server)
        .chat_stream(ChatRequest::new("gpt-x", vec![Message::user("hello")]))
        .await
        .unwrap();
    let events: Vec<StreamEvent> = stream.map(|e| e.unwrap()).collect().await;

    let text: String = events.iter().filter_map(|e| e.text()).collect();
    assert_eq!(text, "Hello");
    assert!(events.last().unwrap().is_done());
}
