use axum::{
    body::Bytes,
    extract::{Query, State},
    http::Method,
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    Extension, Json,
};
use futures::StreamExt;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::convert::Infallible;

use crate::dispatch::{dispatch_batch, dispatch_stream, ChatParams, DispatchEvent};
use crate::error::{ApiError, ApiResult};
use crate::session::SessionId;
use crate::state::AppState;

/// `GET|POST /chat`
///
/// GET reads query parameters (`providers` as a JSON string, booleans as
/// `"true"`), POST reads a JSON body. Answers with one JSON object, or with
/// an event stream when `use_streaming` is set.
pub async fn chat(
    State(state): State<AppState>,
    Extension(session_id): Extension<SessionId>,
    method: Method,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> ApiResult<Response> {
    let params = if method == Method::GET {
        params_from_query(&query)?
    } else {
        params_from_json(&body)?
    };

    tracing::debug!(
        session = %session_id,
        providers = ?params.providers,
        use_reasoning = params.use_reasoning,
        use_streaming = params.use_streaming,
        "Received chat request"
    );

    let session = state.sessions.load(&session_id).await?;

    if params.use_streaming {
        return Ok(stream_response(state, session_id, session, params).into_response());
    }

    let outcome = dispatch_batch(&state.factory, &session, &params).await;

    for (provider, provider_state) in outcome.updates {
        state
            .sessions
            .save_provider(&session_id, &provider, provider_state)
            .await?;
    }

    let responses: Map<String, Value> = outcome
        .responses
        .into_iter()
        .map(|(provider, text)| (provider, Value::String(text)))
        .collect();

    Ok(Json(json!({ "responses": responses })).into_response())
}

fn stream_response(
    state: AppState,
    session_id: SessionId,
    session: parley_llm::SessionState,
    params: ChatParams,
) -> Sse<impl futures::Stream<Item = Result<Event, Infallible>>> {
    let events = dispatch_stream(state.factory.clone(), session, params);
    let sessions = state.sessions.clone();

    let sse_events = async_stream::stream! {
        futures::pin_mut!(events);

        while let Some(event) = events.next().await {
            match event {
                DispatchEvent::Persist { provider, state } => {
                    if let Err(e) = sessions.save_provider(&session_id, &provider, state).await {
                        tracing::error!(provider = %provider, "Failed to save session state: {:#}", e);
                    }
                }
                other => {
                    if let Some(data) = other.client_data() {
                        yield Ok::<_, Infallible>(Event::default().data(sse_safe(data)));
                    }
                }
            }
        }
    };

    Sse::new(sse_events)
}

/// SSE lines are split on `\n`; a bare `\r` would end a line early
fn sse_safe(data: &str) -> String {
    data.replace("\r\n", "\n").replace('\r', "\n")
}

fn params_from_query(query: &HashMap<String, String>) -> ApiResult<ChatParams> {
    let message = query
        .get("message")
        .cloned()
        .ok_or_else(|| ApiError::MalformedRequest("Missing 'message' parameter".to_string()))?;

    let providers_json = query
        .get("providers")
        .ok_or_else(|| ApiError::MalformedRequest("Missing 'providers' parameter".to_string()))?;
    let providers: Value = serde_json::from_str(providers_json)
        .map_err(|e| ApiError::MalformedRequest(format!("Invalid 'providers' JSON: {}", e)))?;

    let flag = |name: &str| query.get(name).map(String::as_str) == Some("true");

    Ok(ChatParams {
        message,
        providers: provider_pairs(&providers)?,
        use_reasoning: flag("use_reasoning"),
        use_streaming: flag("use_streaming"),
    })
}

fn params_from_json(body: &[u8]) -> ApiResult<ChatParams> {
    let data: Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::MalformedRequest(format!("Invalid JSON body: {}", e)))?;

    let message = data
        .get("message")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::MalformedRequest("'message' must be a string".to_string()))?
        .to_string();

    let providers = match data.get("providers") {
        None | Some(Value::Null) => Vec::new(),
        Some(value) => provider_pairs(value)?,
    };

    let flag = |name: &str| -> ApiResult<bool> {
        match data.get(name) {
            None | Some(Value::Null) => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(ApiError::MalformedRequest(format!("'{}' must be a boolean", name))),
        }
    };

    Ok(ChatParams {
        message,
        providers,
        use_reasoning: flag("use_reasoning")?,
        use_streaming: flag("use_streaming")?,
    })
}

fn provider_pairs(value: &Value) -> ApiResult<Vec<(String, String)>> {
    let object = value
        .as_object()
        .ok_or_else(|| ApiError::MalformedRequest("'providers' must be an object".to_string()))?;

    object
        .iter()
        .map(|(name, model)| {
            model
                .as_str()
                .map(|model| (name.clone(), model.to_string()))
                .ok_or_else(|| {
                    ApiError::MalformedRequest(format!("Model for '{}' must be a string", name))
                })
        })
        .collect()
}
