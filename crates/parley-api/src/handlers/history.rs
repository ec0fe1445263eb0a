use axum::{body::Bytes, extract::State, Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::dispatch::reset_provider;
use crate::error::{ApiError, ApiResult};
use crate::session::SessionId;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ClearHistoryRequest {
    pub provider: Option<String>,
}

/// `POST /clear_history`: empty one provider's conversation window
pub async fn clear_history(
    State(state): State<AppState>,
    Extension(session_id): Extension<SessionId>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let provider = serde_json::from_slice::<ClearHistoryRequest>(&body)
        .ok()
        .and_then(|req| req.provider)
        .ok_or_else(|| ApiError::InvalidRequest("Invalid provider or no conversation history".to_string()))?;

    let session = state.sessions.load(&session_id).await?;
    let fresh = reset_provider(&state.factory, &session, &provider)?;

    state.sessions.save_provider(&session_id, &provider, fresh).await?;
    tracing::info!(session = %session_id, provider = %provider, "Conversation history cleared");

    Ok(Json(json!({ "message": "Conversation history cleared" })))
}
