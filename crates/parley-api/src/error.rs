use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use parley_llm::LlmError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Client asked for something that cannot be honored (400)
    #[error("{0}")]
    InvalidRequest(String),

    /// Request body or query could not be understood (500, kept for client compatibility)
    #[error("{0}")]
    MalformedRequest(String),

    #[error("Session storage error: {0}")]
    Session(#[from] anyhow::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<LlmError> for ApiError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::InvalidRequest(msg) => ApiError::InvalidRequest(msg),
            LlmError::UnknownProvider(_) => ApiError::InvalidRequest(err.to_string()),
            LlmError::Configuration(_) | LlmError::Provider(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::MalformedRequest(ref msg) => {
                tracing::warn!("Malformed request: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            ApiError::Session(ref e) => {
                tracing::error!("Session error: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Session storage error".to_string())
            }
            ApiError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
