use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;
use crate::session::SessionId;
use crate::state::AppState;

/// Attach a [`SessionId`] to every request
///
/// The cookie id is honored only when the store issued it and it is still
/// live. Otherwise the store mints a new id, returned in `Set-Cookie`.
pub async fn attach_session(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let cookie_name = state.config.session.cookie_name.as_str();

    let presented = session_from_cookies(req.headers(), cookie_name);
    let known = match presented {
        Some(id) => match state.sessions.exists(&id).await {
            Ok(true) => Some(id),
            Ok(false) => {
                tracing::debug!(session = %id, "Ignoring unknown session id");
                None
            }
            Err(e) => return ApiError::from(e).into_response(),
        },
        None => None,
    };

    let (session_id, minted) = match known {
        Some(id) => (id, false),
        None => match state.sessions.create().await {
            Ok(id) => (id, true),
            Err(e) => return ApiError::from(e).into_response(),
        },
    };
    req.extensions_mut().insert(session_id);

    let mut response = next.run(req).await;

    if minted {
        let cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", cookie_name, session_id);
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::error!("Invalid session cookie header: {}", e),
        }
    }

    response
}

/// Find `name` among the `Cookie` headers and parse it as a session id
pub fn session_from_cookies(headers: &HeaderMap, name: &str) -> Option<SessionId> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .and_then(|(_, value)| value.trim_matches('"').parse().ok())
}
