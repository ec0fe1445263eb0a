use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{
    config::CorsConfig,
    handlers::{chat, history},
    middleware::{logging, session},
    routes::{health, index},
    state::AppState,
};

pub fn build_router(state: AppState) -> Router {
    let routes = Router::new()
        // UI
        .route("/", get(index::index))
        .route("/static/js/main.js", get(index::main_js))
        // Health
        .route("/health", get(health::health_check))
        // Chat
        .route("/chat", get(chat::chat).post(chat::chat))
        .route("/clear_history", post(history::clear_history));

    let mut router = routes
        .layer(middleware::from_fn_with_state(state.clone(), session::attach_session))
        .layer(middleware::from_fn(logging::log_request));

    if let Some(request_timeout) = state.config.server.request_timeout() {
        router = router.layer(TimeoutLayer::new(request_timeout));
    }

    router
        .layer(CompressionLayer::new())
        .layer(build_cors_layer(&state.config.cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    if !config.enabled {
        return CorsLayer::new();
    }

    let mut cors = CorsLayer::new()
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers(Any);

    if config.origins.iter().any(|o| o == "*") {
        cors = cors.allow_origin(Any);
    } else {
        let origins: Vec<axum::http::HeaderValue> = config
            .origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        cors = cors.allow_origin(AllowOrigin::list(origins));
    }

    cors
}
