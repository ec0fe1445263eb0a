use axum::{extract::State, Json};
use parley_llm::ProviderKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub providers: BTreeMap<String, String>,
}

/// Health check endpoint
///
/// Reports which vendors have a credential; no vendor is contacted.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let providers = ProviderKind::ALL
        .into_iter()
        .map(|kind| {
            let status = if state.factory.is_configured(kind) {
                "configured"
            } else {
                "missing credential"
            };
            (kind.to_string(), status.to_string())
        })
        .collect();

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        providers,
    })
}
