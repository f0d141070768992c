use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::state::AppState;

pub async fn health(State(_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "status": "ok", "time": Utc::now().to_rfc3339() }))
}

pub async fn status(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let chunks = state.store.count().await.unwrap_or(0);
    let llm_reachable = state.provider.health_check().await.unwrap_or(false);

    Ok(Json(json!({
        "chunks": chunks,
        "llm_provider": state.provider.name(),
        "llm_reachable": llm_reachable,
    })))
}
