use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::llm::LlmProvider;
use crate::rag::advisor::DISCLAIMER;
use crate::rag::CaseIndex;
use crate::state::AppState;

pub async fn health(State(_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "initialized": true
    }))
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let provider_reachable = state.llm.health_check().await.unwrap_or(false);
    let meta = state.index.meta();

    Ok(Json(json!({
        "initialized": true,
        "document_count": state.index.len(),
        "index_built_at": meta.built_at,
        "embedding_model": meta.embedding_model,
        "embedding_dimension": meta.embedding_dimension,
        "chat_model": state.settings.llm.chat_model,
        "provider": state.llm.name(),
        "provider_reachable": provider_reachable,
        "disclaimer": DISCLAIMER
    })))
}
