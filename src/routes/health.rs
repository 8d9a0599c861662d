use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::config::StoreBackend;
use crate::AppState;

#[axum::debug_handler]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let store = match state.config.store {
        StoreBackend::Postgres => "postgres",
        StoreBackend::Memory => "memory",
    };
    let body = json!({
        "status": "ok",
        "store": store,
    });
    (StatusCode::OK, Json(body))
}
