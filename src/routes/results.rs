use axum::{
    extract::{Path, State},
    response::{IntoResponse, Json, Response},
    Extension,
};
use uuid::Uuid;

use crate::error::Result;
use crate::middleware::auth::CallerIdentity;
use crate::AppState;

#[axum::debug_handler]
pub async fn get_result(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(result_id): Path<Uuid>,
) -> Result<Response> {
    let result = state
        .result_service
        .get_result(result_id, caller.user_id)
        .await?;
    Ok(Json(result).into_response())
}

#[axum::debug_handler]
pub async fn list_my_results(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
) -> Result<Response> {
    let results = state.result_service.list_results(caller.user_id).await?;
    Ok(Json(results).into_response())
}

#[axum::debug_handler]
pub async fn list_my_results_for_quiz(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(quiz_id): Path<Uuid>,
) -> Result<Response> {
    let results = state
        .result_service
        .list_results_for_quiz(caller.user_id, quiz_id)
        .await?;
    Ok(Json(results).into_response())
}

#[axum::debug_handler]
pub async fn latest_result_for_quiz(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(quiz_id): Path<Uuid>,
) -> Result<Response> {
    let result = state
        .result_service
        .latest_result_for_quiz(caller.user_id, quiz_id)
        .await?;
    Ok(Json(result).into_response())
}
