use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::session_dto::{CompleteSessionResponse, SubmitAnswerRequest};
use crate::error::Result;
use crate::middleware::auth::CallerIdentity;
use crate::AppState;

#[axum::debug_handler]
pub async fn start_session(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(quiz_id): Path<Uuid>,
) -> Result<Response> {
    let session = state.session_service.start(quiz_id, caller.user_id).await?;
    Ok((StatusCode::CREATED, Json(session)).into_response())
}

#[axum::debug_handler]
pub async fn get_session(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(session_id): Path<Uuid>,
) -> Result<Response> {
    let session = state
        .session_service
        .get_session(session_id, caller.user_id)
        .await?;
    Ok(Json(session).into_response())
}

#[axum::debug_handler]
pub async fn get_session_questions(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(session_id): Path<Uuid>,
) -> Result<Response> {
    let questions = state
        .session_service
        .get_session_questions(session_id, caller.user_id)
        .await?;
    Ok(Json(questions).into_response())
}

#[axum::debug_handler]
pub async fn submit_answer(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path((session_id, question_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<SubmitAnswerRequest>,
) -> Result<Response> {
    req.validate()?;
    let response = req.into_response()?;
    let saved = state
        .session_service
        .submit_answer(session_id, question_id, response, caller.user_id)
        .await?;
    Ok(Json(saved).into_response())
}

#[axum::debug_handler]
pub async fn complete_session(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(session_id): Path<Uuid>,
) -> Result<Response> {
    let (session, result) = state
        .session_service
        .complete(session_id, caller.user_id)
        .await?;
    Ok(Json(CompleteSessionResponse { session, result }).into_response())
}

#[axum::debug_handler]
pub async fn expire_session(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(session_id): Path<Uuid>,
) -> Result<Response> {
    let session = state
        .session_service
        .expire(session_id, caller.user_id)
        .await?;
    Ok(Json(session).into_response())
}

#[axum::debug_handler]
pub async fn list_my_sessions(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
) -> Result<Response> {
    let sessions = state
        .session_service
        .list_active_sessions(caller.user_id)
        .await?;
    Ok(Json(sessions).into_response())
}
