use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::collab_dto::ApplyChangeRequest;
use crate::dto::quiz_dto::{
    AddAnswerRequest, AddQuestionRequest, CreateQuizRequest, DeletedResponse,
    UpdateAnswerRequest, UpdateQuestionRequest, VersionQuery,
};
use crate::error::Result;
use crate::middleware::auth::CallerIdentity;
use crate::AppState;

#[axum::debug_handler]
pub async fn create_quiz(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Json(req): Json<CreateQuizRequest>,
) -> Result<Response> {
    req.validate()?;
    let quiz = state.quiz_service.create_quiz(caller.user_id, req).await?;
    Ok((StatusCode::CREATED, Json(quiz)).into_response())
}

#[axum::debug_handler]
pub async fn list_quizzes(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
) -> Result<Response> {
    let quizzes = state.quiz_service.list_quizzes(caller.user_id).await?;
    Ok(Json(quizzes).into_response())
}

#[axum::debug_handler]
pub async fn list_public_quizzes(State(state): State<AppState>) -> Result<Response> {
    let quizzes = state.quiz_service.list_public_quizzes().await?;
    Ok(Json(quizzes).into_response())
}

#[axum::debug_handler]
pub async fn list_created_quizzes(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
) -> Result<Response> {
    let quizzes = state.quiz_service.list_created_quizzes(caller.user_id).await?;
    Ok(Json(quizzes).into_response())
}

#[axum::debug_handler]
pub async fn list_collaborated_quizzes(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
) -> Result<Response> {
    let quizzes = state
        .quiz_service
        .list_collaborated_quizzes(caller.user_id)
        .await?;
    Ok(Json(quizzes).into_response())
}

#[axum::debug_handler]
pub async fn get_quiz(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(quiz_id): Path<Uuid>,
) -> Result<Response> {
    let view = state.quiz_service.get_quiz(quiz_id, caller.user_id).await?;
    Ok(Json(view).into_response())
}

#[axum::debug_handler]
pub async fn delete_quiz(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(quiz_id): Path<Uuid>,
    Query(query): Query<VersionQuery>,
) -> Result<Response> {
    state
        .quiz_service
        .delete_quiz(quiz_id, caller.user_id, query.version)
        .await?;
    Ok(Json(DeletedResponse {
        id: quiz_id,
        deleted: true,
        quiz_version: None,
    })
    .into_response())
}

#[axum::debug_handler]
pub async fn add_question(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(quiz_id): Path<Uuid>,
    Json(req): Json<AddQuestionRequest>,
) -> Result<Response> {
    req.validate()?;
    let created = state
        .quiz_service
        .add_question(quiz_id, caller.user_id, req)
        .await?;
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

#[axum::debug_handler]
pub async fn update_question(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path((quiz_id, question_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateQuestionRequest>,
) -> Result<Response> {
    req.validate()?;
    let updated = state
        .quiz_service
        .update_question(quiz_id, question_id, caller.user_id, req)
        .await?;
    Ok(Json(updated).into_response())
}

#[axum::debug_handler]
pub async fn delete_question(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path((quiz_id, question_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<VersionQuery>,
) -> Result<Response> {
    let quiz = state
        .quiz_service
        .delete_question(quiz_id, question_id, caller.user_id, query.version)
        .await?;
    Ok(Json(DeletedResponse {
        id: question_id,
        deleted: true,
        quiz_version: Some(quiz.version),
    })
    .into_response())
}

#[axum::debug_handler]
pub async fn add_answer(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path((quiz_id, question_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<AddAnswerRequest>,
) -> Result<Response> {
    req.validate()?;
    let created = state
        .quiz_service
        .add_answer(quiz_id, question_id, caller.user_id, req)
        .await?;
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

#[axum::debug_handler]
pub async fn update_answer(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path((quiz_id, question_id, answer_id)): Path<(Uuid, Uuid, Uuid)>,
    Json(req): Json<UpdateAnswerRequest>,
) -> Result<Response> {
    req.validate()?;
    let updated = state
        .quiz_service
        .update_answer(quiz_id, question_id, answer_id, caller.user_id, req)
        .await?;
    Ok(Json(updated).into_response())
}

#[axum::debug_handler]
pub async fn delete_answer(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path((quiz_id, question_id, answer_id)): Path<(Uuid, Uuid, Uuid)>,
    Query(query): Query<VersionQuery>,
) -> Result<Response> {
    let quiz = state
        .quiz_service
        .delete_answer(quiz_id, question_id, answer_id, caller.user_id, query.version)
        .await?;
    Ok(Json(DeletedResponse {
        id: answer_id,
        deleted: true,
        quiz_version: Some(quiz.version),
    })
    .into_response())
}

#[axum::debug_handler]
pub async fn apply_change(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(quiz_id): Path<Uuid>,
    Json(req): Json<ApplyChangeRequest>,
) -> Result<Response> {
    req.validate()?;
    let quiz = state
        .collab_service
        .apply_change(
            quiz_id,
            caller.user_id,
            &req.change_type,
            req.change_data,
            req.version,
        )
        .await?;
    Ok(Json(quiz).into_response())
}

#[axum::debug_handler]
pub async fn list_changes(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(quiz_id): Path<Uuid>,
) -> Result<Response> {
    let changes = state
        .collab_service
        .changes(quiz_id, caller.user_id)
        .await?;
    Ok(Json(changes).into_response())
}

#[axum::debug_handler]
pub async fn get_presence(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(quiz_id): Path<Uuid>,
) -> Result<Response> {
    let snapshot = state
        .collab_service
        .presence(quiz_id, caller.user_id)
        .await?;
    Ok(Json(snapshot).into_response())
}
