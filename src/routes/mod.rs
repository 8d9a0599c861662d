pub mod health;
pub mod live;
pub mod quizzes;
pub mod results;
pub mod sessions;

use axum::{
    routing::{get, patch, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{auth::require_bearer_auth, rate_limit};
use crate::AppState;

/// Full application router. Everything under `/api` requires a bearer token
/// and is rate limited per caller.
pub fn create_router(state: AppState) -> Router {
    let base_routes = Router::new().route("/health", get(health::health));

    let quiz_api = Router::new()
        .route(
            "/api/quizzes",
            get(quizzes::list_quizzes).post(quizzes::create_quiz),
        )
        .route("/api/quizzes/public", get(quizzes::list_public_quizzes))
        .route("/api/quizzes/created", get(quizzes::list_created_quizzes))
        .route(
            "/api/quizzes/collaborated",
            get(quizzes::list_collaborated_quizzes),
        )
        .route(
            "/api/quizzes/:quiz_id",
            get(quizzes::get_quiz).delete(quizzes::delete_quiz),
        )
        .route("/api/quizzes/:quiz_id/questions", post(quizzes::add_question))
        .route(
            "/api/quizzes/:quiz_id/questions/:question_id",
            patch(quizzes::update_question).delete(quizzes::delete_question),
        )
        .route(
            "/api/quizzes/:quiz_id/questions/:question_id/answers",
            post(quizzes::add_answer),
        )
        .route(
            "/api/quizzes/:quiz_id/questions/:question_id/answers/:answer_id",
            patch(quizzes::update_answer).delete(quizzes::delete_answer),
        )
        .route(
            "/api/quizzes/:quiz_id/changes",
            get(quizzes::list_changes).post(quizzes::apply_change),
        )
        .route("/api/quizzes/:quiz_id/presence", get(quizzes::get_presence))
        .route("/api/quizzes/:quiz_id/live", get(live::live_quiz));

    let session_api = Router::new()
        .route("/api/quizzes/:quiz_id/sessions", post(sessions::start_session))
        .route("/api/sessions/:session_id", get(sessions::get_session))
        .route(
            "/api/sessions/:session_id/questions",
            get(sessions::get_session_questions),
        )
        .route(
            "/api/sessions/:session_id/questions/:question_id/answer",
            put(sessions::submit_answer),
        )
        .route(
            "/api/sessions/:session_id/complete",
            post(sessions::complete_session),
        )
        .route("/api/sessions/:session_id/expire", post(sessions::expire_session))
        .route("/api/users/me/sessions", get(sessions::list_my_sessions));

    let result_api = Router::new()
        .route("/api/results/:result_id", get(results::get_result))
        .route("/api/users/me/results", get(results::list_my_results))
        .route(
            "/api/users/me/results/quiz/:quiz_id",
            get(results::list_my_results_for_quiz),
        )
        .route(
            "/api/users/me/results/quiz/:quiz_id/latest",
            get(results::latest_result_for_quiz),
        );

    // Layers run outside-in, so auth executes before the limiter and the
    // limiter sees the caller identity.
    let api = quiz_api
        .merge(session_api)
        .merge(result_api)
        .layer(axum::middleware::from_fn_with_state(
            rate_limit::RateLimiter::new(state.config.api_rps),
            rate_limit::rps_middleware,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_bearer_auth,
        ));

    base_routes
        .merge(api)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
