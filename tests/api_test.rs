use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;
use uuid::Uuid;

use quiz_engine::{
    config::Config, middleware::auth::issue_token, routes::create_router, AppState,
};

const SECRET: &str = "test_secret_key";

fn app() -> Router {
    create_router(AppState::in_memory(Config::for_memory(SECRET)))
}

fn token_for(user_id: Uuid, username: &str) -> String {
    issue_token(SECRET, user_id, username, 3600).expect("token")
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<JsonValue>,
) -> (StatusCode, JsonValue) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let req = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn find_question<'a>(quiz: &'a JsonValue, text: &str) -> &'a JsonValue {
    quiz["questions"]
        .as_array()
        .unwrap()
        .iter()
        .find(|q| q["text"] == text)
        .expect("question present")
}

fn answer_id(question: &JsonValue, text: &str) -> String {
    question["answers"]
        .as_array()
        .unwrap()
        .iter()
        .find(|a| a["text"] == text)
        .expect("answer present")["id"]
        .as_str()
        .unwrap()
        .to_string()
}

async fn create_geography_quiz(app: &Router, token: &str, is_public: bool) -> JsonValue {
    let (status, quiz) = send(
        app,
        "POST",
        "/api/quizzes",
        Some(token),
        Some(json!({
            "title": "Basics",
            "isPublic": is_public,
            "questions": [
                {
                    "text": "2 + 2?",
                    "question_type": "SINGLE_CHOICE",
                    "answers": [
                        { "text": "4", "is_correct": true },
                        { "text": "5", "is_correct": false }
                    ]
                },
                {
                    "text": "Capital of France?",
                    "question_type": "SHORT_ANSWER",
                    "answers": [ { "text": "Paris", "is_correct": true } ]
                }
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create quiz: {}", quiz);
    quiz
}

#[tokio::test]
async fn health_reports_store_backend() {
    let app = app();
    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "memory");
}

#[tokio::test]
async fn api_requires_bearer_token() {
    let app = app();

    let (status, body) = send(&app, "GET", "/api/quizzes", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "missing_authorization");

    let (status, body) = send(&app, "GET", "/api/quizzes", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_token");

    let forged = issue_token("other-secret", Uuid::new_v4(), "mallory", 3600).unwrap();
    let (status, _) = send(&app, "GET", "/api/quizzes", Some(&forged), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn quiz_session_flow_end_to_end() {
    let app = app();
    let creator = token_for(Uuid::new_v4(), "author");
    let taker_id = Uuid::new_v4();
    let taker = token_for(taker_id, "student");

    let quiz = create_geography_quiz(&app, &creator, true).await;
    let quiz_id = quiz["id"].as_str().unwrap().to_string();
    let arithmetic = find_question(&quiz, "2 + 2?");
    let capital = find_question(&quiz, "Capital of France?");
    let arithmetic_id = arithmetic["id"].as_str().unwrap().to_string();
    let capital_id = capital["id"].as_str().unwrap().to_string();
    let four = answer_id(arithmetic, "4");

    // A non-editor sees a public quiz without its answer key.
    let (status, summary) = send(&app, "GET", &format!("/api/quizzes/{}", quiz_id), Some(&taker), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(summary.get("questions").is_none());

    let (status, session) = send(
        &app,
        "POST",
        &format!("/api/quizzes/{}/sessions", quiz_id),
        Some(&taker),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "start: {}", session);
    assert_eq!(session["status"], "ACTIVE");
    let session_id = session["id"].as_str().unwrap().to_string();

    let (status, questions) = send(
        &app,
        "GET",
        &format!("/api/sessions/{}/questions", session_id),
        Some(&taker),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let questions = questions.as_array().unwrap();
    assert_eq!(questions.len(), 2);
    for option in questions[0]["options"].as_array().unwrap() {
        assert!(option.get("is_correct").is_none());
    }

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/sessions/{}/questions/{}/answer", session_id, arithmetic_id),
        Some(&taker),
        Some(json!({ "selected_answer_ids": [four] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/sessions/{}/questions/{}/answer", session_id, capital_id),
        Some(&taker),
        Some(json!({ "textAnswer": "  paris " })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Someone else cannot complete the session.
    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/sessions/{}/complete", session_id),
        Some(&creator),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, completed) = send(
        &app,
        "POST",
        &format!("/api/sessions/{}/complete", session_id),
        Some(&taker),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "complete: {}", completed);
    assert_eq!(completed["session"]["status"], "COMPLETED");
    assert_eq!(completed["result"]["score"], 2);
    assert_eq!(completed["result"]["total_questions"], 2);
    assert_eq!(
        completed["result"]["question_results"].as_array().unwrap().len(),
        2
    );
    let result_id = completed["result"]["id"].as_str().unwrap().to_string();

    // A completed session takes no more answers.
    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/sessions/{}/questions/{}/answer", session_id, arithmetic_id),
        Some(&taker),
        Some(json!({ "selected_answer_ids": [four] })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, active) = send(&app, "GET", "/api/users/me/sessions", Some(&taker), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(active.as_array().unwrap().is_empty());

    let (status, results) = send(&app, "GET", "/api/users/me/results", Some(&taker), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(results.as_array().unwrap().len(), 1);

    let (status, latest) = send(
        &app,
        "GET",
        &format!("/api/users/me/results/quiz/{}/latest", quiz_id),
        Some(&taker),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest["id"], result_id.as_str());

    let (status, _) = send(&app, "GET", &format!("/api/results/{}", result_id), Some(&taker), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "GET", &format!("/api/results/{}", result_id), Some(&creator), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unanswered_and_wrong_questions_score_zero() {
    let app = app();
    let creator = token_for(Uuid::new_v4(), "author");
    let quiz = create_geography_quiz(&app, &creator, false).await;
    let quiz_id = quiz["id"].as_str().unwrap().to_string();
    let arithmetic = find_question(&quiz, "2 + 2?");
    let arithmetic_id = arithmetic["id"].as_str().unwrap().to_string();
    let five = answer_id(arithmetic, "5");

    // The creator may take their own private quiz.
    let (status, session) = send(
        &app,
        "POST",
        &format!("/api/quizzes/{}/sessions", quiz_id),
        Some(&creator),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let session_id = session["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/sessions/{}/questions/{}/answer", session_id, arithmetic_id),
        Some(&creator),
        Some(json!({ "selected_answer_ids": [five] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, completed) = send(
        &app,
        "POST",
        &format!("/api/sessions/{}/complete", session_id),
        Some(&creator),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed["result"]["score"], 0);
    assert_eq!(completed["result"]["total_questions"], 2);
}

#[tokio::test]
async fn private_quiz_rejects_outsiders() {
    let app = app();
    let creator = token_for(Uuid::new_v4(), "author");
    let outsider = token_for(Uuid::new_v4(), "outsider");
    let quiz = create_geography_quiz(&app, &creator, false).await;
    let quiz_id = quiz["id"].as_str().unwrap().to_string();

    let (status, _) = send(&app, "GET", &format!("/api/quizzes/{}", quiz_id), Some(&outsider), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/quizzes/{}/sessions", quiz_id),
        Some(&outsider),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/quizzes/{}/sessions", Uuid::new_v4()),
        Some(&outsider),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stale_change_is_rejected_with_current_version() {
    let app = app();
    let creator = token_for(Uuid::new_v4(), "author");
    let outsider = token_for(Uuid::new_v4(), "outsider");
    let quiz = create_geography_quiz(&app, &creator, true).await;
    let quiz_id = quiz["id"].as_str().unwrap().to_string();
    assert_eq!(quiz["version"], 1);

    let uri = format!("/api/quizzes/{}/changes", quiz_id);
    let (status, updated) = send(
        &app,
        "POST",
        &uri,
        Some(&creator),
        Some(json!({
            "change_type": "QUIZ_UPDATED",
            "change_data": { "title": "Renamed" },
            "version": 1
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "apply: {}", updated);
    assert_eq!(updated["version"], 2);
    assert_eq!(updated["title"], "Renamed");

    let (status, body) = send(
        &app,
        "POST",
        &uri,
        Some(&creator),
        Some(json!({
            "changeType": "QUIZ_UPDATED",
            "changeData": { "title": "Lost update" },
            "version": 1
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["current_version"], 2);

    let (status, _) = send(
        &app,
        "POST",
        &uri,
        Some(&outsider),
        Some(json!({
            "change_type": "QUIZ_UPDATED",
            "change_data": { "title": "Hijack" },
            "version": 2
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, changes) = send(&app, "GET", &uri, Some(&creator), None).await;
    assert_eq!(status, StatusCode::OK);
    let changes = changes.as_array().unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0]["change_type"], "QUIZ_UPDATED");
    assert_eq!(changes[0]["version"], 2);
}

#[tokio::test]
async fn question_crud_advances_quiz_version() {
    let app = app();
    let creator = token_for(Uuid::new_v4(), "author");
    let quiz = create_geography_quiz(&app, &creator, false).await;
    let quiz_id = quiz["id"].as_str().unwrap().to_string();

    let (status, added) = send(
        &app,
        "POST",
        &format!("/api/quizzes/{}/questions", quiz_id),
        Some(&creator),
        Some(json!({
            "version": 1,
            "text": "Is Rust memory safe?",
            "question_type": "TRUE_FALSE",
            "answers": [
                { "text": "True", "is_correct": true },
                { "text": "False" }
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "add question: {}", added);
    assert_eq!(added["quiz_version"], 2);
    let question_id = added["question"]["id"].as_str().unwrap().to_string();

    let (status, updated) = send(
        &app,
        "PATCH",
        &format!("/api/quizzes/{}/questions/{}", quiz_id, question_id),
        Some(&creator),
        Some(json!({ "version": 2, "text": "Is safe Rust memory safe?" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "update question: {}", updated);
    assert_eq!(updated["quiz_version"], 3);
    assert_eq!(updated["question"]["text"], "Is safe Rust memory safe?");

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/quizzes/{}/questions/{}?version=2", quiz_id, question_id),
        Some(&creator),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, deleted) = send(
        &app,
        "DELETE",
        &format!("/api/quizzes/{}/questions/{}?version=3", quiz_id, question_id),
        Some(&creator),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["deleted"], true);
    assert_eq!(deleted["quiz_version"], 4);

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/quizzes/{}?version=4", quiz_id),
        Some(&creator),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", &format!("/api/quizzes/{}", quiz_id), Some(&creator), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn presence_requires_edit_rights() {
    let app = app();
    let creator = token_for(Uuid::new_v4(), "author");
    let outsider = token_for(Uuid::new_v4(), "outsider");
    let quiz = create_geography_quiz(&app, &creator, true).await;
    let quiz_id = quiz["id"].as_str().unwrap().to_string();

    let (status, snapshot) = send(
        &app,
        "GET",
        &format!("/api/quizzes/{}/presence", quiz_id),
        Some(&creator),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(snapshot["editors"].as_array().unwrap().is_empty());

    let (status, _) = send(
        &app,
        "GET",
        &format!("/api/quizzes/{}/presence", quiz_id),
        Some(&outsider),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn quiz_listings_by_visibility_and_relation() {
    let app = app();
    let creator_id = Uuid::new_v4();
    let creator = token_for(creator_id, "author");
    let helper_id = Uuid::new_v4();
    let helper = token_for(helper_id, "helper");
    let outsider = token_for(Uuid::new_v4(), "outsider");

    let public = create_geography_quiz(&app, &creator, true).await;
    let private = create_geography_quiz(&app, &creator, false).await;
    let public_id = public["id"].as_str().unwrap().to_string();
    let private_id = private["id"].as_str().unwrap().to_string();

    let (status, listed) = send(&app, "GET", "/api/quizzes/public", Some(&outsider), None).await;
    assert_eq!(status, StatusCode::OK);
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["id"], public_id.as_str());
    assert_eq!(listed[0]["question_count"], 2);
    assert!(listed[0].get("questions").is_none());

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/quizzes/{}/changes", private_id),
        Some(&creator),
        Some(json!({
            "change_type": "COLLABORATOR_ADDED",
            "change_data": { "user_id": helper_id },
            "version": 1
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, created) = send(&app, "GET", "/api/quizzes/created", Some(&creator), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created.as_array().unwrap().len(), 2);

    let (_, created) = send(&app, "GET", "/api/quizzes/created", Some(&helper), None).await;
    assert!(created.as_array().unwrap().is_empty());

    let (status, shared) = send(&app, "GET", "/api/quizzes/collaborated", Some(&helper), None).await;
    assert_eq!(status, StatusCode::OK);
    let shared = shared.as_array().unwrap();
    assert_eq!(shared.len(), 1);
    assert_eq!(shared[0]["id"], private_id.as_str());
}

#[tokio::test]
async fn access_token_query_is_limited_to_the_live_channel() {
    let app = app();
    let creator = token_for(Uuid::new_v4(), "author");
    let quiz = create_geography_quiz(&app, &creator, false).await;
    let quiz_id = quiz["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/quizzes?access_token={}", creator),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "missing_authorization");

    // Without upgrade headers the handshake itself fails, but auth has passed.
    let req = Request::builder()
        .method("GET")
        .uri(format!("/api/quizzes/{}/live?access_token={}", quiz_id, creator))
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_ne!(resp.status(), StatusCode::UNAUTHORIZED);
}
