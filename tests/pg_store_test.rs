use std::collections::BTreeSet;
use std::env;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

use quiz_engine::{
    config::Config,
    database::pool::{create_pool, run_migrations},
    error::Error,
    models::{
        quiz::{Answer, Question, QuestionType, Quiz, INITIAL_VERSION},
        session::{QuizSession, SessionAnswer, SessionStatus, SubmittedResponse},
    },
    services::session_service::SessionService,
    store::{ContentStore, PgStore, SessionStore},
};

async fn pg_store() -> Arc<PgStore> {
    dotenvy::dotenv().ok();
    env::set_var("SERVER_ADDRESS", "127.0.0.1:0");
    env::set_var("JWT_SECRET", "test_secret_key");
    env::set_var("STORE", "postgres");

    let config = Config::from_env().expect("config");
    let pool = create_pool(&config).await.expect("pool");
    run_migrations(&pool).await.expect("migrations");
    Arc::new(PgStore::new(pool))
}

fn quiz_with_one_question(creator: Uuid) -> Quiz {
    let mut quiz = Quiz::new(creator, "Pg quiz".into(), None, true);
    let question_id = Uuid::new_v4();
    quiz.questions.push(Question {
        id: question_id,
        quiz_id: quiz.id,
        text: "2 + 2?".into(),
        question_type: QuestionType::SingleChoice,
        order_index: 0,
        image_url: None,
        code_snippet: None,
        explanation: None,
        version: INITIAL_VERSION,
        answers: vec![
            Answer {
                id: Uuid::new_v4(),
                question_id,
                text: "4".into(),
                is_correct: true,
                order_index: 0,
                version: INITIAL_VERSION,
            },
            Answer {
                id: Uuid::new_v4(),
                question_id,
                text: "5".into(),
                is_correct: false,
                order_index: 1,
                version: INITIAL_VERSION,
            },
        ],
    });
    quiz
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a disposable postgres"]
async fn postgres_session_lifecycle() {
    let store = pg_store().await;
    let creator = Uuid::new_v4();
    let taker = Uuid::new_v4();

    let quiz = assert_ok!(store.insert_quiz(&quiz_with_one_question(creator)).await);
    let loaded = assert_ok!(store.get_quiz(quiz.id).await);
    assert_eq!(loaded.questions.len(), 1);
    assert_eq!(loaded.questions[0].answers.len(), 2);

    let service = SessionService::new(store.clone(), store.clone(), Duration::hours(1));
    let session = assert_ok!(service.start(quiz.id, taker).await);
    assert_eq!(session.status, SessionStatus::Active);

    let question = &loaded.questions[0];
    let correct = question.correct_answers()[0].id;
    assert_ok!(
        service
            .submit_answer(
                session.id,
                question.id,
                SubmittedResponse::Selected(BTreeSet::from([correct])),
                taker,
            )
            .await
    );

    let (completed, result) = assert_ok!(service.complete(session.id, taker).await);
    assert_eq!(completed.status, SessionStatus::Completed);
    assert_eq!(result.score, 1);

    let stored = assert_ok!(store.get_result(result.id).await);
    assert_eq!(stored.question_results.len(), 1);

    // The quiz is referenced by a result now.
    assert_err!(store.delete_quiz(quiz.id, quiz.version).await);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a disposable postgres"]
async fn postgres_rejects_answers_for_finished_sessions() {
    let store = pg_store().await;
    let creator = Uuid::new_v4();
    let quiz = assert_ok!(store.insert_quiz(&quiz_with_one_question(creator)).await);

    let session = QuizSession::start(quiz.id, creator, Utc::now(), Duration::hours(1));
    let retired = assert_ok!(store.start_session(&session).await);
    assert!(retired.is_none());
    let expired = assert_ok!(store.expire_session(session.id).await);
    assert_eq!(expired.status, SessionStatus::Expired);

    let err = store
        .upsert_answer(&SessionAnswer {
            id: Uuid::new_v4(),
            session_id: session.id,
            question_id: quiz.questions[0].id,
            response: SubmittedResponse::Text("4".into()),
            answered_at: Utc::now(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict { .. }));
}
