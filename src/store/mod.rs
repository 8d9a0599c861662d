//! Persistence seams for the engine.
//!
//! Services only talk to [`ContentStore`] and [`SessionStore`]. Both carry the
//! compare-and-swap semantics the engine relies on, so the services never need
//! any locking of their own:
//!
//! - quiz content is written with an expected version and rejected with
//!   `Error::Conflict` when the stored version moved on;
//! - session status changes only happen from `ACTIVE`, and completion writes
//!   the result and the status in one unit.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::quiz::Quiz;
use crate::models::quiz_change::QuizChange;
use crate::models::result::QuizResult;
use crate::models::session::{QuizSession, SessionAnswer};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Loads the whole aggregate, questions and answers included.
    async fn get_quiz(&self, quiz_id: Uuid) -> Result<Quiz>;

    /// Quizzes the user created or collaborates on.
    async fn list_quizzes_for_user(&self, user_id: Uuid) -> Result<Vec<Quiz>>;

    /// Every public quiz, most recently updated first.
    async fn list_public_quizzes(&self) -> Result<Vec<Quiz>>;

    /// Which quiz a question belongs to; `NotFound` if no quiz has it.
    async fn question_quiz_id(&self, question_id: Uuid) -> Result<Uuid>;

    async fn insert_quiz(&self, quiz: &Quiz) -> Result<Quiz>;

    /// Replaces the aggregate if the stored version still equals
    /// `expected_version`, and appends `change` to the audit log in the same
    /// unit. `quiz.version` must already be `expected_version + 1`.
    async fn save_quiz(&self, quiz: &Quiz, expected_version: i64, change: &QuizChange) -> Result<Quiz>;

    /// Fails with `Conflict` on a version mismatch or while sessions or
    /// results still reference the quiz.
    async fn delete_quiz(&self, quiz_id: Uuid, expected_version: i64) -> Result<()>;

    /// Audit log, oldest first.
    async fn list_changes(&self, quiz_id: Uuid) -> Result<Vec<QuizChange>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Retires any `ACTIVE` session of the same user and quiz to `EXPIRED` and
    /// inserts `session`, atomically. Returns the retired session, if any.
    async fn start_session(&self, session: &QuizSession) -> Result<Option<QuizSession>>;

    async fn get_session(&self, session_id: Uuid) -> Result<QuizSession>;

    async fn find_active_session(&self, user_id: Uuid, quiz_id: Uuid) -> Result<Option<QuizSession>>;

    async fn list_active_sessions(&self, user_id: Uuid) -> Result<Vec<QuizSession>>;

    /// Insert or replace the answer for `(session_id, question_id)`. Fails with
    /// `Conflict` once the session has left `ACTIVE`.
    async fn upsert_answer(&self, answer: &SessionAnswer) -> Result<SessionAnswer>;

    async fn list_answers(&self, session_id: Uuid) -> Result<Vec<SessionAnswer>>;

    /// `ACTIVE -> EXPIRED`; `Conflict` if the session is no longer active.
    async fn expire_session(&self, session_id: Uuid) -> Result<QuizSession>;

    /// `ACTIVE -> COMPLETED` together with persisting `result`. Either both
    /// land or neither does.
    async fn complete_session(
        &self,
        session_id: Uuid,
        completed_at: DateTime<Utc>,
        result: &QuizResult,
    ) -> Result<QuizSession>;

    /// Expires every `ACTIVE` session whose deadline is at or before `now`.
    async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64>;

    async fn get_result(&self, result_id: Uuid) -> Result<QuizResult>;

    async fn get_result_for_session(&self, session_id: Uuid) -> Result<QuizResult>;

    /// Newest first, optionally restricted to one quiz.
    async fn list_results(&self, user_id: Uuid, quiz_id: Option<Uuid>) -> Result<Vec<QuizResult>>;
}
