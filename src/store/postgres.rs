use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

use super::{ContentStore, SessionStore};
use crate::error::{Error, Result};
use crate::models::quiz::{Answer, Question, QuestionType, Quiz};
use crate::models::quiz_change::QuizChange;
use crate::models::result::{QuestionResult, QuizResult};
use crate::models::session::{QuizSession, SessionAnswer, SubmittedResponse};

const FOREIGN_KEY_VIOLATION: &str = "23503";
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct QuizRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    is_public: bool,
    creator_id: Uuid,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct QuestionRow {
    id: Uuid,
    quiz_id: Uuid,
    text: String,
    question_type: String,
    order_index: i32,
    image_url: Option<String>,
    code_snippet: Option<String>,
    explanation: Option<String>,
    version: i64,
}

#[derive(Debug, FromRow)]
struct AnswerRow {
    id: Uuid,
    question_id: Uuid,
    text: String,
    is_correct: bool,
    order_index: i32,
    version: i64,
}

#[derive(Debug, FromRow)]
struct ChangeRow {
    id: Uuid,
    quiz_id: Uuid,
    author_id: Uuid,
    change_type: String,
    change_data: serde_json::Value,
    version: i64,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct SessionRow {
    id: Uuid,
    quiz_id: Uuid,
    user_id: Uuid,
    status: String,
    started_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
struct SessionAnswerRow {
    id: Uuid,
    session_id: Uuid,
    question_id: Uuid,
    response: Json<SubmittedResponse>,
    answered_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct ResultRow {
    id: Uuid,
    session_id: Uuid,
    quiz_id: Uuid,
    user_id: Uuid,
    score: i32,
    total_questions: i32,
    time_taken_seconds: i64,
    completed_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct QuestionResultRow {
    id: Uuid,
    result_id: Uuid,
    question_id: Uuid,
    is_correct: bool,
    response: Option<Json<SubmittedResponse>>,
}

impl TryFrom<SessionRow> for QuizSession {
    type Error = Error;

    fn try_from(row: SessionRow) -> Result<Self> {
        Ok(QuizSession {
            id: row.id,
            quiz_id: row.quiz_id,
            user_id: row.user_id,
            status: row.status.parse().map_err(Error::Internal)?,
            started_at: row.started_at,
            expires_at: row.expires_at,
            completed_at: row.completed_at,
        })
    }
}

impl From<SessionAnswerRow> for SessionAnswer {
    fn from(row: SessionAnswerRow) -> Self {
        SessionAnswer {
            id: row.id,
            session_id: row.session_id,
            question_id: row.question_id,
            response: row.response.0,
            answered_at: row.answered_at,
        }
    }
}

impl From<ChangeRow> for QuizChange {
    fn from(row: ChangeRow) -> Self {
        QuizChange {
            id: row.id,
            quiz_id: row.quiz_id,
            author_id: row.author_id,
            change_type: row.change_type,
            change_data: row.change_data,
            version: row.version,
            created_at: row.created_at,
        }
    }
}

/// Foreign-key and unique violations are expected outcomes of racing or
/// deleting referenced content, not infrastructure failures.
fn map_constraint(err: sqlx::Error, message: &str) -> Error {
    if let sqlx::Error::Database(db) = &err {
        match db.code().as_deref() {
            Some(FOREIGN_KEY_VIOLATION) | Some(UNIQUE_VIOLATION) => {
                return Error::state_conflict(message.to_string());
            }
            _ => {}
        }
    }
    Error::from(err)
}

impl PgStore {
    async fn load_quiz(&self, quiz_id: Uuid) -> Result<Quiz> {
        let row = sqlx::query_as::<_, QuizRow>(r#"SELECT * FROM quizzes WHERE id = $1"#)
            .bind(quiz_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found("Quiz not found"))?;

        let mut quizzes = self.assemble(vec![row]).await?;
        quizzes
            .pop()
            .ok_or_else(|| Error::Internal("quiz vanished while loading".to_string()))
    }

    /// Attaches collaborators, questions and answers to quiz rows with one
    /// query per table.
    async fn assemble(&self, rows: Vec<QuizRow>) -> Result<Vec<Quiz>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();

        let collaborators: Vec<(Uuid, Uuid)> = sqlx::query_as(
            r#"SELECT quiz_id, user_id FROM quiz_collaborators WHERE quiz_id = ANY($1)"#,
        )
        .bind(ids.clone())
        .fetch_all(&self.pool)
        .await?;

        let question_rows = sqlx::query_as::<_, QuestionRow>(
            r#"SELECT * FROM questions WHERE quiz_id = ANY($1) ORDER BY order_index, id"#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let question_ids: Vec<Uuid> = question_rows.iter().map(|q| q.id).collect();
        let answer_rows = sqlx::query_as::<_, AnswerRow>(
            r#"SELECT * FROM answers WHERE question_id = ANY($1) ORDER BY order_index, id"#,
        )
        .bind(question_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut answers_by_question: HashMap<Uuid, Vec<Answer>> = HashMap::new();
        for a in answer_rows {
            answers_by_question.entry(a.question_id).or_default().push(Answer {
                id: a.id,
                question_id: a.question_id,
                text: a.text,
                is_correct: a.is_correct,
                order_index: a.order_index,
                version: a.version,
            });
        }

        let mut questions_by_quiz: HashMap<Uuid, Vec<Question>> = HashMap::new();
        for q in question_rows {
            let question_type: QuestionType = q.question_type.parse().map_err(Error::Internal)?;
            questions_by_quiz.entry(q.quiz_id).or_default().push(Question {
                id: q.id,
                quiz_id: q.quiz_id,
                text: q.text,
                question_type,
                order_index: q.order_index,
                image_url: q.image_url,
                code_snippet: q.code_snippet,
                explanation: q.explanation,
                version: q.version,
                answers: answers_by_question.remove(&q.id).unwrap_or_default(),
            });
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let mut quiz = Quiz {
                    id: row.id,
                    title: row.title,
                    description: row.description,
                    is_public: row.is_public,
                    creator_id: row.creator_id,
                    questions: questions_by_quiz.remove(&row.id).unwrap_or_default(),
                    collaborators: collaborators
                        .iter()
                        .filter(|(quiz_id, _)| *quiz_id == row.id)
                        .map(|(_, user_id)| *user_id)
                        .collect(),
                    version: row.version,
                    created_at: row.created_at,
                    updated_at: row.updated_at,
                };
                quiz.sort_questions();
                quiz
            })
            .collect())
    }

    async fn write_children(tx: &mut Transaction<'_, Postgres>, quiz: &Quiz) -> Result<()> {
        sqlx::query(r#"DELETE FROM quiz_collaborators WHERE quiz_id = $1"#)
            .bind(quiz.id)
            .execute(&mut **tx)
            .await?;
        for user_id in &quiz.collaborators {
            sqlx::query(r#"INSERT INTO quiz_collaborators (quiz_id, user_id) VALUES ($1, $2)"#)
                .bind(quiz.id)
                .bind(user_id)
                .execute(&mut **tx)
                .await?;
        }

        let question_ids: Vec<Uuid> = quiz.questions.iter().map(|q| q.id).collect();
        sqlx::query(r#"DELETE FROM questions WHERE quiz_id = $1 AND NOT (id = ANY($2))"#)
            .bind(quiz.id)
            .bind(question_ids)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_constraint(e, "Question is referenced by sessions or results"))?;

        for question in &quiz.questions {
            let written = sqlx::query(
                r#"
                INSERT INTO questions (id, quiz_id, text, question_type, order_index, image_url, code_snippet, explanation, version)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (id) DO UPDATE SET
                    text = EXCLUDED.text,
                    question_type = EXCLUDED.question_type,
                    order_index = EXCLUDED.order_index,
                    image_url = EXCLUDED.image_url,
                    code_snippet = EXCLUDED.code_snippet,
                    explanation = EXCLUDED.explanation,
                    version = EXCLUDED.version
                WHERE questions.quiz_id = EXCLUDED.quiz_id
                "#,
            )
            .bind(question.id)
            .bind(quiz.id)
            .bind(&question.text)
            .bind(question.question_type.as_str())
            .bind(question.order_index)
            .bind(&question.image_url)
            .bind(&question.code_snippet)
            .bind(&question.explanation)
            .bind(question.version)
            .execute(&mut **tx)
            .await?;
            if written.rows_affected() == 0 {
                return Err(Error::Invalid(format!(
                    "Question id {} is already used by another quiz",
                    question.id
                )));
            }

            let answer_ids: Vec<Uuid> = question.answers.iter().map(|a| a.id).collect();
            sqlx::query(r#"DELETE FROM answers WHERE question_id = $1 AND NOT (id = ANY($2))"#)
                .bind(question.id)
                .bind(answer_ids)
                .execute(&mut **tx)
                .await?;

            for answer in &question.answers {
                let written = sqlx::query(
                    r#"
                    INSERT INTO answers (id, question_id, text, is_correct, order_index, version)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    ON CONFLICT (id) DO UPDATE SET
                        text = EXCLUDED.text,
                        is_correct = EXCLUDED.is_correct,
                        order_index = EXCLUDED.order_index,
                        version = EXCLUDED.version
                    WHERE answers.question_id = EXCLUDED.question_id
                    "#,
                )
                .bind(answer.id)
                .bind(question.id)
                .bind(&answer.text)
                .bind(answer.is_correct)
                .bind(answer.order_index)
                .bind(answer.version)
                .execute(&mut **tx)
                .await?;
                if written.rows_affected() == 0 {
                    return Err(Error::Invalid(format!(
                        "Answer id {} is already used by another question",
                        answer.id
                    )));
                }
            }
        }
        Ok(())
    }

    async fn load_result(&self, row: ResultRow) -> Result<QuizResult> {
        let question_rows = sqlx::query_as::<_, QuestionResultRow>(
            r#"SELECT id, result_id, question_id, is_correct, response
               FROM question_results WHERE result_id = $1 ORDER BY position"#,
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(QuizResult {
            id: row.id,
            session_id: row.session_id,
            quiz_id: row.quiz_id,
            user_id: row.user_id,
            score: row.score,
            total_questions: row.total_questions,
            time_taken_seconds: row.time_taken_seconds,
            completed_at: row.completed_at,
            question_results: question_rows
                .into_iter()
                .map(|q| QuestionResult {
                    id: q.id,
                    result_id: q.result_id,
                    question_id: q.question_id,
                    is_correct: q.is_correct,
                    response: q.response.map(|r| r.0),
                })
                .collect(),
        })
    }

    /// Distinguishes "no such session" from "session left ACTIVE" after a
    /// guarded update matched nothing.
    async fn inactive_session_error(&self, session_id: Uuid) -> Error {
        match self.get_session(session_id).await {
            Ok(session) => Error::state_conflict(format!(
                "Session {} is {} and can no longer change",
                session.id,
                session.status.as_str()
            )),
            Err(err) => err,
        }
    }
}

#[async_trait]
impl ContentStore for PgStore {
    async fn get_quiz(&self, quiz_id: Uuid) -> Result<Quiz> {
        self.load_quiz(quiz_id).await
    }

    async fn list_quizzes_for_user(&self, user_id: Uuid) -> Result<Vec<Quiz>> {
        let rows = sqlx::query_as::<_, QuizRow>(
            r#"
            SELECT q.* FROM quizzes q
            WHERE q.creator_id = $1
               OR EXISTS (SELECT 1 FROM quiz_collaborators c WHERE c.quiz_id = q.id AND c.user_id = $1)
            ORDER BY q.updated_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        self.assemble(rows).await
    }

    async fn list_public_quizzes(&self) -> Result<Vec<Quiz>> {
        let rows = sqlx::query_as::<_, QuizRow>(
            r#"SELECT * FROM quizzes WHERE is_public ORDER BY updated_at DESC"#,
        )
        .fetch_all(&self.pool)
        .await?;
        self.assemble(rows).await
    }

    async fn question_quiz_id(&self, question_id: Uuid) -> Result<Uuid> {
        let quiz_id: Option<Uuid> = sqlx::query_scalar(r#"SELECT quiz_id FROM questions WHERE id = $1"#)
            .bind(question_id)
            .fetch_optional(&self.pool)
            .await?;
        quiz_id.ok_or_else(|| Error::not_found("Question not found"))
    }

    async fn insert_quiz(&self, quiz: &Quiz) -> Result<Quiz> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO quizzes (id, title, description, is_public, creator_id, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(quiz.id)
        .bind(&quiz.title)
        .bind(&quiz.description)
        .bind(quiz.is_public)
        .bind(quiz.creator_id)
        .bind(quiz.version)
        .bind(quiz.created_at)
        .bind(quiz.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_constraint(e, "Quiz already exists"))?;

        Self::write_children(&mut tx, quiz).await?;
        tx.commit().await?;

        self.load_quiz(quiz.id).await
    }

    async fn save_quiz(&self, quiz: &Quiz, expected_version: i64, change: &QuizChange) -> Result<Quiz> {
        if quiz.version != expected_version + 1 {
            return Err(Error::Internal(format!(
                "quiz {} saved with version {} against expected {}",
                quiz.id, quiz.version, expected_version
            )));
        }

        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query(
            r#"
            UPDATE quizzes
            SET title = $3, description = $4, is_public = $5, version = $6, updated_at = $7
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(quiz.id)
        .bind(expected_version)
        .bind(&quiz.title)
        .bind(&quiz.description)
        .bind(quiz.is_public)
        .bind(quiz.version)
        .bind(quiz.updated_at)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            let current: Option<i64> =
                sqlx::query_scalar(r#"SELECT version FROM quizzes WHERE id = $1"#)
                    .bind(quiz.id)
                    .fetch_optional(&self.pool)
                    .await?;
            return Err(match current {
                Some(version) => Error::version_conflict("Quiz", version),
                None => Error::not_found("Quiz not found"),
            });
        }

        Self::write_children(&mut tx, quiz).await?;

        sqlx::query(
            r#"
            INSERT INTO quiz_changes (id, quiz_id, author_id, change_type, change_data, version, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(change.id)
        .bind(change.quiz_id)
        .bind(change.author_id)
        .bind(&change.change_type)
        .bind(&change.change_data)
        .bind(change.version)
        .bind(change.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        self.load_quiz(quiz.id).await
    }

    async fn delete_quiz(&self, quiz_id: Uuid, expected_version: i64) -> Result<()> {
        let deleted = sqlx::query(r#"DELETE FROM quizzes WHERE id = $1 AND version = $2"#)
            .bind(quiz_id)
            .bind(expected_version)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                map_constraint(e, "Quiz is referenced by sessions or results and cannot be deleted")
            })?;

        if deleted.rows_affected() == 0 {
            let current: Option<i64> =
                sqlx::query_scalar(r#"SELECT version FROM quizzes WHERE id = $1"#)
                    .bind(quiz_id)
                    .fetch_optional(&self.pool)
                    .await?;
            return Err(match current {
                Some(version) => Error::version_conflict("Quiz", version),
                None => Error::not_found("Quiz not found"),
            });
        }
        Ok(())
    }

    async fn list_changes(&self, quiz_id: Uuid) -> Result<Vec<QuizChange>> {
        let rows = sqlx::query_as::<_, ChangeRow>(
            r#"SELECT * FROM quiz_changes WHERE quiz_id = $1 ORDER BY version, created_at"#,
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(QuizChange::from).collect())
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn start_session(&self, session: &QuizSession) -> Result<Option<QuizSession>> {
        let mut tx = self.pool.begin().await?;

        let retired = sqlx::query_as::<_, SessionRow>(
            r#"
            UPDATE quiz_sessions SET status = 'EXPIRED'
            WHERE user_id = $1 AND quiz_id = $2 AND status = 'ACTIVE'
            RETURNING *
            "#,
        )
        .bind(session.user_id)
        .bind(session.quiz_id)
        .fetch_optional(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO quiz_sessions (id, quiz_id, user_id, status, started_at, expires_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(session.id)
        .bind(session.quiz_id)
        .bind(session.user_id)
        .bind(session.status.as_str())
        .bind(session.started_at)
        .bind(session.expires_at)
        .bind(session.completed_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_constraint(e, "Another session for this quiz was started concurrently"))?;

        tx.commit().await?;
        retired.map(QuizSession::try_from).transpose()
    }

    async fn get_session(&self, session_id: Uuid) -> Result<QuizSession> {
        let row = sqlx::query_as::<_, SessionRow>(r#"SELECT * FROM quiz_sessions WHERE id = $1"#)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found("Session not found"))?;
        QuizSession::try_from(row)
    }

    async fn find_active_session(&self, user_id: Uuid, quiz_id: Uuid) -> Result<Option<QuizSession>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"SELECT * FROM quiz_sessions WHERE user_id = $1 AND quiz_id = $2 AND status = 'ACTIVE'"#,
        )
        .bind(user_id)
        .bind(quiz_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(QuizSession::try_from).transpose()
    }

    async fn list_active_sessions(&self, user_id: Uuid) -> Result<Vec<QuizSession>> {
        let rows = sqlx::query_as::<_, SessionRow>(
            r#"SELECT * FROM quiz_sessions WHERE user_id = $1 AND status = 'ACTIVE' ORDER BY started_at DESC"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(QuizSession::try_from).collect()
    }

    async fn upsert_answer(&self, answer: &SessionAnswer) -> Result<SessionAnswer> {
        let row = sqlx::query_as::<_, SessionAnswerRow>(
            r#"
            INSERT INTO session_answers (id, session_id, question_id, response, answered_at)
            SELECT $1, $2, $3, $4, $5
            WHERE EXISTS (SELECT 1 FROM quiz_sessions WHERE id = $2 AND status = 'ACTIVE')
            ON CONFLICT (session_id, question_id) DO UPDATE SET
                response = EXCLUDED.response,
                answered_at = EXCLUDED.answered_at
            RETURNING id, session_id, question_id, response, answered_at
            "#,
        )
        .bind(answer.id)
        .bind(answer.session_id)
        .bind(answer.question_id)
        .bind(Json(&answer.response))
        .bind(answer.answered_at)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(SessionAnswer::from(row)),
            None => Err(self.inactive_session_error(answer.session_id).await),
        }
    }

    async fn list_answers(&self, session_id: Uuid) -> Result<Vec<SessionAnswer>> {
        let rows = sqlx::query_as::<_, SessionAnswerRow>(
            r#"SELECT id, session_id, question_id, response, answered_at FROM session_answers WHERE session_id = $1"#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(SessionAnswer::from).collect())
    }

    async fn expire_session(&self, session_id: Uuid) -> Result<QuizSession> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"UPDATE quiz_sessions SET status = 'EXPIRED' WHERE id = $1 AND status = 'ACTIVE' RETURNING *"#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => QuizSession::try_from(row),
            None => Err(self.inactive_session_error(session_id).await),
        }
    }

    async fn complete_session(
        &self,
        session_id: Uuid,
        completed_at: DateTime<Utc>,
        result: &QuizResult,
    ) -> Result<QuizSession> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            UPDATE quiz_sessions SET status = 'COMPLETED', completed_at = $2
            WHERE id = $1 AND status = 'ACTIVE'
            RETURNING *
            "#,
        )
        .bind(session_id)
        .bind(completed_at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Err(self.inactive_session_error(session_id).await);
        };

        sqlx::query(
            r#"
            INSERT INTO quiz_results (id, session_id, quiz_id, user_id, score, total_questions, time_taken_seconds, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(result.id)
        .bind(result.session_id)
        .bind(result.quiz_id)
        .bind(result.user_id)
        .bind(result.score)
        .bind(result.total_questions)
        .bind(result.time_taken_seconds)
        .bind(result.completed_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_constraint(e, "Session already has a result"))?;

        for (position, qr) in result.question_results.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO question_results (id, result_id, question_id, is_correct, response, position)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(qr.id)
            .bind(qr.result_id)
            .bind(qr.question_id)
            .bind(qr.is_correct)
            .bind(qr.response.as_ref().map(Json))
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        QuizSession::try_from(row)
    }

    async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64> {
        let done = sqlx::query(
            r#"UPDATE quiz_sessions SET status = 'EXPIRED' WHERE status = 'ACTIVE' AND expires_at <= $1"#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(done.rows_affected())
    }

    async fn get_result(&self, result_id: Uuid) -> Result<QuizResult> {
        let row = sqlx::query_as::<_, ResultRow>(r#"SELECT * FROM quiz_results WHERE id = $1"#)
            .bind(result_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found("Result not found"))?;
        self.load_result(row).await
    }

    async fn get_result_for_session(&self, session_id: Uuid) -> Result<QuizResult> {
        let row = sqlx::query_as::<_, ResultRow>(r#"SELECT * FROM quiz_results WHERE session_id = $1"#)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found("Result not found"))?;
        self.load_result(row).await
    }

    async fn list_results(&self, user_id: Uuid, quiz_id: Option<Uuid>) -> Result<Vec<QuizResult>> {
        let rows = sqlx::query_as::<_, ResultRow>(
            r#"
            SELECT * FROM quiz_results
            WHERE user_id = $1 AND ($2::uuid IS NULL OR quiz_id = $2)
            ORDER BY completed_at DESC
            "#,
        )
        .bind(user_id)
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            results.push(self.load_result(row).await?);
        }
        Ok(results)
    }
}
