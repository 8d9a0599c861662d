use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::dto::session_dto::{AnswerOption, SessionQuestion};
use crate::error::{Error, Result};
use crate::models::quiz::{Question, QuestionType};
use crate::models::result::QuizResult;
use crate::models::session::{QuizSession, SessionAnswer, SubmittedResponse};
use crate::services::result_service::{aggregate, GradedQuestion};
use crate::services::scoring_service::ScoringService;
use crate::store::{ContentStore, SessionStore};

#[derive(Clone)]
pub struct SessionService {
    content: Arc<dyn ContentStore>,
    sessions: Arc<dyn SessionStore>,
    ttl: Duration,
}

impl SessionService {
    pub fn new(content: Arc<dyn ContentStore>, sessions: Arc<dyn SessionStore>, ttl: Duration) -> Self {
        Self {
            content,
            sessions,
            ttl,
        }
    }

    pub async fn start(&self, quiz_id: Uuid, caller: Uuid) -> Result<QuizSession> {
        let quiz = self.content.get_quiz(quiz_id).await?;
        if !quiz.can_view(caller) {
            return Err(Error::Unauthorized(
                "You don't have access to this quiz".to_string(),
            ));
        }

        let session = QuizSession::start(quiz.id, caller, Utc::now(), self.ttl);
        if let Some(retired) = self.sessions.start_session(&session).await? {
            tracing::info!(
                session_id = %retired.id,
                %quiz_id,
                user_id = %caller,
                "retired previous active session"
            );
        }
        tracing::info!(session_id = %session.id, %quiz_id, user_id = %caller, "quiz session started");
        Ok(session)
    }

    pub async fn get_session(&self, session_id: Uuid, caller: Uuid) -> Result<QuizSession> {
        let session = self.sessions.get_session(session_id).await?;
        ensure_owner(&session, caller)?;
        Ok(session)
    }

    /// Questions in order with their options, correct flags withheld, plus
    /// the caller's current response for each.
    pub async fn get_session_questions(&self, session_id: Uuid, caller: Uuid) -> Result<Vec<SessionQuestion>> {
        let session = self.active_owned(session_id, caller).await?;
        let quiz = self.content.get_quiz(session.quiz_id).await?;
        let mut answers: HashMap<Uuid, SubmittedResponse> = self
            .sessions
            .list_answers(session.id)
            .await?
            .into_iter()
            .map(|a| (a.question_id, a.response))
            .collect();

        Ok(quiz
            .questions
            .into_iter()
            .map(|q| SessionQuestion {
                response: answers.remove(&q.id),
                id: q.id,
                text: q.text,
                question_type: q.question_type,
                order_index: q.order_index,
                image_url: q.image_url,
                code_snippet: q.code_snippet,
                options: q
                    .answers
                    .into_iter()
                    .map(|a| AnswerOption {
                        id: a.id,
                        text: a.text,
                        order_index: a.order_index,
                    })
                    .collect(),
            })
            .collect())
    }

    pub async fn list_active_sessions(&self, caller: Uuid) -> Result<Vec<QuizSession>> {
        self.sessions.list_active_sessions(caller).await
    }

    /// Stores the caller's response for one question, replacing any earlier
    /// one. Scoring waits until completion.
    pub async fn submit_answer(
        &self,
        session_id: Uuid,
        question_id: Uuid,
        response: SubmittedResponse,
        caller: Uuid,
    ) -> Result<SessionAnswer> {
        let session = self.active_owned(session_id, caller).await?;
        let quiz = self.content.get_quiz(session.quiz_id).await?;
        let question = match quiz.question(question_id) {
            Some(q) => q,
            None => return Err(self.missing_question(question_id).await),
        };

        validate_response(question, &response)?;

        let saved = self
            .sessions
            .upsert_answer(&SessionAnswer {
                id: Uuid::new_v4(),
                session_id: session.id,
                question_id,
                response,
                answered_at: Utc::now(),
            })
            .await
            .map_err(|e| lost_race_to_unauthorized(e, &session))?;

        tracing::debug!(%session_id, %question_id, "answer saved");
        Ok(saved)
    }

    /// Scores every question of the quiz and moves the session to
    /// `COMPLETED` together with its result.
    pub async fn complete(&self, session_id: Uuid, caller: Uuid) -> Result<(QuizSession, QuizResult)> {
        let session = self.active_owned(session_id, caller).await?;
        let quiz = self.content.get_quiz(session.quiz_id).await?;
        let mut answers: HashMap<Uuid, SubmittedResponse> = self
            .sessions
            .list_answers(session.id)
            .await?
            .into_iter()
            .map(|a| (a.question_id, a.response))
            .collect();

        let graded: Vec<GradedQuestion> = quiz
            .questions
            .iter()
            .map(|q| {
                let response = answers.remove(&q.id);
                GradedQuestion {
                    question_id: q.id,
                    is_correct: ScoringService::score_question(q, response.as_ref()),
                    response,
                }
            })
            .collect();

        let completed_at = Utc::now();
        let result = aggregate(&session, completed_at, graded);
        let completed = self
            .sessions
            .complete_session(session.id, completed_at, &result)
            .await?;

        tracing::info!(
            %session_id,
            quiz_id = %quiz.id,
            score = result.score,
            total = result.total_questions,
            "quiz session completed"
        );
        Ok((completed, result))
    }

    pub async fn expire(&self, session_id: Uuid, caller: Uuid) -> Result<QuizSession> {
        let session = self.sessions.get_session(session_id).await?;
        ensure_owner(&session, caller)?;
        ensure_active(&session)?;

        let expired = self.sessions.expire_session(session.id).await?;
        tracing::info!(%session_id, "quiz session expired by owner");
        Ok(expired)
    }

    /// Moves every overdue `ACTIVE` session to `EXPIRED`.
    pub async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64> {
        let count = self.sessions.expire_overdue(now).await?;
        if count > 0 {
            tracing::info!(count, "expired overdue quiz sessions");
        }
        Ok(count)
    }

    async fn active_owned(&self, session_id: Uuid, caller: Uuid) -> Result<QuizSession> {
        let session = self.sessions.get_session(session_id).await?;
        ensure_owner(&session, caller)?;
        ensure_active(&session)?;
        if session.is_overdue(Utc::now()) {
            if let Err(e) = self.sessions.expire_session(session.id).await {
                tracing::debug!(%session_id, error = %e, "overdue session changed state concurrently");
            }
            return Err(Error::Unauthorized("This session has expired".to_string()));
        }
        Ok(session)
    }

    /// A question outside the session's quiz is a capability failure; one
    /// that does not exist anywhere is not found.
    async fn missing_question(&self, question_id: Uuid) -> Error {
        match self.content.question_quiz_id(question_id).await {
            Ok(owner) => {
                tracing::debug!(%question_id, quiz_id = %owner, "question from another quiz");
                Error::Unauthorized("Question does not belong to this quiz".to_string())
            }
            Err(err) => err,
        }
    }
}

fn ensure_owner(session: &QuizSession, caller: Uuid) -> Result<()> {
    if !session.is_owned_by(caller) {
        return Err(Error::Unauthorized(
            "You don't have access to this session".to_string(),
        ));
    }
    Ok(())
}

fn ensure_active(session: &QuizSession) -> Result<()> {
    if !session.is_active() {
        return Err(Error::Unauthorized(
            "This session is no longer active".to_string(),
        ));
    }
    Ok(())
}

/// A session that left `ACTIVE` between our check and the upsert reads the
/// same as one that was never active.
fn lost_race_to_unauthorized(err: Error, session: &QuizSession) -> Error {
    match err {
        Error::Conflict { .. } => {
            tracing::debug!(session_id = %session.id, "session closed while saving answer");
            Error::Unauthorized("This session is no longer active".to_string())
        }
        other => other,
    }
}

fn validate_response(question: &Question, response: &SubmittedResponse) -> Result<()> {
    if response.is_empty() {
        return Err(Error::Invalid("Response must not be empty".to_string()));
    }

    let kind = question.question_type;
    match response {
        SubmittedResponse::Selected(ids) => {
            if !(kind.is_choice() || kind.accepts_any_response()) {
                return Err(Error::Invalid(
                    "Short-answer questions take a text response".to_string(),
                ));
            }
            if let Some(foreign) = ids.iter().find(|id| question.answer(**id).is_none()) {
                return Err(Error::Invalid(format!(
                    "Answer {} does not belong to question {}",
                    foreign, question.id
                )));
            }
        }
        SubmittedResponse::Text(_) => {
            if !(kind == QuestionType::ShortAnswer || kind.accepts_any_response()) {
                return Err(Error::Invalid(
                    "Choice questions take selected answer ids".to_string(),
                ));
            }
        }
    }
    Ok(())
}
