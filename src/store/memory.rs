use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ContentStore, SessionStore};
use crate::error::{Error, Result};
use crate::models::quiz::Quiz;
use crate::models::quiz_change::QuizChange;
use crate::models::result::QuizResult;
use crate::models::session::{QuizSession, SessionAnswer, SessionStatus};

#[derive(Default)]
struct MemoryState {
    quizzes: HashMap<Uuid, Quiz>,
    changes: Vec<QuizChange>,
    sessions: HashMap<Uuid, QuizSession>,
    answers: HashMap<(Uuid, Uuid), SessionAnswer>,
    results: HashMap<Uuid, QuizResult>,
}

/// Process-local store backing both traits with one lock, so every trait
/// method is a single atomic step. Used by tests and `STORE=memory` runs.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn session_not_active(session: &QuizSession) -> Error {
    Error::state_conflict(format!(
        "Session {} is {} and can no longer change",
        session.id,
        session.status.as_str()
    ))
}

/// Question and answer ids are unique across all quizzes, and within `quiz`.
fn check_foreign_ids(state: &MemoryState, quiz: &Quiz) -> Result<()> {
    let mut question_ids = HashSet::new();
    let mut answer_ids = HashSet::new();
    for question in &quiz.questions {
        if !question_ids.insert(question.id) {
            return Err(Error::Invalid(format!(
                "Question id {} appears twice",
                question.id
            )));
        }
        if let Some(answer) = question.answers.iter().find(|a| !answer_ids.insert(a.id)) {
            return Err(Error::Invalid(format!("Answer id {} appears twice", answer.id)));
        }
    }
    for other in state.quizzes.values().filter(|q| q.id != quiz.id) {
        for question in &quiz.questions {
            if other.question(question.id).is_some() {
                return Err(Error::Invalid(format!(
                    "Question id {} is already used by another quiz",
                    question.id
                )));
            }
            let clash = question
                .answers
                .iter()
                .find(|a| other.questions.iter().any(|oq| oq.answer(a.id).is_some()));
            if let Some(answer) = clash {
                return Err(Error::Invalid(format!(
                    "Answer id {} is already used by another question",
                    answer.id
                )));
            }
        }
    }
    Ok(())
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn get_quiz(&self, quiz_id: Uuid) -> Result<Quiz> {
        let state = self.state.read().await;
        state
            .quizzes
            .get(&quiz_id)
            .cloned()
            .ok_or_else(|| Error::not_found("Quiz not found"))
    }

    async fn list_quizzes_for_user(&self, user_id: Uuid) -> Result<Vec<Quiz>> {
        let state = self.state.read().await;
        let mut quizzes: Vec<Quiz> = state
            .quizzes
            .values()
            .filter(|q| q.can_edit(user_id))
            .cloned()
            .collect();
        quizzes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(quizzes)
    }

    async fn list_public_quizzes(&self) -> Result<Vec<Quiz>> {
        let state = self.state.read().await;
        let mut quizzes: Vec<Quiz> = state
            .quizzes
            .values()
            .filter(|q| q.is_public)
            .cloned()
            .collect();
        quizzes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(quizzes)
    }

    async fn question_quiz_id(&self, question_id: Uuid) -> Result<Uuid> {
        let state = self.state.read().await;
        state
            .quizzes
            .values()
            .find(|q| q.question(question_id).is_some())
            .map(|q| q.id)
            .ok_or_else(|| Error::not_found("Question not found"))
    }

    async fn insert_quiz(&self, quiz: &Quiz) -> Result<Quiz> {
        let mut state = self.state.write().await;
        if state.quizzes.contains_key(&quiz.id) {
            return Err(Error::state_conflict("Quiz already exists"));
        }
        check_foreign_ids(&state, quiz)?;
        let mut stored = quiz.clone();
        stored.sort_questions();
        state.quizzes.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn save_quiz(&self, quiz: &Quiz, expected_version: i64, change: &QuizChange) -> Result<Quiz> {
        if quiz.version != expected_version + 1 {
            return Err(Error::Internal(format!(
                "quiz {} saved with version {} against expected {}",
                quiz.id, quiz.version, expected_version
            )));
        }

        let mut state = self.state.write().await;
        let current = state
            .quizzes
            .get(&quiz.id)
            .ok_or_else(|| Error::not_found("Quiz not found"))?;
        if current.version != expected_version {
            return Err(Error::version_conflict("Quiz", current.version));
        }

        let removed: Vec<Uuid> = current
            .questions
            .iter()
            .filter(|q| quiz.question(q.id).is_none())
            .map(|q| q.id)
            .collect();
        let referenced = state.answers.keys().any(|(_, qid)| removed.contains(qid))
            || state.results.values().any(|r| {
                r.question_results
                    .iter()
                    .any(|qr| removed.contains(&qr.question_id))
            });
        if referenced {
            return Err(Error::state_conflict(
                "Question is referenced by sessions or results",
            ));
        }

        check_foreign_ids(&state, quiz)?;

        let mut stored = quiz.clone();
        stored.sort_questions();
        state.quizzes.insert(stored.id, stored.clone());
        state.changes.push(change.clone());
        Ok(stored)
    }

    async fn delete_quiz(&self, quiz_id: Uuid, expected_version: i64) -> Result<()> {
        let mut state = self.state.write().await;
        let current = state
            .quizzes
            .get(&quiz_id)
            .ok_or_else(|| Error::not_found("Quiz not found"))?;
        if current.version != expected_version {
            return Err(Error::version_conflict("Quiz", current.version));
        }

        let referenced = state.sessions.values().any(|s| s.quiz_id == quiz_id)
            || state.results.values().any(|r| r.quiz_id == quiz_id);
        if referenced {
            return Err(Error::state_conflict(
                "Quiz is referenced by sessions or results and cannot be deleted",
            ));
        }

        state.quizzes.remove(&quiz_id);
        state.changes.retain(|c| c.quiz_id != quiz_id);
        Ok(())
    }

    async fn list_changes(&self, quiz_id: Uuid) -> Result<Vec<QuizChange>> {
        let state = self.state.read().await;
        Ok(state
            .changes
            .iter()
            .filter(|c| c.quiz_id == quiz_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn start_session(&self, session: &QuizSession) -> Result<Option<QuizSession>> {
        let mut state = self.state.write().await;
        let mut retired = None;
        for existing in state.sessions.values_mut() {
            if existing.user_id == session.user_id
                && existing.quiz_id == session.quiz_id
                && existing.is_active()
            {
                existing.status = SessionStatus::Expired;
                retired = Some(existing.clone());
            }
        }
        state.sessions.insert(session.id, session.clone());
        Ok(retired)
    }

    async fn get_session(&self, session_id: Uuid) -> Result<QuizSession> {
        let state = self.state.read().await;
        state
            .sessions
            .get(&session_id)
            .cloned()
            .ok_or_else(|| Error::not_found("Session not found"))
    }

    async fn find_active_session(&self, user_id: Uuid, quiz_id: Uuid) -> Result<Option<QuizSession>> {
        let state = self.state.read().await;
        Ok(state
            .sessions
            .values()
            .find(|s| s.user_id == user_id && s.quiz_id == quiz_id && s.is_active())
            .cloned())
    }

    async fn list_active_sessions(&self, user_id: Uuid) -> Result<Vec<QuizSession>> {
        let state = self.state.read().await;
        let mut sessions: Vec<QuizSession> = state
            .sessions
            .values()
            .filter(|s| s.user_id == user_id && s.is_active())
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(sessions)
    }

    async fn upsert_answer(&self, answer: &SessionAnswer) -> Result<SessionAnswer> {
        let mut state = self.state.write().await;
        let session = state
            .sessions
            .get(&answer.session_id)
            .ok_or_else(|| Error::not_found("Session not found"))?;
        if !session.is_active() {
            return Err(session_not_active(session));
        }

        let key = (answer.session_id, answer.question_id);
        let stored = match state.answers.get(&key) {
            Some(existing) => SessionAnswer {
                id: existing.id,
                ..answer.clone()
            },
            None => answer.clone(),
        };
        state.answers.insert(key, stored.clone());
        Ok(stored)
    }

    async fn list_answers(&self, session_id: Uuid) -> Result<Vec<SessionAnswer>> {
        let state = self.state.read().await;
        Ok(state
            .answers
            .values()
            .filter(|a| a.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn expire_session(&self, session_id: Uuid) -> Result<QuizSession> {
        let mut state = self.state.write().await;
        let session = state
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| Error::not_found("Session not found"))?;
        if !session.is_active() {
            return Err(session_not_active(session));
        }
        session.status = SessionStatus::Expired;
        Ok(session.clone())
    }

    async fn complete_session(
        &self,
        session_id: Uuid,
        completed_at: DateTime<Utc>,
        result: &QuizResult,
    ) -> Result<QuizSession> {
        let mut state = self.state.write().await;
        if state.results.values().any(|r| r.session_id == session_id) {
            return Err(Error::state_conflict("Session already has a result"));
        }
        let session = state
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| Error::not_found("Session not found"))?;
        if !session.is_active() {
            return Err(session_not_active(session));
        }
        session.status = SessionStatus::Completed;
        session.completed_at = Some(completed_at);
        let completed = session.clone();
        state.results.insert(result.id, result.clone());
        Ok(completed)
    }

    async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut state = self.state.write().await;
        let mut count = 0;
        for session in state.sessions.values_mut() {
            if session.is_overdue(now) {
                session.status = SessionStatus::Expired;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn get_result(&self, result_id: Uuid) -> Result<QuizResult> {
        let state = self.state.read().await;
        state
            .results
            .get(&result_id)
            .cloned()
            .ok_or_else(|| Error::not_found("Result not found"))
    }

    async fn get_result_for_session(&self, session_id: Uuid) -> Result<QuizResult> {
        let state = self.state.read().await;
        state
            .results
            .values()
            .find(|r| r.session_id == session_id)
            .cloned()
            .ok_or_else(|| Error::not_found("Result not found"))
    }

    async fn list_results(&self, user_id: Uuid, quiz_id: Option<Uuid>) -> Result<Vec<QuizResult>> {
        let state = self.state.read().await;
        let mut results: Vec<QuizResult> = state
            .results
            .values()
            .filter(|r| r.user_id == user_id)
            .filter(|r| quiz_id.map_or(true, |id| r.quiz_id == id))
            .cloned()
            .collect();
        results.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(results)
    }
}
