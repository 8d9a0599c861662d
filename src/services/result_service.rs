use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::result::{QuestionResult, QuizResult};
use crate::models::session::{QuizSession, SubmittedResponse};
use crate::store::SessionStore;

/// One scored question on its way into a result.
#[derive(Debug, Clone)]
pub struct GradedQuestion {
    pub question_id: Uuid,
    pub is_correct: bool,
    pub response: Option<SubmittedResponse>,
}

/// Folds per-question verdicts into a result for `session`, in the order
/// given. Elapsed time is whole seconds and never negative.
pub fn aggregate(
    session: &QuizSession,
    completed_at: DateTime<Utc>,
    graded: Vec<GradedQuestion>,
) -> QuizResult {
    let result_id = Uuid::new_v4();
    let score = graded.iter().filter(|g| g.is_correct).count() as i32;
    let total_questions = graded.len() as i32;
    let time_taken_seconds = (completed_at - session.started_at).num_seconds().max(0);

    let question_results = graded
        .into_iter()
        .map(|g| QuestionResult {
            id: Uuid::new_v4(),
            result_id,
            question_id: g.question_id,
            is_correct: g.is_correct,
            response: g.response,
        })
        .collect();

    QuizResult {
        id: result_id,
        session_id: session.id,
        quiz_id: session.quiz_id,
        user_id: session.user_id,
        score,
        total_questions,
        time_taken_seconds,
        completed_at,
        question_results,
    }
}

#[derive(Clone)]
pub struct ResultService {
    sessions: Arc<dyn SessionStore>,
}

impl ResultService {
    pub fn new(sessions: Arc<dyn SessionStore>) -> Self {
        Self { sessions }
    }

    pub async fn get_result(&self, result_id: Uuid, caller: Uuid) -> Result<QuizResult> {
        let result = self.sessions.get_result(result_id).await?;
        if result.user_id != caller {
            return Err(Error::Unauthorized(
                "You can only view your own results".to_string(),
            ));
        }
        Ok(result)
    }

    pub async fn list_results(&self, caller: Uuid) -> Result<Vec<QuizResult>> {
        self.sessions.list_results(caller, None).await
    }

    pub async fn list_results_for_quiz(&self, caller: Uuid, quiz_id: Uuid) -> Result<Vec<QuizResult>> {
        self.sessions.list_results(caller, Some(quiz_id)).await
    }

    pub async fn latest_result_for_quiz(&self, caller: Uuid, quiz_id: Uuid) -> Result<QuizResult> {
        self.sessions
            .list_results(caller, Some(quiz_id))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found("No results for this quiz"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::session::SessionStatus;
    use chrono::Duration;

    fn session(started_at: DateTime<Utc>) -> QuizSession {
        QuizSession {
            id: Uuid::new_v4(),
            quiz_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            status: SessionStatus::Active,
            started_at,
            expires_at: started_at + Duration::hours(24),
            completed_at: None,
        }
    }

    fn graded(is_correct: bool) -> GradedQuestion {
        GradedQuestion {
            question_id: Uuid::new_v4(),
            is_correct,
            response: None,
        }
    }

    #[test]
    fn counts_correct_verdicts_and_keeps_order() {
        let started = Utc::now();
        let s = session(started);
        let input = vec![graded(true), graded(false), graded(true)];
        let ids: Vec<Uuid> = input.iter().map(|g| g.question_id).collect();

        let result = aggregate(&s, started + Duration::seconds(90), input);

        assert_eq!(result.score, 2);
        assert_eq!(result.total_questions, 3);
        assert_eq!(result.time_taken_seconds, 90);
        assert_eq!(result.session_id, s.id);
        let got: Vec<Uuid> = result.question_results.iter().map(|q| q.question_id).collect();
        assert_eq!(got, ids);
        assert!(result.question_results.iter().all(|q| q.result_id == result.id));
    }

    #[test]
    fn elapsed_time_is_floored_and_never_negative() {
        let started = Utc::now();
        let s = session(started);

        let partial = aggregate(&s, started + Duration::milliseconds(2_900), vec![]);
        assert_eq!(partial.time_taken_seconds, 2);

        let skewed = aggregate(&s, started - Duration::seconds(5), vec![]);
        assert_eq!(skewed.time_taken_seconds, 0);
    }

    #[test]
    fn zero_questions_yield_zero_score() {
        let s = session(Utc::now());
        let result = aggregate(&s, Utc::now(), vec![]);
        assert_eq!(result.score, 0);
        assert_eq!(result.total_questions, 0);
        assert!(result.question_results.is_empty());
    }
}
