use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::session::SubmittedResponse;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizResult {
    pub id: Uuid,
    pub session_id: Uuid,
    pub quiz_id: Uuid,
    pub user_id: Uuid,
    pub score: i32,
    pub total_questions: i32,
    pub time_taken_seconds: i64,
    pub completed_at: DateTime<Utc>,
    pub question_results: Vec<QuestionResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub id: Uuid,
    pub result_id: Uuid,
    pub question_id: Uuid,
    pub is_correct: bool,
    /// Echo of what was handed in, `None` when the question was skipped.
    pub response: Option<SubmittedResponse>,
}
