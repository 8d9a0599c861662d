use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{Error, Result};
use crate::models::quiz::QuestionType;
use crate::models::result::QuizResult;
use crate::models::session::{QuizSession, SubmittedResponse};

/// Exactly one of the two fields must be present: answer ids for choice
/// questions, text for short-answer questions.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitAnswerRequest {
    #[serde(default, alias = "selectedAnswerIds")]
    pub selected_answer_ids: Option<Vec<Uuid>>,
    #[serde(default, alias = "textAnswer")]
    #[validate(length(max = 10000))]
    pub text_answer: Option<String>,
}

impl SubmitAnswerRequest {
    pub fn into_response(self) -> Result<SubmittedResponse> {
        match (self.selected_answer_ids, self.text_answer) {
            (Some(_), Some(_)) => Err(Error::Invalid(
                "Send either selected_answer_ids or text_answer, not both".to_string(),
            )),
            (Some(ids), None) => Ok(SubmittedResponse::Selected(ids.into_iter().collect())),
            (None, Some(text)) => Ok(SubmittedResponse::Text(text)),
            (None, None) => Err(Error::Invalid(
                "Either selected_answer_ids or text_answer is required".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: Uuid,
    pub text: String,
    pub order_index: i32,
}

/// A question as shown to someone taking the quiz.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionQuestion {
    pub id: Uuid,
    pub text: String,
    pub question_type: QuestionType,
    pub order_index: i32,
    pub image_url: Option<String>,
    pub code_snippet: Option<String>,
    pub options: Vec<AnswerOption>,
    pub response: Option<SubmittedResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteSessionResponse {
    pub session: QuizSession,
    pub result: QuizResult,
}
