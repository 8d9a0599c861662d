use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::quiz::{Answer, Question, QuestionType, Quiz};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AnswerInput {
    #[validate(length(min = 1, max = 2000))]
    pub text: String,
    #[serde(default, alias = "isCorrect")]
    pub is_correct: bool,
    #[serde(default, alias = "orderIndex")]
    pub order_index: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuestionInput {
    #[validate(length(min = 1, max = 5000))]
    pub text: String,
    #[serde(alias = "questionType")]
    pub question_type: QuestionType,
    #[serde(default, alias = "orderIndex")]
    pub order_index: Option<i32>,
    #[serde(default, alias = "imageUrl")]
    #[validate(url)]
    pub image_url: Option<String>,
    #[serde(default, alias = "codeSnippet")]
    pub code_snippet: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub answers: Vec<AnswerInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[serde(default, alias = "isPublic")]
    pub is_public: bool,
    #[serde(default)]
    #[validate(nested)]
    pub questions: Vec<QuestionInput>,
}

/// Quiz version the caller last observed, used for deletes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionQuery {
    pub version: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddQuestionRequest {
    pub version: i64,
    #[serde(flatten)]
    #[validate(nested)]
    pub question: QuestionInput,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct QuestionPatch {
    #[serde(default, alias = "questionVersion", alias = "version")]
    pub question_version: Option<i64>,
    #[validate(length(min = 1, max = 5000))]
    pub text: Option<String>,
    #[serde(default, alias = "questionType")]
    pub question_type: Option<QuestionType>,
    #[serde(default, alias = "orderIndex")]
    pub order_index: Option<i32>,
    #[serde(default, alias = "imageUrl")]
    #[validate(url)]
    pub image_url: Option<String>,
    #[serde(default, alias = "codeSnippet")]
    pub code_snippet: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    pub version: i64,
    #[serde(flatten)]
    #[validate(nested)]
    pub patch: QuestionPatch,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddAnswerRequest {
    pub version: i64,
    #[serde(flatten)]
    #[validate(nested)]
    pub answer: AnswerInput,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct AnswerPatch {
    #[serde(default, alias = "answerVersion", alias = "version")]
    pub answer_version: Option<i64>,
    #[validate(length(min = 1, max = 2000))]
    pub text: Option<String>,
    #[serde(default, alias = "isCorrect")]
    pub is_correct: Option<bool>,
    #[serde(default, alias = "orderIndex")]
    pub order_index: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateAnswerRequest {
    pub version: i64,
    #[serde(flatten)]
    #[validate(nested)]
    pub patch: AnswerPatch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionResponse {
    pub quiz_version: i64,
    pub question: Question,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub quiz_version: i64,
    pub answer: Answer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedResponse {
    pub id: Uuid,
    pub deleted: bool,
    pub quiz_version: Option<i64>,
}

/// What a non-editor may see of a public quiz: no questions, no answer keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizSummary {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub creator_id: Uuid,
    pub version: i64,
    pub question_count: usize,
}

impl From<&Quiz> for QuizSummary {
    fn from(quiz: &Quiz) -> Self {
        Self {
            id: quiz.id,
            title: quiz.title.clone(),
            description: quiz.description.clone(),
            creator_id: quiz.creator_id,
            version: quiz.version,
            question_count: quiz.questions.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum QuizView {
    Full(Box<Quiz>),
    Summary(QuizSummary),
}
