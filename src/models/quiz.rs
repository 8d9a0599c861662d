use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Version stamp every quiz, question and answer starts at.
pub const INITIAL_VERSION: i64 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub creator_id: Uuid,
    /// Kept sorted by `order_index`.
    pub questions: Vec<Question>,
    pub collaborators: BTreeSet<Uuid>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quiz {
    pub fn new(creator_id: Uuid, title: String, description: Option<String>, is_public: bool) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title,
            description,
            is_public,
            creator_id,
            questions: Vec::new(),
            collaborators: BTreeSet::new(),
            version: INITIAL_VERSION,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_creator(&self, user_id: Uuid) -> bool {
        self.creator_id == user_id
    }

    /// Creator or collaborator: the set of users allowed to edit.
    pub fn can_edit(&self, user_id: Uuid) -> bool {
        self.is_creator(user_id) || self.collaborators.contains(&user_id)
    }

    /// Public quizzes are readable by anyone; private ones only by editors.
    pub fn can_view(&self, user_id: Uuid) -> bool {
        self.is_public || self.can_edit(user_id)
    }

    pub fn question(&self, question_id: Uuid) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }

    pub fn question_mut(&mut self, question_id: Uuid) -> Option<&mut Question> {
        self.questions.iter_mut().find(|q| q.id == question_id)
    }

    pub fn next_question_index(&self) -> i32 {
        self.questions
            .iter()
            .map(|q| q.order_index + 1)
            .max()
            .unwrap_or(0)
    }

    pub fn sort_questions(&mut self) {
        self.questions
            .sort_by(|a, b| a.order_index.cmp(&b.order_index).then(a.id.cmp(&b.id)));
        for q in &mut self.questions {
            q.sort_answers();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    SingleChoice,
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
    Image,
    Code,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "SINGLE_CHOICE",
            QuestionType::MultipleChoice => "MULTIPLE_CHOICE",
            QuestionType::TrueFalse => "TRUE_FALSE",
            QuestionType::ShortAnswer => "SHORT_ANSWER",
            QuestionType::Image => "IMAGE",
            QuestionType::Code => "CODE",
        }
    }

    /// Choice-style questions are answered by selecting answer ids.
    pub fn is_choice(&self) -> bool {
        matches!(
            self,
            QuestionType::SingleChoice | QuestionType::MultipleChoice | QuestionType::TrueFalse
        )
    }

    /// Image and code questions accept either response kind.
    pub fn accepts_any_response(&self) -> bool {
        matches!(self, QuestionType::Image | QuestionType::Code)
    }
}

impl std::str::FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SINGLE_CHOICE" | "MULTIPLE_CHOICE_SINGLE" => Ok(QuestionType::SingleChoice),
            "MULTIPLE_CHOICE" | "MULTIPLE_CHOICE_MULTIPLE" => Ok(QuestionType::MultipleChoice),
            "TRUE_FALSE" => Ok(QuestionType::TrueFalse),
            "SHORT_ANSWER" => Ok(QuestionType::ShortAnswer),
            "IMAGE" => Ok(QuestionType::Image),
            "CODE" => Ok(QuestionType::Code),
            other => Err(format!("unknown question type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub text: String,
    pub question_type: QuestionType,
    pub order_index: i32,
    pub image_url: Option<String>,
    pub code_snippet: Option<String>,
    pub explanation: Option<String>,
    pub version: i64,
    /// Kept sorted by `order_index`.
    pub answers: Vec<Answer>,
}

impl Question {
    pub fn answer(&self, answer_id: Uuid) -> Option<&Answer> {
        self.answers.iter().find(|a| a.id == answer_id)
    }

    pub fn answer_mut(&mut self, answer_id: Uuid) -> Option<&mut Answer> {
        self.answers.iter_mut().find(|a| a.id == answer_id)
    }

    /// Answers flagged correct, in order.
    pub fn correct_answers(&self) -> Vec<&Answer> {
        self.answers.iter().filter(|a| a.is_correct).collect()
    }

    pub fn next_answer_index(&self) -> i32 {
        self.answers
            .iter()
            .map(|a| a.order_index + 1)
            .max()
            .unwrap_or(0)
    }

    pub fn sort_answers(&mut self) {
        self.answers
            .sort_by(|a, b| a.order_index.cmp(&b.order_index).then(a.id.cmp(&b.id)));
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub id: Uuid,
    pub question_id: Uuid,
    pub text: String,
    pub is_correct: bool,
    pub order_index: i32,
    pub version: i64,
}
