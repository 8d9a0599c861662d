use std::collections::BTreeSet;
use uuid::Uuid;

use crate::models::quiz::{Answer, Question, QuestionType};
use crate::models::session::SubmittedResponse;

pub struct ScoringService;

impl ScoringService {
    /// Grades one question. `correct` holds the answers flagged correct, in
    /// order. A missing response is simply wrong, never an error.
    pub fn score(
        question_type: QuestionType,
        correct: &[&Answer],
        response: Option<&SubmittedResponse>,
    ) -> bool {
        let Some(response) = response else {
            return false;
        };
        if response.is_empty() || correct.is_empty() {
            return false;
        }

        // Image and code questions are graded by whichever kind was sent.
        let any_kind = question_type.accepts_any_response();
        match response {
            SubmittedResponse::Selected(ids) if question_type.is_choice() || any_kind => {
                Self::set_matches(ids, correct)
            }
            SubmittedResponse::Text(text) if question_type == QuestionType::ShortAnswer || any_kind => {
                Self::text_matches(text, correct)
            }
            _ => false,
        }
    }

    /// Convenience over [`ScoringService::score`] for a loaded question.
    pub fn score_question(question: &Question, response: Option<&SubmittedResponse>) -> bool {
        Self::score(question.question_type, &question.correct_answers(), response)
    }

    fn set_matches(selected: &BTreeSet<Uuid>, correct: &[&Answer]) -> bool {
        let expected: BTreeSet<Uuid> = correct.iter().map(|a| a.id).collect();
        *selected == expected
    }

    fn text_matches(text: &str, correct: &[&Answer]) -> bool {
        let submitted = normalize(text);
        !submitted.is_empty() && submitted == normalize(&correct[0].text)
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}
