//! Collaborative editing of quiz content.
//!
//! Every edit names the quiz version it was made against. Only an exact
//! match is accepted, so concurrent editors on the same version see exactly
//! one winner and everybody else gets `Conflict` with the version to re-fetch.
//! Accepted edits bump the version by one, land in the audit log in the same
//! store call, and the fresh snapshot is pushed to live subscribers.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;
use validator::Validate;

use crate::dto::quiz_dto::{AnswerInput, AnswerPatch, QuestionInput, QuestionPatch};
use crate::error::{Error, Result};
use crate::models::quiz::{Answer, Question, Quiz, INITIAL_VERSION};
use crate::models::quiz_change::QuizChange;
use crate::services::broadcast::{QuizEvent, QuizHub};
use crate::services::presence::{PresenceRegistry, PresenceSnapshot, PresentEditor};
use crate::store::ContentStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeType {
    QuizCreated,
    QuizUpdated,
    QuestionAdded,
    QuestionUpdated,
    QuestionDeleted,
    AnswerAdded,
    AnswerUpdated,
    AnswerDeleted,
    CollaboratorAdded,
    CollaboratorRemoved,
    Other(String),
}

impl ChangeType {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "QUIZ_CREATED" => ChangeType::QuizCreated,
            "QUIZ_UPDATED" => ChangeType::QuizUpdated,
            "QUESTION_ADDED" => ChangeType::QuestionAdded,
            "QUESTION_UPDATED" => ChangeType::QuestionUpdated,
            "QUESTION_DELETED" => ChangeType::QuestionDeleted,
            "ANSWER_ADDED" => ChangeType::AnswerAdded,
            "ANSWER_UPDATED" => ChangeType::AnswerUpdated,
            "ANSWER_DELETED" => ChangeType::AnswerDeleted,
            "COLLABORATOR_ADDED" => ChangeType::CollaboratorAdded,
            "COLLABORATOR_REMOVED" => ChangeType::CollaboratorRemoved,
            other => ChangeType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ChangeType::QuizCreated => "QUIZ_CREATED",
            ChangeType::QuizUpdated => "QUIZ_UPDATED",
            ChangeType::QuestionAdded => "QUESTION_ADDED",
            ChangeType::QuestionUpdated => "QUESTION_UPDATED",
            ChangeType::QuestionDeleted => "QUESTION_DELETED",
            ChangeType::AnswerAdded => "ANSWER_ADDED",
            ChangeType::AnswerUpdated => "ANSWER_UPDATED",
            ChangeType::AnswerDeleted => "ANSWER_DELETED",
            ChangeType::CollaboratorAdded => "COLLABORATOR_ADDED",
            ChangeType::CollaboratorRemoved => "COLLABORATOR_REMOVED",
            ChangeType::Other(raw) => raw,
        }
    }

    /// Managing who may edit is reserved for the quiz creator.
    pub fn creator_only(&self) -> bool {
        matches!(
            self,
            ChangeType::CollaboratorAdded | ChangeType::CollaboratorRemoved
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct QuizPatch {
    #[serde(default)]
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[serde(default, alias = "isPublic")]
    pub is_public: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct NewQuestion {
    #[serde(default)]
    id: Option<Uuid>,
    #[serde(flatten)]
    input: QuestionInput,
}

#[derive(Debug, Deserialize)]
struct QuestionEdit {
    #[serde(alias = "questionId")]
    question_id: Uuid,
    #[serde(flatten)]
    patch: QuestionPatch,
}

#[derive(Debug, Deserialize)]
struct QuestionRef {
    #[serde(alias = "questionId")]
    question_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct NewAnswer {
    #[serde(alias = "questionId")]
    question_id: Uuid,
    #[serde(default)]
    id: Option<Uuid>,
    #[serde(flatten)]
    input: AnswerInput,
}

#[derive(Debug, Deserialize)]
struct AnswerEdit {
    #[serde(alias = "questionId")]
    question_id: Uuid,
    #[serde(alias = "answerId")]
    answer_id: Uuid,
    #[serde(flatten)]
    patch: AnswerPatch,
}

#[derive(Debug, Deserialize)]
struct AnswerRef {
    #[serde(alias = "questionId")]
    question_id: Uuid,
    #[serde(alias = "answerId")]
    answer_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct CollaboratorRef {
    #[serde(alias = "userId")]
    user_id: Uuid,
}

/// A decoded edit, ready to be applied to a loaded aggregate.
#[derive(Debug, Clone)]
pub enum ChangeOp {
    UpdateQuiz(QuizPatch),
    AddQuestion { id: Uuid, input: QuestionInput },
    UpdateQuestion { question_id: Uuid, patch: QuestionPatch },
    DeleteQuestion { question_id: Uuid },
    AddAnswer { question_id: Uuid, id: Uuid, input: AnswerInput },
    UpdateAnswer { question_id: Uuid, answer_id: Uuid, patch: AnswerPatch },
    DeleteAnswer { question_id: Uuid, answer_id: Uuid },
    AddCollaborator { user_id: Uuid },
    RemoveCollaborator { user_id: Uuid },
    /// Types this service does not know are accepted without touching content.
    Unrecognized(String),
}

fn payload<T: DeserializeOwned>(data: &JsonValue) -> Result<T> {
    serde_json::from_value(data.clone())
        .map_err(|e| Error::Invalid(format!("Malformed change payload: {}", e)))
}

impl ChangeOp {
    pub fn decode(change_type: &ChangeType, data: &JsonValue) -> Result<Self> {
        let op = match change_type {
            ChangeType::QuizCreated => {
                return Err(Error::Invalid(
                    "A quiz cannot be created through a change".to_string(),
                ))
            }
            ChangeType::QuizUpdated => {
                let patch: QuizPatch = payload(data)?;
                patch.validate()?;
                ChangeOp::UpdateQuiz(patch)
            }
            ChangeType::QuestionAdded => {
                let new: NewQuestion = payload(data)?;
                new.input.validate()?;
                ChangeOp::AddQuestion {
                    id: new.id.unwrap_or_else(Uuid::new_v4),
                    input: new.input,
                }
            }
            ChangeType::QuestionUpdated => {
                let edit: QuestionEdit = payload(data)?;
                edit.patch.validate()?;
                ChangeOp::UpdateQuestion {
                    question_id: edit.question_id,
                    patch: edit.patch,
                }
            }
            ChangeType::QuestionDeleted => {
                let r: QuestionRef = payload(data)?;
                ChangeOp::DeleteQuestion {
                    question_id: r.question_id,
                }
            }
            ChangeType::AnswerAdded => {
                let new: NewAnswer = payload(data)?;
                new.input.validate()?;
                ChangeOp::AddAnswer {
                    question_id: new.question_id,
                    id: new.id.unwrap_or_else(Uuid::new_v4),
                    input: new.input,
                }
            }
            ChangeType::AnswerUpdated => {
                let edit: AnswerEdit = payload(data)?;
                edit.patch.validate()?;
                ChangeOp::UpdateAnswer {
                    question_id: edit.question_id,
                    answer_id: edit.answer_id,
                    patch: edit.patch,
                }
            }
            ChangeType::AnswerDeleted => {
                let r: AnswerRef = payload(data)?;
                ChangeOp::DeleteAnswer {
                    question_id: r.question_id,
                    answer_id: r.answer_id,
                }
            }
            ChangeType::CollaboratorAdded => {
                let r: CollaboratorRef = payload(data)?;
                ChangeOp::AddCollaborator { user_id: r.user_id }
            }
            ChangeType::CollaboratorRemoved => {
                let r: CollaboratorRef = payload(data)?;
                ChangeOp::RemoveCollaborator { user_id: r.user_id }
            }
            ChangeType::Other(raw) => ChangeOp::Unrecognized(raw.clone()),
        };
        Ok(op)
    }

    /// Mutates `quiz` in place. Does not touch the quiz version.
    pub fn apply(self, quiz: &mut Quiz) -> Result<()> {
        match self {
            ChangeOp::UpdateQuiz(patch) => {
                if let Some(title) = patch.title {
                    if title.trim().is_empty() {
                        return Err(Error::Invalid("Title must not be empty".to_string()));
                    }
                    quiz.title = title;
                }
                if let Some(description) = patch.description {
                    quiz.description = Some(description);
                }
                if let Some(is_public) = patch.is_public {
                    quiz.is_public = is_public;
                }
            }
            ChangeOp::AddQuestion { id, input } => {
                if quiz.question(id).is_some() {
                    return Err(Error::Invalid(format!("Question {} already exists", id)));
                }
                let order_index = input.order_index.unwrap_or_else(|| quiz.next_question_index());
                quiz.questions.push(build_question(quiz.id, id, order_index, input));
            }
            ChangeOp::UpdateQuestion { question_id, patch } => {
                let question = find_question(quiz, question_id)?;
                if let Some(expected) = patch.question_version {
                    if expected != question.version {
                        return Err(Error::version_conflict("Question", question.version));
                    }
                }
                if let Some(text) = patch.text {
                    question.text = text;
                }
                if let Some(question_type) = patch.question_type {
                    question.question_type = question_type;
                }
                if let Some(order_index) = patch.order_index {
                    question.order_index = order_index;
                }
                if patch.image_url.is_some() {
                    question.image_url = patch.image_url;
                }
                if patch.code_snippet.is_some() {
                    question.code_snippet = patch.code_snippet;
                }
                if patch.explanation.is_some() {
                    question.explanation = patch.explanation;
                }
                question.version += 1;
            }
            ChangeOp::DeleteQuestion { question_id } => {
                find_question(quiz, question_id)?;
                quiz.questions.retain(|q| q.id != question_id);
            }
            ChangeOp::AddAnswer {
                question_id,
                id,
                input,
            } => {
                // Answer ids are unique across the whole quiz.
                if quiz.questions.iter().any(|q| q.answer(id).is_some()) {
                    return Err(Error::Invalid(format!("Answer {} already exists", id)));
                }
                let question = find_question(quiz, question_id)?;
                let order_index = input
                    .order_index
                    .unwrap_or_else(|| question.next_answer_index());
                question.answers.push(Answer {
                    id,
                    question_id,
                    text: input.text,
                    is_correct: input.is_correct,
                    order_index,
                    version: INITIAL_VERSION,
                });
                question.version += 1;
            }
            ChangeOp::UpdateAnswer {
                question_id,
                answer_id,
                patch,
            } => {
                let question = find_question(quiz, question_id)?;
                let answer = question
                    .answer_mut(answer_id)
                    .ok_or_else(|| Error::not_found("Answer not found"))?;
                if let Some(expected) = patch.answer_version {
                    if expected != answer.version {
                        return Err(Error::version_conflict("Answer", answer.version));
                    }
                }
                if let Some(text) = patch.text {
                    answer.text = text;
                }
                if let Some(is_correct) = patch.is_correct {
                    answer.is_correct = is_correct;
                }
                if let Some(order_index) = patch.order_index {
                    answer.order_index = order_index;
                }
                answer.version += 1;
            }
            ChangeOp::DeleteAnswer {
                question_id,
                answer_id,
            } => {
                let question = find_question(quiz, question_id)?;
                if question.answer(answer_id).is_none() {
                    return Err(Error::not_found("Answer not found"));
                }
                question.answers.retain(|a| a.id != answer_id);
                question.version += 1;
            }
            ChangeOp::AddCollaborator { user_id } => {
                if quiz.is_creator(user_id) {
                    return Err(Error::Invalid(
                        "The creator cannot be added as a collaborator".to_string(),
                    ));
                }
                quiz.collaborators.insert(user_id);
            }
            ChangeOp::RemoveCollaborator { user_id } => {
                if !quiz.collaborators.remove(&user_id) {
                    return Err(Error::not_found("Collaborator not found"));
                }
            }
            ChangeOp::Unrecognized(raw) => {
                tracing::warn!(quiz_id = %quiz.id, change_type = %raw, "unrecognized change type accepted as no-op");
            }
        }
        quiz.sort_questions();
        Ok(())
    }
}

fn find_question(quiz: &mut Quiz, question_id: Uuid) -> Result<&mut Question> {
    quiz.question_mut(question_id)
        .ok_or_else(|| Error::not_found("Question not found"))
}

pub(crate) fn build_question(quiz_id: Uuid, id: Uuid, order_index: i32, input: QuestionInput) -> Question {
    Question {
        id,
        quiz_id,
        text: input.text,
        question_type: input.question_type,
        order_index,
        image_url: input.image_url,
        code_snippet: input.code_snippet,
        explanation: input.explanation,
        version: INITIAL_VERSION,
        answers: input
            .answers
            .into_iter()
            .enumerate()
            .map(|(i, a)| Answer {
                id: Uuid::new_v4(),
                question_id: id,
                text: a.text,
                is_correct: a.is_correct,
                order_index: a.order_index.unwrap_or(i as i32),
                version: INITIAL_VERSION,
            })
            .collect(),
    }
}

#[derive(Clone)]
pub struct CollabService {
    content: Arc<dyn ContentStore>,
    presence: Arc<PresenceRegistry>,
    hub: Arc<QuizHub>,
}

impl CollabService {
    pub fn new(content: Arc<dyn ContentStore>, presence: Arc<PresenceRegistry>, hub: Arc<QuizHub>) -> Self {
        Self {
            content,
            presence,
            hub,
        }
    }

    async fn editable_quiz(&self, quiz_id: Uuid, caller: Uuid) -> Result<Quiz> {
        let quiz = self.content.get_quiz(quiz_id).await?;
        if !quiz.can_edit(caller) {
            return Err(Error::Unauthorized(
                "Only the creator or a collaborator can edit this quiz".to_string(),
            ));
        }
        Ok(quiz)
    }

    /// Fails unless `caller` may edit the quiz. Leaves presence untouched.
    pub async fn ensure_editor(&self, quiz_id: Uuid, caller: Uuid) -> Result<()> {
        self.editable_quiz(quiz_id, caller).await.map(|_| ())
    }

    pub async fn join(&self, quiz_id: Uuid, user_id: Uuid, username: &str) -> Result<PresenceSnapshot> {
        self.editable_quiz(quiz_id, user_id).await?;
        let snapshot = self.presence.join(
            quiz_id,
            PresentEditor {
                user_id,
                username: username.to_string(),
            },
        );
        tracing::info!(%quiz_id, %user_id, editors = snapshot.editors.len(), "editor joined");
        self.hub.publish(quiz_id, QuizEvent::Presence(snapshot.clone()));
        Ok(snapshot)
    }

    pub fn leave(&self, quiz_id: Uuid, user_id: Uuid) -> PresenceSnapshot {
        let snapshot = self.presence.leave(quiz_id, user_id);
        tracing::info!(%quiz_id, %user_id, editors = snapshot.editors.len(), "editor left");
        self.hub.publish(quiz_id, QuizEvent::Presence(snapshot.clone()));
        self.hub.prune(quiz_id);
        snapshot
    }

    pub async fn presence(&self, quiz_id: Uuid, caller: Uuid) -> Result<PresenceSnapshot> {
        self.editable_quiz(quiz_id, caller).await?;
        Ok(self.presence.snapshot(quiz_id))
    }

    pub fn subscribe(&self, quiz_id: Uuid) -> broadcast::Receiver<QuizEvent> {
        self.hub.subscribe(quiz_id)
    }

    /// Drops the quiz channel once its last receiver is gone. Call after
    /// dropping a receiver that never joined.
    pub fn release(&self, quiz_id: Uuid) {
        self.hub.prune(quiz_id);
    }

    pub async fn changes(&self, quiz_id: Uuid, caller: Uuid) -> Result<Vec<QuizChange>> {
        self.editable_quiz(quiz_id, caller).await?;
        self.content.list_changes(quiz_id).await
    }

    /// Applies one version-checked edit and returns the new snapshot.
    pub async fn apply_change(
        &self,
        quiz_id: Uuid,
        author_id: Uuid,
        change_type: &str,
        change_data: JsonValue,
        expected_version: i64,
    ) -> Result<Quiz> {
        let mut quiz = self.editable_quiz(quiz_id, author_id).await?;
        let kind = ChangeType::parse(change_type);
        if kind.creator_only() && !quiz.is_creator(author_id) {
            return Err(Error::Unauthorized(
                "Only the creator can manage collaborators".to_string(),
            ));
        }
        if quiz.version != expected_version {
            tracing::debug!(
                %quiz_id,
                expected_version,
                current_version = quiz.version,
                "stale change rejected"
            );
            return Err(Error::version_conflict("Quiz", quiz.version));
        }

        ChangeOp::decode(&kind, &change_data)?.apply(&mut quiz)?;

        let now = Utc::now();
        quiz.version = expected_version + 1;
        quiz.updated_at = now;
        let change = QuizChange {
            id: Uuid::new_v4(),
            quiz_id,
            author_id,
            change_type: change_type.to_string(),
            change_data,
            version: quiz.version,
            created_at: now,
        };

        let saved = self.content.save_quiz(&quiz, expected_version, &change).await?;
        tracing::info!(
            %quiz_id,
            %author_id,
            change_type = kind.as_str(),
            version = saved.version,
            "quiz change applied"
        );
        self.hub
            .publish(quiz_id, QuizEvent::Changes(Box::new(saved.clone())));
        Ok(saved)
    }
}
