use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use uuid::Uuid;

use crate::dto::quiz_dto::{
    AddAnswerRequest, AddQuestionRequest, AnswerResponse, CreateQuizRequest, QuestionResponse,
    QuizSummary, QuizView, UpdateAnswerRequest, UpdateQuestionRequest,
};
use crate::error::{Error, Result};
use crate::models::quiz::Quiz;
use crate::services::collab_service::{build_question, CollabService};
use crate::store::ContentStore;

/// Quiz authoring. Creation and deletion go straight to the store; every
/// edit of existing content is routed through [`CollabService`] so it is
/// version-checked, audited and broadcast like a live change.
#[derive(Clone)]
pub struct QuizService {
    content: Arc<dyn ContentStore>,
    collab: CollabService,
}

impl QuizService {
    pub fn new(content: Arc<dyn ContentStore>, collab: CollabService) -> Self {
        Self { content, collab }
    }

    pub async fn create_quiz(&self, creator_id: Uuid, req: CreateQuizRequest) -> Result<Quiz> {
        let mut quiz = Quiz::new(creator_id, req.title, req.description, req.is_public);
        for (i, input) in req.questions.into_iter().enumerate() {
            let order_index = input.order_index.unwrap_or(i as i32);
            quiz.questions
                .push(build_question(quiz.id, Uuid::new_v4(), order_index, input));
        }
        quiz.sort_questions();

        let saved = self.content.insert_quiz(&quiz).await?;
        tracing::info!(quiz_id = %saved.id, %creator_id, questions = saved.questions.len(), "quiz created");
        Ok(saved)
    }

    /// Editors get the whole aggregate; anyone else only a summary of a
    /// public quiz.
    pub async fn get_quiz(&self, quiz_id: Uuid, caller: Uuid) -> Result<QuizView> {
        let quiz = self.content.get_quiz(quiz_id).await?;
        if quiz.can_edit(caller) {
            return Ok(QuizView::Full(Box::new(quiz)));
        }
        if quiz.is_public {
            return Ok(QuizView::Summary(QuizSummary::from(&quiz)));
        }
        Err(Error::Unauthorized(
            "You don't have access to this quiz".to_string(),
        ))
    }

    pub async fn list_quizzes(&self, caller: Uuid) -> Result<Vec<Quiz>> {
        self.content.list_quizzes_for_user(caller).await
    }

    /// Public quizzes as summaries, whoever is asking.
    pub async fn list_public_quizzes(&self) -> Result<Vec<QuizSummary>> {
        let quizzes = self.content.list_public_quizzes().await?;
        Ok(quizzes.iter().map(QuizSummary::from).collect())
    }

    pub async fn list_created_quizzes(&self, caller: Uuid) -> Result<Vec<Quiz>> {
        let quizzes = self.content.list_quizzes_for_user(caller).await?;
        Ok(quizzes.into_iter().filter(|q| q.is_creator(caller)).collect())
    }

    /// Quizzes shared with the caller by someone else.
    pub async fn list_collaborated_quizzes(&self, caller: Uuid) -> Result<Vec<Quiz>> {
        let quizzes = self.content.list_quizzes_for_user(caller).await?;
        Ok(quizzes
            .into_iter()
            .filter(|q| q.collaborators.contains(&caller))
            .collect())
    }

    pub async fn delete_quiz(&self, quiz_id: Uuid, caller: Uuid, expected_version: i64) -> Result<()> {
        let quiz = self.content.get_quiz(quiz_id).await?;
        if !quiz.is_creator(caller) {
            return Err(Error::Unauthorized(
                "Only the creator can delete this quiz".to_string(),
            ));
        }
        self.content.delete_quiz(quiz_id, expected_version).await?;
        tracing::info!(%quiz_id, "quiz deleted");
        Ok(())
    }

    pub async fn add_question(&self, quiz_id: Uuid, caller: Uuid, req: AddQuestionRequest) -> Result<QuestionResponse> {
        let question_id = Uuid::new_v4();
        let mut data = serde_json::to_value(&req.question)?;
        data["id"] = json!(question_id);

        let quiz = self
            .collab
            .apply_change(quiz_id, caller, "QUESTION_ADDED", data, req.version)
            .await?;
        question_response(quiz, question_id)
    }

    pub async fn update_question(
        &self,
        quiz_id: Uuid,
        question_id: Uuid,
        caller: Uuid,
        req: UpdateQuestionRequest,
    ) -> Result<QuestionResponse> {
        let mut data = serde_json::to_value(&req.patch)?;
        data["question_id"] = json!(question_id);

        let quiz = self
            .collab
            .apply_change(quiz_id, caller, "QUESTION_UPDATED", data, req.version)
            .await?;
        question_response(quiz, question_id)
    }

    pub async fn delete_question(&self, quiz_id: Uuid, question_id: Uuid, caller: Uuid, version: i64) -> Result<Quiz> {
        self.collab
            .apply_change(
                quiz_id,
                caller,
                "QUESTION_DELETED",
                json!({ "question_id": question_id }),
                version,
            )
            .await
    }

    pub async fn add_answer(
        &self,
        quiz_id: Uuid,
        question_id: Uuid,
        caller: Uuid,
        req: AddAnswerRequest,
    ) -> Result<AnswerResponse> {
        let answer_id = Uuid::new_v4();
        let mut data = serde_json::to_value(&req.answer)?;
        data["id"] = json!(answer_id);
        data["question_id"] = json!(question_id);

        let quiz = self
            .collab
            .apply_change(quiz_id, caller, "ANSWER_ADDED", data, req.version)
            .await?;
        answer_response(quiz, question_id, answer_id)
    }

    pub async fn update_answer(
        &self,
        quiz_id: Uuid,
        question_id: Uuid,
        answer_id: Uuid,
        caller: Uuid,
        req: UpdateAnswerRequest,
    ) -> Result<AnswerResponse> {
        let mut data: JsonValue = serde_json::to_value(&req.patch)?;
        data["question_id"] = json!(question_id);
        data["answer_id"] = json!(answer_id);

        let quiz = self
            .collab
            .apply_change(quiz_id, caller, "ANSWER_UPDATED", data, req.version)
            .await?;
        answer_response(quiz, question_id, answer_id)
    }

    pub async fn delete_answer(
        &self,
        quiz_id: Uuid,
        question_id: Uuid,
        answer_id: Uuid,
        caller: Uuid,
        version: i64,
    ) -> Result<Quiz> {
        self.collab
            .apply_change(
                quiz_id,
                caller,
                "ANSWER_DELETED",
                json!({ "question_id": question_id, "answer_id": answer_id }),
                version,
            )
            .await
    }
}

fn question_response(quiz: Quiz, question_id: Uuid) -> Result<QuestionResponse> {
    let question = quiz
        .question(question_id)
        .cloned()
        .ok_or_else(|| Error::Internal(format!("question {} missing after change", question_id)))?;
    Ok(QuestionResponse {
        quiz_version: quiz.version,
        question,
    })
}

fn answer_response(quiz: Quiz, question_id: Uuid, answer_id: Uuid) -> Result<AnswerResponse> {
    let answer = quiz
        .question(question_id)
        .and_then(|q| q.answer(answer_id))
        .cloned()
        .ok_or_else(|| Error::Internal(format!("answer {} missing after change", answer_id)))?;
    Ok(AnswerResponse {
        quiz_version: quiz.version,
        answer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::quiz_dto::{AnswerInput, AnswerPatch, QuestionInput, QuestionPatch};
    use crate::models::quiz::QuestionType;
    use crate::models::session::QuizSession;
    use crate::services::broadcast::QuizHub;
    use crate::services::presence::PresenceRegistry;
    use crate::store::{MemoryStore, SessionStore};
    use chrono::{Duration, Utc};

    fn service() -> (QuizService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let collab = CollabService::new(
            store.clone(),
            Arc::new(PresenceRegistry::new()),
            Arc::new(QuizHub::new(8)),
        );
        (QuizService::new(store.clone(), collab), store)
    }

    fn create_request() -> CreateQuizRequest {
        CreateQuizRequest {
            title: "Geography".into(),
            description: Some("Warm-up".into()),
            is_public: true,
            questions: vec![QuestionInput {
                text: "Largest ocean?".into(),
                question_type: QuestionType::SingleChoice,
                order_index: None,
                image_url: None,
                code_snippet: None,
                explanation: None,
                answers: vec![
                    AnswerInput {
                        text: "Pacific".into(),
                        is_correct: true,
                        order_index: None,
                    },
                    AnswerInput {
                        text: "Atlantic".into(),
                        is_correct: false,
                        order_index: None,
                    },
                ],
            }],
        }
    }

    #[tokio::test]
    async fn created_quiz_starts_at_version_one() {
        let (svc, _) = service();
        let creator = Uuid::new_v4();
        let quiz = svc.create_quiz(creator, create_request()).await.unwrap();

        assert_eq!(quiz.version, 1);
        assert_eq!(quiz.questions.len(), 1);
        assert_eq!(quiz.questions[0].version, 1);
        assert_eq!(quiz.questions[0].answers[1].order_index, 1);
        assert_eq!(svc.list_quizzes(creator).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn outsiders_see_a_summary_of_public_quizzes() {
        let (svc, _) = service();
        let creator = Uuid::new_v4();
        let quiz = svc.create_quiz(creator, create_request()).await.unwrap();

        match svc.get_quiz(quiz.id, Uuid::new_v4()).await.unwrap() {
            QuizView::Summary(summary) => assert_eq!(summary.question_count, 1),
            QuizView::Full(_) => panic!("outsider got the answer key"),
        }
        assert!(matches!(
            svc.get_quiz(quiz.id, creator).await.unwrap(),
            QuizView::Full(_)
        ));
    }

    #[tokio::test]
    async fn direct_edits_bump_the_quiz_version() {
        let (svc, store) = service();
        let creator = Uuid::new_v4();
        let quiz = svc.create_quiz(creator, create_request()).await.unwrap();

        let added = svc
            .add_question(
                quiz.id,
                creator,
                AddQuestionRequest {
                    version: 1,
                    question: QuestionInput {
                        text: "Capital of Japan?".into(),
                        question_type: QuestionType::ShortAnswer,
                        order_index: None,
                        image_url: None,
                        code_snippet: None,
                        explanation: None,
                        answers: vec![],
                    },
                },
            )
            .await
            .unwrap();
        assert_eq!(added.quiz_version, 2);

        let answer = svc
            .add_answer(
                quiz.id,
                added.question.id,
                creator,
                AddAnswerRequest {
                    version: 2,
                    answer: AnswerInput {
                        text: "Tokyo".into(),
                        is_correct: true,
                        order_index: None,
                    },
                },
            )
            .await
            .unwrap();
        assert_eq!(answer.quiz_version, 3);

        let updated = svc
            .update_answer(
                quiz.id,
                added.question.id,
                answer.answer.id,
                creator,
                UpdateAnswerRequest {
                    version: 3,
                    patch: AnswerPatch {
                        text: Some("tokyo".into()),
                        ..Default::default()
                    },
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.answer.version, 2);

        let question = svc
            .update_question(
                quiz.id,
                added.question.id,
                creator,
                UpdateQuestionRequest {
                    version: 4,
                    patch: QuestionPatch {
                        question_version: Some(2),
                        explanation: Some("It moved from Kyoto".into()),
                        ..Default::default()
                    },
                },
            )
            .await
            .unwrap();
        assert_eq!(question.quiz_version, 5);

        let quiz_after = svc
            .delete_answer(quiz.id, added.question.id, answer.answer.id, creator, 5)
            .await
            .unwrap();
        assert_eq!(quiz_after.version, 6);

        let quiz_after = svc
            .delete_question(quiz.id, added.question.id, creator, 6)
            .await
            .unwrap();
        assert_eq!(quiz_after.version, 7);
        assert_eq!(store.list_changes(quiz.id).await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn listings_split_by_relation_and_visibility() {
        let (svc, _) = service();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let shared = svc.create_quiz(alice, create_request()).await.unwrap();
        let mut private = create_request();
        private.title = "Bob's notes".into();
        private.is_public = false;
        let own = svc.create_quiz(bob, private).await.unwrap();
        svc.collab
            .apply_change(
                shared.id,
                alice,
                "COLLABORATOR_ADDED",
                serde_json::json!({"user_id": bob}),
                1,
            )
            .await
            .unwrap();

        let created = svc.list_created_quizzes(bob).await.unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].id, own.id);

        let collaborated = svc.list_collaborated_quizzes(bob).await.unwrap();
        assert_eq!(collaborated.len(), 1);
        assert_eq!(collaborated[0].id, shared.id);
        assert!(svc.list_collaborated_quizzes(alice).await.unwrap().is_empty());

        let public = svc.list_public_quizzes().await.unwrap();
        assert_eq!(public.len(), 1);
        assert_eq!(public[0].id, shared.id);
        assert_eq!(public[0].question_count, 1);
    }

    #[tokio::test]
    async fn delete_is_creator_only_and_version_checked() {
        let (svc, store) = service();
        let creator = Uuid::new_v4();
        let quiz = svc.create_quiz(creator, create_request()).await.unwrap();

        let err = svc.delete_quiz(quiz.id, Uuid::new_v4(), 1).await.unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));

        let err = svc.delete_quiz(quiz.id, creator, 7).await.unwrap_err();
        assert!(matches!(err, Error::Conflict { current_version: Some(1), .. }));

        svc.delete_quiz(quiz.id, creator, 1).await.unwrap();
        assert!(matches!(store.get_quiz(quiz.id).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn quizzes_with_sessions_cannot_be_deleted() {
        let (svc, store) = service();
        let creator = Uuid::new_v4();
        let quiz = svc.create_quiz(creator, create_request()).await.unwrap();
        let session = QuizSession::start(quiz.id, Uuid::new_v4(), Utc::now(), Duration::hours(1));
        store.start_session(&session).await.unwrap();

        let err = svc.delete_quiz(quiz.id, creator, 1).await.unwrap_err();
        assert!(matches!(err, Error::Conflict { current_version: None, .. }));
        assert!(store.get_quiz(quiz.id).await.is_ok());
    }
}
