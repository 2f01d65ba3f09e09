//! In-process [`QuizStore`] used by tests and the `memory` backend.

use std::{collections::HashMap, sync::Arc};

use futures::future::BoxFuture;
use indexmap::IndexMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::dao::{
    models::{
        AnswerEntity, OptionEntity, ParticipantEntity, QuestionEntity, QuizEntity, SessionEntity,
    },
    quiz_store::QuizStore,
    storage::{StorageError, StorageResult},
};

#[derive(Clone, Default)]
pub struct MemoryQuizStore {
    inner: Arc<RwLock<Tables>>,
}

#[derive(Default)]
struct Tables {
    quizzes: HashMap<Uuid, QuizEntity>,
    questions: IndexMap<Uuid, QuestionEntity>,
    sessions: HashMap<Uuid, SessionEntity>,
    join_codes: HashMap<String, Uuid>,
    // Insertion order doubles as the join order tie-break.
    participants: IndexMap<Uuid, ParticipantEntity>,
    answers: Vec<AnswerEntity>,
}

impl MemoryQuizStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl QuizStore for MemoryQuizStore {
    fn insert_quiz(
        &self,
        quiz: QuizEntity,
        questions: Vec<QuestionEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut tables = inner.write().await;
            tables.quizzes.insert(quiz.id, quiz);
            for question in questions {
                tables.questions.insert(question.id, question);
            }
            Ok(())
        })
    }

    fn find_quiz(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<QuizEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.read().await.quizzes.get(&id).cloned()) })
    }

    fn list_questions(
        &self,
        quiz_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let tables = inner.read().await;
            let mut questions = tables
                .questions
                .values()
                .filter(|question| question.quiz_id == quiz_id)
                .cloned()
                .collect::<Vec<_>>();
            questions.sort_by_key(|question| question.position);
            Ok(questions)
        })
    }

    fn find_question(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.read().await.questions.get(&id).cloned()) })
    }

    fn find_option(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<OptionEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let tables = inner.read().await;
            Ok(tables
                .questions
                .values()
                .flat_map(|question| question.options.iter())
                .find(|option| option.id == id)
                .cloned())
        })
    }

    fn insert_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut tables = inner.write().await;
            if tables.join_codes.contains_key(&session.join_code) {
                return Err(StorageError::conflict(format!(
                    "join code `{}` already in use",
                    session.join_code
                )));
            }
            tables
                .join_codes
                .insert(session.join_code.clone(), session.id);
            tables.sessions.insert(session.id, session);
            Ok(())
        })
    }

    fn find_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.read().await.sessions.get(&id).cloned()) })
    }

    fn find_session_by_code(
        &self,
        join_code: String,
    ) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let tables = inner.read().await;
            Ok(tables
                .join_codes
                .get(&join_code)
                .and_then(|id| tables.sessions.get(id))
                .cloned())
        })
    }

    fn update_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut tables = inner.write().await;
            tables.sessions.insert(session.id, session);
            Ok(())
        })
    }

    fn insert_participant(
        &self,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut tables = inner.write().await;
            tables.participants.insert(participant.id, participant);
            Ok(())
        })
    }

    fn find_participant(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.read().await.participants.get(&id).cloned()) })
    }

    fn list_participants(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let tables = inner.read().await;
            Ok(tables
                .participants
                .values()
                .filter(|participant| participant.session_id == session_id)
                .cloned()
                .collect())
        })
    }

    fn settle_answer(
        &self,
        participant_id: Uuid,
        index: u32,
        points: u32,
        advance_cursor: bool,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut tables = inner.write().await;
            Ok(tables
                .participants
                .get_mut(&participant_id)
                .map(|participant| {
                    if !participant.has_settled(index) {
                        participant.score = participant.score.saturating_add(points);
                        participant.settled_index = Some(index);
                        if advance_cursor {
                            participant.question_cursor = Some(index + 1);
                        }
                    }
                    participant.clone()
                }))
        })
    }

    fn set_question_cursor(
        &self,
        participant_id: Uuid,
        cursor: Option<u32>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut tables = inner.write().await;
            if let Some(participant) = tables.participants.get_mut(&participant_id) {
                participant.question_cursor = cursor;
            }
            Ok(())
        })
    }

    fn reset_question_cursors(
        &self,
        session_id: Uuid,
        cursor: Option<u32>,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut tables = inner.write().await;
            let mut changed = 0;
            for participant in tables
                .participants
                .values_mut()
                .filter(|participant| participant.session_id == session_id)
            {
                participant.question_cursor = cursor;
                changed += 1;
            }
            Ok(changed)
        })
    }

    fn insert_answer(&self, answer: AnswerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.write().await.answers.push(answer);
            Ok(())
        })
    }

    fn find_answer(
        &self,
        participant_id: Uuid,
        question_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<AnswerEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let tables = inner.read().await;
            Ok(tables
                .answers
                .iter()
                .find(|answer| {
                    answer.participant_id == participant_id && answer.question_id == question_id
                })
                .cloned())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
