//! Fixtures shared by the service tests.

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::extract::ws::Message;
use futures::future::BoxFuture;
use serde_json::{Value, json};
use tokio::{sync::mpsc, time::sleep};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::{
        models::{
            AnswerEntity, OptionEntity, PacingMode, ParticipantEntity, QuestionEntity, QuizEntity,
            SessionEntity,
        },
        quiz_store::{MemoryQuizStore, QuizStore},
        storage::{StorageError, StorageResult},
    },
    dto::{
        quiz::CreateQuizRequest,
        session::{CreateSessionResponse, JoinRequest, JoinResponse},
    },
    services::{quiz_service, session_service},
    state::{
        AppState, SharedState,
        registry::{ConnectionHandle, ConnectionRole},
    },
};

pub const HOST: &str = "host-1";

pub fn state() -> SharedState {
    AppState::with_store(AppConfig::default(), Arc::new(MemoryQuizStore::new()))
}

/// Seed a quiz whose question `n` has its correct option first.
pub async fn seed_quiz(
    state: &SharedState,
    mode: PacingMode,
    question_count: usize,
) -> (Uuid, Vec<QuestionEntity>) {
    let questions = (0..question_count)
        .map(|n| {
            json!({
                "text": format!("Question {n}"),
                "timeLimit": 20,
                "options": [
                    {"text": "right", "isCorrect": true},
                    {"text": "wrong"},
                ],
            })
        })
        .collect::<Vec<_>>();
    let request: CreateQuizRequest = serde_json::from_value(json!({
        "title": "Trivia",
        "mode": mode,
        "questions": questions,
    }))
    .unwrap();

    let summary = quiz_service::create_quiz(state, HOST, request).await.unwrap();
    let store = state.require_store().await.unwrap();
    let questions = store.list_questions(summary.id).await.unwrap();
    (summary.id, questions)
}

pub async fn open_session(
    state: &SharedState,
    mode: PacingMode,
    question_count: usize,
) -> (CreateSessionResponse, Vec<QuestionEntity>) {
    let (quiz_id, questions) = seed_quiz(state, mode, question_count).await;
    let session = session_service::create_session(state, quiz_id, HOST)
        .await
        .unwrap();
    (session, questions)
}

pub async fn join(state: &SharedState, code: &str, name: &str) -> JoinResponse {
    session_service::join(
        state,
        JoinRequest {
            join_code: code.to_owned(),
            name: name.to_owned(),
        },
    )
    .await
    .unwrap()
}

pub fn attach(
    state: &SharedState,
    code: &str,
    role: ConnectionRole,
    participant_id: Option<Uuid>,
) -> (ConnectionHandle, mpsc::Receiver<Message>) {
    state.registry().attach(code, role, participant_id).unwrap()
}

/// Every frame queued so far, decoded.
pub fn drain(rx: &mut mpsc::Receiver<Message>) -> Vec<Value> {
    let mut frames = Vec::new();
    while let Ok(message) = rx.try_recv() {
        if let Message::Text(text) = message {
            frames.push(serde_json::from_str(text.as_str()).unwrap());
        }
    }
    frames
}

pub fn types(frames: &[Value]) -> Vec<&str> {
    frames
        .iter()
        .map(|frame| frame["type"].as_str().unwrap_or_default())
        .collect()
}

pub fn correct_option(question: &QuestionEntity) -> Uuid {
    question
        .options
        .iter()
        .find(|option| option.is_correct)
        .map(|option| option.id)
        .unwrap()
}

pub fn wrong_option(question: &QuestionEntity) -> Uuid {
    question
        .options
        .iter()
        .find(|option| !option.is_correct)
        .map(|option| option.id)
        .unwrap()
}

/// Memory store whose writes can be made to fail or stall on demand.
#[derive(Clone, Default)]
pub struct FaultyStore {
    inner: MemoryQuizStore,
    failing_settles: Arc<AtomicUsize>,
    session_update_delay_ms: Arc<AtomicU64>,
    question_read_delay_ms: Arc<AtomicU64>,
}

impl FaultyStore {
    /// Fail the next `count` settling writes before they reach the tables.
    pub fn fail_next_settles(&self, count: usize) {
        self.failing_settles.store(count, Ordering::SeqCst);
    }

    /// Apply session updates, then hold the acknowledgement back for `delay`.
    pub fn delay_session_updates(&self, delay: Duration) {
        self.session_update_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Stall question listings for `delay`.
    pub fn delay_question_reads(&self, delay: Duration) {
        self.question_read_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

fn pause(delay_ms: &AtomicU64) -> Duration {
    Duration::from_millis(delay_ms.load(Ordering::SeqCst))
}

impl QuizStore for FaultyStore {
    fn insert_quiz(
        &self,
        quiz: QuizEntity,
        questions: Vec<QuestionEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.insert_quiz(quiz, questions)
    }

    fn find_quiz(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<QuizEntity>>> {
        self.inner.find_quiz(id)
    }

    fn list_questions(
        &self,
        quiz_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let delay = pause(&self.question_read_delay_ms);
        let read = self.inner.list_questions(quiz_id);
        Box::pin(async move {
            sleep(delay).await;
            read.await
        })
    }

    fn find_question(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>> {
        self.inner.find_question(id)
    }

    fn find_option(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<OptionEntity>>> {
        self.inner.find_option(id)
    }

    fn insert_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.insert_session(session)
    }

    fn find_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        self.inner.find_session(id)
    }

    fn find_session_by_code(
        &self,
        join_code: String,
    ) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        self.inner.find_session_by_code(join_code)
    }

    fn update_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let delay = pause(&self.session_update_delay_ms);
        let write = self.inner.update_session(session);
        Box::pin(async move {
            write.await?;
            sleep(delay).await;
            Ok(())
        })
    }

    fn insert_participant(
        &self,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.insert_participant(participant)
    }

    fn find_participant(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>> {
        self.inner.find_participant(id)
    }

    fn list_participants(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>> {
        self.inner.list_participants(session_id)
    }

    fn settle_answer(
        &self,
        participant_id: Uuid,
        index: u32,
        points: u32,
        advance_cursor: bool,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>> {
        let failing = self
            .failing_settles
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Box::pin(async {
                Err(StorageError::unavailable(
                    "participant write failed".into(),
                    io::Error::other("connection reset"),
                ))
            });
        }
        self.inner
            .settle_answer(participant_id, index, points, advance_cursor)
    }

    fn set_question_cursor(
        &self,
        participant_id: Uuid,
        cursor: Option<u32>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.set_question_cursor(participant_id, cursor)
    }

    fn reset_question_cursors(
        &self,
        session_id: Uuid,
        cursor: Option<u32>,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        self.inner.reset_question_cursors(session_id, cursor)
    }

    fn insert_answer(&self, answer: AnswerEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.insert_answer(answer)
    }

    fn find_answer(
        &self,
        participant_id: Uuid,
        question_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<AnswerEntity>>> {
        self.inner.find_answer(participant_id, question_id)
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.health_check()
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.try_reconnect()
    }
}

/// State backed by `store`, with transitions bounded by `transition_timeout`.
pub fn faulty_state(store: &FaultyStore, transition_timeout: Option<Duration>) -> SharedState {
    AppState::with_store(
        AppConfig::default().with_transition_timeout(transition_timeout),
        Arc::new(store.clone()),
    )
}
