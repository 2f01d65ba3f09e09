pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{
    AnswerEntity, OptionEntity, ParticipantEntity, QuestionEntity, QuizEntity, SessionEntity,
};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use uuid::Uuid;

pub use memory::MemoryQuizStore;

/// Abstraction over the persistence layer consumed by the live session engine.
///
/// Questions and options are read-only inputs during a session. Sessions,
/// participants and answers are written by the engine; answers are append-only.
pub trait QuizStore: Send + Sync {
    /// Persist a quiz together with its ordered questions.
    fn insert_quiz(
        &self,
        quiz: QuizEntity,
        questions: Vec<QuestionEntity>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn find_quiz(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<QuizEntity>>>;
    /// Questions of a quiz ordered by their position.
    fn list_questions(&self, quiz_id: Uuid)
    -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>>;
    fn find_question(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>>;
    fn find_option(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<OptionEntity>>>;

    /// Insert a new session; fails with a conflict when the join code is taken.
    fn insert_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>>;
    fn find_session_by_code(
        &self,
        join_code: String,
    ) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>>;
    /// Replace the stored session document.
    fn update_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>>;

    fn insert_participant(
        &self,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn find_participant(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>>;
    /// Participants of a session in join order.
    fn list_participants(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>>;
    /// Fold the answer to question `index` into the participant's row in one atomic write.
    ///
    /// Adds `points`, records `index` as settled and, when `advance_cursor` is set, moves the
    /// cursor to `index + 1`. A row that already settled `index` is left untouched, so
    /// repeating the call is harmless. Returns the row as stored afterwards.
    fn settle_answer(
        &self,
        participant_id: Uuid,
        index: u32,
        points: u32,
        advance_cursor: bool,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>>;
    fn set_question_cursor(
        &self,
        participant_id: Uuid,
        cursor: Option<u32>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Set the cursor of every participant of a session, returning how many rows changed.
    fn reset_question_cursors(
        &self,
        session_id: Uuid,
        cursor: Option<u32>,
    ) -> BoxFuture<'static, StorageResult<u64>>;

    fn insert_answer(&self, answer: AnswerEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_answer(
        &self,
        participant_id: Uuid,
        question_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<AnswerEntity>>>;

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
