use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// How a quiz advances through its questions. Copied onto a session at creation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PacingMode {
    /// One global index advanced by the host.
    HostPaced,
    /// Every participant advances on their own submissions.
    SelfPaced,
}

/// Persisted lifecycle status of a game session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// Lobby is open and participants may join.
    Waiting,
    /// Gameplay in progress.
    Active,
    /// Terminal state.
    Finished,
}

/// Quiz definition owned by a host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuizEntity {
    /// Stable identifier for the quiz.
    pub id: Uuid,
    /// Identity of the owning host, as established by the authentication layer.
    pub host_id: String,
    /// Display title.
    pub title: String,
    /// Optional free-form description.
    pub description: Option<String>,
    /// Pacing mode applied to sessions created from this quiz.
    pub mode: PacingMode,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

/// Question belonging to a quiz, with its answer options embedded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    /// Stable identifier for the question.
    pub id: Uuid,
    /// Owning quiz.
    pub quiz_id: Uuid,
    /// Zero-based ordinal inside the quiz (creation order).
    pub position: u32,
    /// Question text shown to players.
    pub text: String,
    /// Time allowed to answer, in seconds.
    pub time_limit_secs: u32,
    /// Candidate answers.
    pub options: Vec<OptionEntity>,
}

/// Answer option of a question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OptionEntity {
    /// Stable identifier for the option.
    pub id: Uuid,
    /// Owning question.
    pub question_id: Uuid,
    /// Option label.
    pub text: String,
    /// Whether picking this option scores.
    pub is_correct: bool,
}

/// Live or archived game session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionEntity {
    /// Primary key of the session.
    pub id: Uuid,
    /// Quiz played in this session.
    pub quiz_id: Uuid,
    /// Human-shareable join code, unique across sessions.
    pub join_code: String,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Pacing mode read from the quiz when the session was created.
    pub mode: PacingMode,
    /// Host-paced global cursor; `None` while in the lobby.
    pub current_question_index: Option<u32>,
    /// Secret presented by the owning host to drive the session.
    pub host_token: String,
    /// Time the host started the game.
    pub started_at: Option<SystemTime>,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

/// Player registered in a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantEntity {
    /// Primary key of the participant.
    pub id: Uuid,
    /// Owning session.
    pub session_id: Uuid,
    /// Display name chosen on join.
    pub name: String,
    /// Running score.
    pub score: u32,
    /// Self-paced cursor; `None` until the participant starts.
    pub question_cursor: Option<u32>,
    /// Position of the last question whose answer is folded into `score`.
    #[serde(default)]
    pub settled_index: Option<u32>,
    /// Join timestamp, used as the leaderboard tie-break.
    pub joined_at: SystemTime,
}

impl ParticipantEntity {
    /// Whether the answer to question `index` already counts towards the score.
    ///
    /// Answers arrive in increasing question order, so one high-water mark covers them all.
    pub fn has_settled(&self, index: u32) -> bool {
        self.settled_index.is_some_and(|settled| settled >= index)
    }
}

/// Append-only record of a submitted answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerEntity {
    /// Primary key of the answer.
    pub id: Uuid,
    /// Submitting participant.
    pub participant_id: Uuid,
    /// Question answered.
    pub question_id: Uuid,
    /// Chosen option, if any.
    pub option_id: Option<Uuid>,
    /// Client-reported time to answer, in milliseconds.
    pub time_taken_ms: u64,
    /// Correctness computed at submission time.
    pub is_correct: bool,
    /// Submission timestamp.
    pub answered_at: SystemTime,
}
