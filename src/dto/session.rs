use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{PacingMode, ParticipantEntity, SessionEntity, SessionStatus},
    dto::{
        format_system_time,
        validation::validate_display_name,
        ws::{LeaderboardEntry, QuestionPayload},
    },
    state::session::cursor_or_sentinel,
};

/// Credentials and metadata of a freshly created session.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
    pub join_code: String,
    /// Secret required by host-only commands and the host WebSocket attach.
    pub host_token: String,
    pub mode: PacingMode,
}

/// Join request submitted from the lobby page.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub join_code: String,
    #[validate(custom(function = "validate_display_name"))]
    pub name: String,
}

/// Identity handed to a participant after joining.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub participant_id: Uuid,
    pub session_id: Uuid,
    pub join_code: String,
    pub name: String,
}

/// Public session status.
#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub join_code: String,
    pub status: SessionStatus,
    pub mode: PacingMode,
    /// Host-paced global cursor; `-1` while in the lobby.
    pub current_question_index: i64,
    /// RFC 3339 start time.
    pub started_at: Option<String>,
}

impl From<&SessionEntity> for SessionSummary {
    fn from(session: &SessionEntity) -> Self {
        Self {
            session_id: session.id,
            join_code: session.join_code.clone(),
            status: session.status,
            mode: session.mode,
            current_question_index: cursor_or_sentinel(session.current_question_index),
            started_at: session.started_at.map(format_system_time),
        }
    }
}

/// Outcome of a host-paced advance.
#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NextQuestionResponse {
    /// Whether the advance ended the game.
    pub finished: bool,
    pub question: Option<QuestionPayload>,
    pub leaderboard: Option<Vec<LeaderboardEntry>>,
}

/// Final ranking of a session.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LeaderboardResponse {
    pub leaderboard: Vec<LeaderboardEntry>,
}

/// Roster row of the host view.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantProgressView {
    pub id: Uuid,
    pub name: String,
    pub score: u32,
    /// Self-paced cursor; `-1` until started.
    pub question_cursor: i64,
    /// Self-paced participant went through every question.
    pub finished: bool,
}

impl ParticipantProgressView {
    /// Roster row for `participant`.
    pub fn new(participant: &ParticipantEntity, finished: bool) -> Self {
        Self {
            id: participant.id,
            name: participant.name.clone(),
            score: participant.score,
            question_cursor: cursor_or_sentinel(participant.question_cursor),
            finished,
        }
    }
}

/// State a host page needs to resume after a reload.
#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HostView {
    pub session: SessionSummary,
    /// Whether the host already opened gameplay.
    pub started: bool,
    pub question_count: usize,
    /// Question on screen for host-paced sessions.
    pub current_question: Option<QuestionPayload>,
    pub participants: Vec<ParticipantProgressView>,
    /// Final ranking once finished.
    pub leaderboard: Option<Vec<LeaderboardEntry>>,
}

/// Visual state a participant page resumes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResumeState {
    /// Waiting for the host to start.
    Lobby,
    /// A question is live and unanswered.
    Question,
    /// The live question was already answered.
    Answered,
    /// Nothing left to answer.
    Finished,
}

/// State a participant page needs to resume after a reload.
#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantView {
    pub participant_id: Uuid,
    pub name: String,
    pub score: u32,
    pub session: SessionSummary,
    pub state: ResumeState,
    /// Live question with its options, for the `QUESTION` and `ANSWERED` states.
    pub question: Option<QuestionPayload>,
}
