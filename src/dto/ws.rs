use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dao::models::{PacingMode, QuestionEntity};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
/// Messages accepted from WebSocket clients.
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Bind the connection to a registered participant.
    #[serde(rename_all = "camelCase")]
    Join {
        participant_id: Uuid,
        #[serde(default)]
        name: Option<String>,
    },
    /// Host opens gameplay.
    StartGame,
    /// Participant submission.
    #[serde(rename_all = "camelCase")]
    Answer {
        participant_id: Uuid,
        option_id: Uuid,
        /// Milliseconds the participant took to answer.
        #[serde(default)]
        time_taken: u64,
    },
    /// Host-paced advance.
    NextQuestion,
    /// Host ends the game.
    EndGame,
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Parse an inbound text frame.
    pub fn from_json_str(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }

    /// Protocol name of the message, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join { .. } => "JOIN",
            Self::StartGame => "START_GAME",
            Self::Answer { .. } => "ANSWER",
            Self::NextQuestion => "NEXT_QUESTION",
            Self::EndGame => "END_GAME",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// Answer option as shown to clients; correctness is never sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OptionPayload {
    pub id: Uuid,
    pub text: String,
}

/// Question as shown to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPayload {
    /// Zero-based position in the quiz.
    pub index: usize,
    /// Number of questions in the quiz.
    pub total: usize,
    pub text: String,
    /// Seconds allowed to answer.
    pub time_limit: u32,
    pub options: Vec<OptionPayload>,
}

impl QuestionPayload {
    /// Strip a stored question down to what participants may see.
    pub fn new(question: &QuestionEntity, index: usize, total: usize) -> Self {
        Self {
            index,
            total,
            text: question.text.clone(),
            time_limit: question.time_limit_secs,
            options: question
                .options
                .iter()
                .map(|option| OptionPayload {
                    id: option.id,
                    text: option.text.clone(),
                })
                .collect(),
        }
    }
}

/// One row of a final ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LeaderboardEntry {
    pub id: Uuid,
    pub name: String,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Messages pushed by the server, either to a whole room or a single connection.
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    Start {
        mode: PacingMode,
    },
    NextQuestion {
        question: QuestionPayload,
    },
    #[serde(rename_all = "camelCase")]
    ParticipantAnswer {
        participant_id: Uuid,
        name: String,
        is_correct: bool,
        points: u32,
        score: u32,
    },
    AnswerReceived {
        points: u32,
        score: u32,
    },
    #[serde(rename_all = "camelCase")]
    ParticipantProgress {
        participant_id: Uuid,
        question_index: usize,
        score: u32,
    },
    #[serde(rename_all = "camelCase")]
    ParticipantFinished {
        participant_id: Uuid,
        score: u32,
    },
    GameOverSelf {
        score: u32,
    },
    GameOver {
        leaderboard: Vec<LeaderboardEntry>,
    },
    #[serde(rename_all = "camelCase")]
    PlayerJoined {
        participant_id: Uuid,
        name: String,
    },
    #[serde(rename_all = "camelCase")]
    PlayerLeft {
        participant_id: Option<Uuid>,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    /// Build an `ERROR` frame.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
