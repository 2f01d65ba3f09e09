use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{MongoDaoError, MongoResult};
use crate::dao::models::{
    AnswerEntity, OptionEntity, PacingMode, ParticipantEntity, QuestionEntity, QuizEntity,
    SessionEntity, SessionStatus,
};

pub const QUIZ_COLLECTION: &str = "quizzes";
pub const QUESTION_COLLECTION: &str = "questions";
pub const SESSION_COLLECTION: &str = "sessions";
pub const PARTICIPANT_COLLECTION: &str = "participants";
pub const ANSWER_COLLECTION: &str = "answers";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoQuizDocument {
    #[serde(rename = "_id")]
    id: String,
    host_id: String,
    title: String,
    description: Option<String>,
    mode: PacingMode,
    created_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoQuestionDocument {
    #[serde(rename = "_id")]
    id: String,
    quiz_id: String,
    position: u32,
    text: String,
    time_limit_secs: u32,
    options: Vec<MongoOptionDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoOptionDocument {
    id: String,
    text: String,
    is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSessionDocument {
    #[serde(rename = "_id")]
    id: String,
    quiz_id: String,
    join_code: String,
    status: SessionStatus,
    mode: PacingMode,
    current_question_index: Option<u32>,
    host_token: String,
    started_at: Option<DateTime>,
    created_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoParticipantDocument {
    #[serde(rename = "_id")]
    id: String,
    session_id: String,
    name: String,
    score: i64,
    #[serde(default)]
    question_cursor: Option<u32>,
    #[serde(default)]
    settled_index: Option<u32>,
    joined_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoAnswerDocument {
    #[serde(rename = "_id")]
    id: String,
    participant_id: String,
    question_id: String,
    option_id: Option<String>,
    time_taken_ms: i64,
    is_correct: bool,
    answered_at: DateTime,
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}

fn parse_id(collection: &'static str, value: &str) -> MongoResult<Uuid> {
    Uuid::parse_str(value).map_err(|source| MongoDaoError::CorruptDocument {
        collection,
        id: value.to_owned(),
        source,
    })
}

impl From<QuizEntity> for MongoQuizDocument {
    fn from(value: QuizEntity) -> Self {
        Self {
            id: value.id.to_string(),
            host_id: value.host_id,
            title: value.title,
            description: value.description,
            mode: value.mode,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoQuizDocument> for QuizEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoQuizDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(QUIZ_COLLECTION, &value.id)?,
            host_id: value.host_id,
            title: value.title,
            description: value.description,
            mode: value.mode,
            created_at: value.created_at.to_system_time(),
        })
    }
}

impl From<QuestionEntity> for MongoQuestionDocument {
    fn from(value: QuestionEntity) -> Self {
        Self {
            id: value.id.to_string(),
            quiz_id: value.quiz_id.to_string(),
            position: value.position,
            text: value.text,
            time_limit_secs: value.time_limit_secs,
            options: value
                .options
                .into_iter()
                .map(|option| MongoOptionDocument {
                    id: option.id.to_string(),
                    text: option.text,
                    is_correct: option.is_correct,
                })
                .collect(),
        }
    }
}

impl TryFrom<MongoQuestionDocument> for QuestionEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoQuestionDocument) -> MongoResult<Self> {
        let id = parse_id(QUESTION_COLLECTION, &value.id)?;
        let options = value
            .options
            .into_iter()
            .map(|option| {
                Ok(OptionEntity {
                    id: parse_id(QUESTION_COLLECTION, &option.id)?,
                    question_id: id,
                    text: option.text,
                    is_correct: option.is_correct,
                })
            })
            .collect::<MongoResult<Vec<_>>>()?;

        Ok(Self {
            id,
            quiz_id: parse_id(QUESTION_COLLECTION, &value.quiz_id)?,
            position: value.position,
            text: value.text,
            time_limit_secs: value.time_limit_secs,
            options,
        })
    }
}

impl From<SessionEntity> for MongoSessionDocument {
    fn from(value: SessionEntity) -> Self {
        Self {
            id: value.id.to_string(),
            quiz_id: value.quiz_id.to_string(),
            join_code: value.join_code,
            status: value.status,
            mode: value.mode,
            current_question_index: value.current_question_index,
            host_token: value.host_token,
            started_at: value.started_at.map(DateTime::from_system_time),
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoSessionDocument> for SessionEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoSessionDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(SESSION_COLLECTION, &value.id)?,
            quiz_id: parse_id(SESSION_COLLECTION, &value.quiz_id)?,
            join_code: value.join_code,
            status: value.status,
            mode: value.mode,
            current_question_index: value.current_question_index,
            host_token: value.host_token,
            started_at: value.started_at.map(|at| at.to_system_time()),
            created_at: value.created_at.to_system_time(),
        })
    }
}

impl From<ParticipantEntity> for MongoParticipantDocument {
    fn from(value: ParticipantEntity) -> Self {
        Self {
            id: value.id.to_string(),
            session_id: value.session_id.to_string(),
            name: value.name,
            score: i64::from(value.score),
            question_cursor: value.question_cursor,
            settled_index: value.settled_index,
            joined_at: DateTime::from_system_time(value.joined_at),
        }
    }
}

impl TryFrom<MongoParticipantDocument> for ParticipantEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoParticipantDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(PARTICIPANT_COLLECTION, &value.id)?,
            session_id: parse_id(PARTICIPANT_COLLECTION, &value.session_id)?,
            name: value.name,
            score: u32::try_from(value.score.max(0)).unwrap_or(u32::MAX),
            question_cursor: value.question_cursor,
            settled_index: value.settled_index,
            joined_at: value.joined_at.to_system_time(),
        })
    }
}

impl From<AnswerEntity> for MongoAnswerDocument {
    fn from(value: AnswerEntity) -> Self {
        Self {
            id: value.id.to_string(),
            participant_id: value.participant_id.to_string(),
            question_id: value.question_id.to_string(),
            option_id: value.option_id.map(|id| id.to_string()),
            time_taken_ms: i64::try_from(value.time_taken_ms).unwrap_or(i64::MAX),
            is_correct: value.is_correct,
            answered_at: DateTime::from_system_time(value.answered_at),
        }
    }
}

impl TryFrom<MongoAnswerDocument> for AnswerEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoAnswerDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(ANSWER_COLLECTION, &value.id)?,
            participant_id: parse_id(ANSWER_COLLECTION, &value.participant_id)?,
            question_id: parse_id(ANSWER_COLLECTION, &value.question_id)?,
            option_id: value
                .option_id
                .as_deref()
                .map(|id| parse_id(ANSWER_COLLECTION, id))
                .transpose()?,
            time_taken_ms: u64::try_from(value.time_taken_ms.max(0)).unwrap_or_default(),
            is_correct: value.is_correct,
            answered_at: value.answered_at.to_system_time(),
        })
    }
}
