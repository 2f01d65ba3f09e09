use std::time::SystemTime;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::models::{AnswerEntity, PacingMode},
    dto::ws::{QuestionPayload, ServerMessage},
    error::ServiceError,
    state::{
        SharedState, registry::ConnectionHandle, session::Progress,
        state_machine::SessionStateMachine,
    },
};

/// Outcome of an accepted answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub is_correct: bool,
    pub points: u32,
    pub score: u32,
}

/// Record one answer from `participant_id` on the connection `handle`.
///
/// Only the question currently live for that participant can be answered, once. The whole room
/// learns about the answer; self-paced participants are moved on to their next question.
///
/// An answer row whose score was never settled (the settling write failed) is completed by the
/// next submission for that question, keeping the option recorded first.
pub async fn submit_answer(
    state: &SharedState,
    handle: &ConnectionHandle,
    participant_id: Uuid,
    option_id: Uuid,
    time_taken_ms: u64,
) -> Result<AnswerOutcome, ServiceError> {
    let store = state.require_store().await?;
    let _gate = state.lock_participant(participant_id).await;

    let participant = store
        .find_participant(participant_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("participant not found".into()))?;
    let option = store
        .find_option(option_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("option not found".into()))?;
    let question = store
        .find_question(option.question_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("question not found".into()))?;
    let session = store
        .find_session(participant.session_id)
        .await?
        .filter(|session| session.join_code == handle.code())
        .ok_or_else(|| ServiceError::NotFound("game not found".into()))?;

    if !SessionStateMachine::from(session.status).accepts_answers() {
        return Err(ServiceError::InvalidState("game is not in progress".into()));
    }
    if question.quiz_id != session.quiz_id {
        return Err(ServiceError::InvalidState("question is not live".into()));
    }

    let questions = store.list_questions(session.quiz_id).await?;
    let progress = Progress::from_store(&session, [&participant]);
    let live = progress.live_index_for(participant.id, questions.len());
    if live != Some(question.position as usize) {
        debug!(
            participant = %participant.id,
            question = %question.id,
            ?live,
            "answer for a question that is not live"
        );
        return Err(ServiceError::InvalidState("question is not live".into()));
    }

    let is_correct = match store.find_answer(participant.id, question.id).await? {
        Some(_) if participant.has_settled(question.position) => {
            return Err(ServiceError::InvalidState("answer already submitted".into()));
        }
        Some(recorded) => {
            warn!(
                participant = %participant.id,
                question = %question.id,
                "settling a previously recorded answer"
            );
            recorded.is_correct
        }
        None => {
            store
                .insert_answer(AnswerEntity {
                    id: Uuid::new_v4(),
                    participant_id: participant.id,
                    question_id: question.id,
                    option_id: Some(option.id),
                    time_taken_ms,
                    is_correct: option.is_correct,
                    answered_at: SystemTime::now(),
                })
                .await?;
            option.is_correct
        }
    };

    let points = state.config().scoring().points_for(is_correct);
    let self_paced = session.mode == PacingMode::SelfPaced;
    let updated = store
        .settle_answer(participant.id, question.position, points, self_paced)
        .await?
        .ok_or_else(|| ServiceError::NotFound("participant not found".into()))?;
    let score = updated.score;

    info!(
        session = %session.id,
        participant = %participant.id,
        index = question.position,
        is_correct,
        points,
        score,
        "answer recorded"
    );

    let registry = state.registry();
    registry.broadcast(
        &session.join_code,
        &ServerMessage::ParticipantAnswer {
            participant_id: participant.id,
            name: participant.name.clone(),
            is_correct,
            points,
            score,
        },
    );
    registry.send_to(handle, &ServerMessage::AnswerReceived { points, score });

    if self_paced {
        let next = question.position + 1;
        match questions.get(next as usize) {
            Some(question) => {
                registry.send_to(
                    handle,
                    &ServerMessage::NextQuestion {
                        question: QuestionPayload::new(question, next as usize, questions.len()),
                    },
                );
                registry.broadcast(
                    &session.join_code,
                    &ServerMessage::ParticipantProgress {
                        participant_id: participant.id,
                        question_index: next as usize,
                        score,
                    },
                );
            }
            None => {
                registry.send_to(handle, &ServerMessage::GameOverSelf { score });
                registry.broadcast(
                    &session.join_code,
                    &ServerMessage::ParticipantFinished {
                        participant_id: participant.id,
                        score,
                    },
                );
                info!(session = %session.id, participant = %participant.id, score, "participant finished");
            }
        }
    }

    Ok(AnswerOutcome {
        is_correct,
        points,
        score,
    })
}
