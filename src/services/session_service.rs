use std::time::SystemTime;

use rand::{Rng, distr::Alphanumeric};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        models::{PacingMode, ParticipantEntity, SessionEntity, SessionStatus},
        quiz_store::QuizStore,
    },
    dto::{
        session::{
            CreateSessionResponse, JoinRequest, JoinResponse, LeaderboardResponse,
            NextQuestionResponse, SessionSummary,
        },
        validation::validate_display_name,
        ws::{LeaderboardEntry, QuestionPayload, ServerMessage},
    },
    error::ServiceError,
    state::{
        SharedState,
        registry::ConnectionHandle,
        session::rank_leaderboard,
        state_machine::{FinishReason, SessionEvent, SessionStateMachine},
        transitions::{bounded, run_transition},
    },
};

const MAX_JOIN_CODE_ATTEMPTS: usize = 16;
const HOST_TOKEN_LENGTH: usize = 32;

fn host_token() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(HOST_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

fn game_not_found() -> ServiceError {
    ServiceError::NotFound("game not found".into())
}

fn not_a_member() -> ServiceError {
    ServiceError::Forbidden("participant does not belong to this game".into())
}

/// Open a lobby for `quiz_id` on behalf of its owning host.
pub async fn create_session(
    state: &SharedState,
    quiz_id: Uuid,
    host_id: &str,
) -> Result<CreateSessionResponse, ServiceError> {
    let store = state.require_store().await?;
    let quiz = store
        .find_quiz(quiz_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("quiz `{quiz_id}` not found")))?;

    if quiz.host_id != host_id {
        return Err(ServiceError::Forbidden(
            "only the quiz owner can open a session".into(),
        ));
    }

    let config = state.config();
    for attempt in 1..=MAX_JOIN_CODE_ATTEMPTS {
        let session = SessionEntity {
            id: Uuid::new_v4(),
            quiz_id,
            join_code: config.join_code().generate(),
            status: SessionStatus::Waiting,
            mode: quiz.mode,
            current_question_index: None,
            host_token: host_token(),
            started_at: None,
            created_at: SystemTime::now(),
        };

        match store.insert_session(session.clone()).await {
            Ok(()) => {
                info!(
                    session = %session.id,
                    code = %session.join_code,
                    mode = ?session.mode,
                    "session created"
                );
                return Ok(CreateSessionResponse {
                    session_id: session.id,
                    join_code: session.join_code,
                    host_token: session.host_token,
                    mode: session.mode,
                });
            }
            Err(err) if err.is_conflict() => {
                debug!(attempt, code = %session.join_code, "join code collision; drawing another");
            }
            Err(err) => return Err(err.into()),
        }
    }

    warn!(quiz = %quiz_id, "could not allocate a unique join code");
    Err(ServiceError::InvalidState(
        "could not allocate a unique join code".into(),
    ))
}

fn check_host_token(session: SessionEntity, token: &str) -> Result<SessionEntity, ServiceError> {
    if session.host_token == token {
        Ok(session)
    } else {
        Err(ServiceError::Forbidden(
            "host token does not match this game".into(),
        ))
    }
}

/// Ensure `token` is the host token of session `session_id`.
pub async fn authorize_host(
    state: &SharedState,
    session_id: Uuid,
    token: &str,
) -> Result<SessionEntity, ServiceError> {
    let store = state.require_store().await?;
    let session = store
        .find_session(session_id)
        .await?
        .ok_or_else(game_not_found)?;
    check_host_token(session, token)
}

/// Ensure `token` is the host token of the session behind join code `code`.
pub async fn authorize_host_by_code(
    state: &SharedState,
    code: &str,
    token: &str,
) -> Result<SessionEntity, ServiceError> {
    let store = state.require_store().await?;
    let session = store
        .find_session_by_code(code.to_owned())
        .await?
        .ok_or_else(game_not_found)?;
    check_host_token(session, token)
}

/// Resolve the session a room code refers to.
pub async fn session_by_code(state: &SharedState, code: &str) -> Result<SessionEntity, ServiceError> {
    let store = state.require_store().await?;
    store
        .find_session_by_code(code.to_owned())
        .await?
        .ok_or_else(game_not_found)
}

/// Ensure `participant_id` is registered in the session behind room code `code`.
pub async fn authorize_participant_by_code(
    state: &SharedState,
    code: &str,
    participant_id: Uuid,
) -> Result<ParticipantEntity, ServiceError> {
    let session = session_by_code(state, code).await?;
    let store = state.require_store().await?;
    store
        .find_participant(participant_id)
        .await?
        .filter(|participant| participant.session_id == session.id)
        .ok_or_else(not_a_member)
}

/// Register a participant in a lobby. Only allowed while the session is `WAITING`.
pub async fn join(state: &SharedState, request: JoinRequest) -> Result<JoinResponse, ServiceError> {
    let config = state.config();
    let code = request.join_code.trim().to_owned();
    if !config.join_code().is_valid(&code) {
        return Err(ServiceError::InvalidInput(format!(
            "`{code}` is not a valid join code"
        )));
    }
    let name = request.name.trim().to_owned();
    validate_display_name(&name).map_err(|err| {
        ServiceError::InvalidInput(
            err.message
                .map(|message| message.into_owned())
                .unwrap_or_else(|| "invalid name".into()),
        )
    })?;

    let session = session_by_code(state, &code).await?;

    run_transition(state, session.id, |store, session| async move {
        if !SessionStateMachine::from(session.status).accepts_joins() {
            return Err(ServiceError::InvalidState(
                "game already started or finished".into(),
            ));
        }

        let participant = ParticipantEntity {
            id: Uuid::new_v4(),
            session_id: session.id,
            name,
            score: 0,
            question_cursor: None,
            settled_index: None,
            joined_at: SystemTime::now(),
        };
        store.insert_participant(participant.clone()).await?;
        info!(
            session = %session.id,
            participant = %participant.id,
            name = %participant.name,
            "participant joined"
        );

        Ok(JoinResponse {
            participant_id: participant.id,
            session_id: session.id,
            join_code: session.join_code,
            name: participant.name,
        })
    })
    .await
}

/// `WAITING -> ACTIVE`. Self-paced sessions also hand the first question to the whole room.
pub async fn start_game(
    state: &SharedState,
    session_id: Uuid,
) -> Result<SessionSummary, ServiceError> {
    run_transition(state, session_id, |store, mut session| async move {
        let mut machine = SessionStateMachine::from(session.status);
        machine.apply(SessionEvent::Start)?;

        let questions = bounded(state, store.list_questions(session.quiz_id)).await?;
        let Some(first) = questions.first() else {
            return Err(ServiceError::InvalidState(
                "cannot start a quiz without questions".into(),
            ));
        };

        session.status = machine.status();
        session.started_at = Some(SystemTime::now());
        store.update_session(session.clone()).await?;
        if session.mode == PacingMode::SelfPaced {
            // an unset cursor reads as question 0 once the session is active
            if let Err(err) = store.reset_question_cursors(session.id, Some(0)).await {
                warn!(session = %session.id, error = %err, "could not reset participant cursors");
            }
        }

        let registry = state.registry();
        registry.broadcast(&session.join_code, &ServerMessage::Start { mode: session.mode });
        if session.mode == PacingMode::SelfPaced {
            registry.broadcast(
                &session.join_code,
                &ServerMessage::NextQuestion {
                    question: QuestionPayload::new(first, 0, questions.len()),
                },
            );
        }
        info!(session = %session.id, mode = ?session.mode, "game started");

        Ok(SessionSummary::from(&session))
    })
    .await
}

/// Host-paced advance. Past the last question the game finishes instead.
///
/// On an already finished session the final leaderboard is returned without broadcasting.
pub async fn advance(
    state: &SharedState,
    session_id: Uuid,
) -> Result<NextQuestionResponse, ServiceError> {
    run_transition(state, session_id, |store, mut session| async move {
        if session.status == SessionStatus::Finished {
            let limit = state.config().leaderboard_size();
            let leaderboard = bounded(state, store.list_participants(session.id))
                .await
                .map(|participants| rank_leaderboard(participants, limit))?;
            return Ok(NextQuestionResponse {
                finished: true,
                question: None,
                leaderboard: Some(leaderboard),
            });
        }
        if session.mode == PacingMode::SelfPaced {
            return Err(ServiceError::InvalidState(
                "participants advance on their own in self-paced games".into(),
            ));
        }
        SessionStateMachine::from(session.status).compute_transition(SessionEvent::Advance)?;

        let questions = bounded(state, store.list_questions(session.quiz_id)).await?;
        let next_index = session
            .current_question_index
            .map_or(0, |index| index as usize + 1);

        let Some(question) = questions.get(next_index) else {
            let leaderboard = finish(
                state,
                store.as_ref(),
                session,
                FinishReason::QuestionsExhausted,
            )
            .await?;
            return Ok(NextQuestionResponse {
                finished: true,
                question: None,
                leaderboard: Some(leaderboard),
            });
        };

        session.current_question_index = Some(next_index as u32);
        store.update_session(session.clone()).await?;

        let payload = QuestionPayload::new(question, next_index, questions.len());
        state.registry().broadcast(
            &session.join_code,
            &ServerMessage::NextQuestion {
                question: payload.clone(),
            },
        );
        info!(session = %session.id, index = next_index, "advanced to next question");

        Ok(NextQuestionResponse {
            finished: false,
            question: Some(payload),
            leaderboard: None,
        })
    })
    .await
}

/// End the game on host request. Repeating it re-broadcasts the same leaderboard.
pub async fn end_game(
    state: &SharedState,
    session_id: Uuid,
) -> Result<LeaderboardResponse, ServiceError> {
    let leaderboard = run_transition(state, session_id, |store, session| async move {
        finish(state, store.as_ref(), session, FinishReason::HostEnded).await
    })
    .await?;

    Ok(LeaderboardResponse { leaderboard })
}

async fn finish(
    state: &SharedState,
    store: &dyn QuizStore,
    mut session: SessionEntity,
    reason: FinishReason,
) -> Result<Vec<LeaderboardEntry>, ServiceError> {
    let mut machine = SessionStateMachine::from(session.status);
    let previous = machine.status();
    machine.apply(SessionEvent::Finish(reason))?;

    if previous != SessionStatus::Finished {
        session.status = machine.status();
        store.update_session(session.clone()).await?;
        info!(session = %session.id, ?reason, "game finished");
    }

    let leaderboard = leaderboard(store, session.id, state.config().leaderboard_size()).await?;
    state.registry().broadcast(
        &session.join_code,
        &ServerMessage::GameOver {
            leaderboard: leaderboard.clone(),
        },
    );
    Ok(leaderboard)
}

/// Top `limit` participants of a session by score, ties in join order.
pub async fn leaderboard(
    store: &dyn QuizStore,
    session_id: Uuid,
    limit: usize,
) -> Result<Vec<LeaderboardEntry>, ServiceError> {
    let participants = store.list_participants(session_id).await?;
    Ok(rank_leaderboard(participants, limit))
}

/// Bind a `JOIN` to its connection, announce it, and catch a late participant up.
pub async fn register_connection(
    state: &SharedState,
    handle: &ConnectionHandle,
    participant_id: Uuid,
) -> Result<(), ServiceError> {
    let store = state.require_store().await?;
    let session = store
        .find_session_by_code(handle.code().to_owned())
        .await?
        .ok_or_else(game_not_found)?;
    let participant = store
        .find_participant(participant_id)
        .await?
        .filter(|participant| participant.session_id == session.id)
        .ok_or_else(not_a_member)?;

    let registry = state.registry();
    registry.identify(handle, participant.id, &participant.name);
    registry.broadcast(
        handle.code(),
        &ServerMessage::PlayerJoined {
            participant_id: participant.id,
            name: participant.name.clone(),
        },
    );

    if session.status != SessionStatus::Active {
        return Ok(());
    }

    match session.mode {
        PacingMode::HostPaced => {
            let Some(index) = session.current_question_index else {
                return Ok(());
            };
            let questions = store.list_questions(session.quiz_id).await?;
            if let Some(question) = questions.get(index as usize) {
                registry.send_to(
                    handle,
                    &ServerMessage::NextQuestion {
                        question: QuestionPayload::new(question, index as usize, questions.len()),
                    },
                );
            }
        }
        PacingMode::SelfPaced => {
            let _gate = state.lock_participant(participant.id).await;
            let participant = store
                .find_participant(participant.id)
                .await?
                .ok_or_else(|| ServiceError::NotFound("participant not found".into()))?;
            let questions = store.list_questions(session.quiz_id).await?;

            let cursor = match participant.question_cursor {
                Some(cursor) => cursor as usize,
                None => {
                    store.set_question_cursor(participant.id, Some(0)).await?;
                    0
                }
            };

            let message = match questions.get(cursor) {
                Some(question) => ServerMessage::NextQuestion {
                    question: QuestionPayload::new(question, cursor, questions.len()),
                },
                None => ServerMessage::GameOverSelf {
                    score: participant.score,
                },
            };
            registry.send_to(handle, &message);
        }
    }

    Ok(())
}
