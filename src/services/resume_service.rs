//! Snapshots that let a reloaded page pick up where it left off.

use uuid::Uuid;

use crate::{
    dao::models::{PacingMode, SessionStatus},
    dto::{
        session::{HostView, ParticipantProgressView, ParticipantView, ResumeState, SessionSummary},
        ws::QuestionPayload,
    },
    error::ServiceError,
    services::session_service,
    state::{SharedState, session::Progress},
};

/// Host resume: status, roster with progress, and the live question or final ranking.
pub async fn host_view(state: &SharedState, session_id: Uuid) -> Result<HostView, ServiceError> {
    let store = state.require_store().await?;
    let session = store
        .find_session(session_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("game not found".into()))?;
    let questions = store.list_questions(session.quiz_id).await?;
    let participants = store.list_participants(session.id).await?;
    let progress = Progress::from_store(&session, &participants);

    let current_question = match (session.mode, session.current_question_index) {
        (PacingMode::HostPaced, Some(index)) if session.status == SessionStatus::Active => questions
            .get(index as usize)
            .map(|question| QuestionPayload::new(question, index as usize, questions.len())),
        _ => None,
    };

    let roster = participants
        .iter()
        .map(|participant| {
            ParticipantProgressView::new(
                participant,
                progress.has_finished(participant.id, questions.len()),
            )
        })
        .collect();

    let leaderboard = if session.status == SessionStatus::Finished {
        Some(
            session_service::leaderboard(
                store.as_ref(),
                session.id,
                state.config().leaderboard_size(),
            )
            .await?,
        )
    } else {
        None
    };

    Ok(HostView {
        started: session.status != SessionStatus::Waiting,
        question_count: questions.len(),
        session: SessionSummary::from(&session),
        current_question,
        participants: roster,
        leaderboard,
    })
}

/// Participant resume: which screen to show and the question behind it.
pub async fn participant_view(
    state: &SharedState,
    participant_id: Uuid,
) -> Result<ParticipantView, ServiceError> {
    let store = state.require_store().await?;
    let participant = store
        .find_participant(participant_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("participant not found".into()))?;
    let session = store
        .find_session(participant.session_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("game not found".into()))?;

    let (resume, question) = match session.status {
        SessionStatus::Waiting => (ResumeState::Lobby, None),
        SessionStatus::Finished => (ResumeState::Finished, None),
        SessionStatus::Active => {
            let questions = store.list_questions(session.quiz_id).await?;
            let progress = Progress::from_store(&session, [&participant]);
            match progress.live_index_for(participant.id, questions.len()) {
                Some(index) => {
                    let live = &questions[index];
                    let recorded = store.find_answer(participant.id, live.id).await?.is_some();
                    // an unsettled answer stays open for a retry
                    let screen = if recorded && participant.has_settled(index as u32) {
                        ResumeState::Answered
                    } else {
                        ResumeState::Question
                    };
                    (
                        screen,
                        Some(QuestionPayload::new(live, index, questions.len())),
                    )
                }
                None if progress.has_finished(participant.id, questions.len()) => {
                    (ResumeState::Finished, None)
                }
                // started, but no question on screen yet
                None => (ResumeState::Lobby, None),
            }
        }
    };

    Ok(ParticipantView {
        participant_id: participant.id,
        name: participant.name,
        score: participant.score,
        session: SessionSummary::from(&session),
        state: resume,
        question,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        services::{answer_service, test_support::*},
        state::registry::ConnectionRole,
    };

    #[tokio::test]
    async fn participant_resumes_into_the_matching_screen() {
        let state = state();
        let (session, questions) = open_session(&state, PacingMode::HostPaced, 2).await;
        let ada = join(&state, &session.join_code, "ada").await;
        let (handle, _rx) = attach(
            &state,
            &session.join_code,
            ConnectionRole::Participant,
            Some(ada.participant_id),
        );

        let lobby = participant_view(&state, ada.participant_id).await.unwrap();
        assert_eq!(lobby.state, ResumeState::Lobby);
        assert_eq!(lobby.session.current_question_index, -1);

        session_service::start_game(&state, session.session_id).await.unwrap();
        session_service::advance(&state, session.session_id).await.unwrap();
        let live = participant_view(&state, ada.participant_id).await.unwrap();
        assert_eq!(live.state, ResumeState::Question);
        assert_eq!(live.question.map(|q| q.index), Some(0));

        answer_service::submit_answer(
            &state,
            &handle,
            ada.participant_id,
            correct_option(&questions[0]),
            0,
        )
        .await
        .unwrap();
        let answered = participant_view(&state, ada.participant_id).await.unwrap();
        assert_eq!(answered.state, ResumeState::Answered);
        assert_eq!(answered.score, 100);

        session_service::end_game(&state, session.session_id).await.unwrap();
        let finished = participant_view(&state, ada.participant_id).await.unwrap();
        assert_eq!(finished.state, ResumeState::Finished);
        assert!(finished.question.is_none());
    }

    #[tokio::test]
    async fn host_view_tracks_roster_progress() {
        let state = state();
        let (session, questions) = open_session(&state, PacingMode::SelfPaced, 1).await;
        let ada = join(&state, &session.join_code, "ada").await;
        join(&state, &session.join_code, "bob").await;
        let (handle, _rx) = attach(
            &state,
            &session.join_code,
            ConnectionRole::Participant,
            Some(ada.participant_id),
        );

        let waiting = host_view(&state, session.session_id).await.unwrap();
        assert!(!waiting.started);
        assert_eq!(waiting.participants.len(), 2);
        assert_eq!(waiting.participants[0].question_cursor, -1);

        session_service::start_game(&state, session.session_id).await.unwrap();
        answer_service::submit_answer(
            &state,
            &handle,
            ada.participant_id,
            correct_option(&questions[0]),
            0,
        )
        .await
        .unwrap();

        let view = host_view(&state, session.session_id).await.unwrap();
        assert!(view.started);
        assert_eq!(view.question_count, 1);
        assert!(view.current_question.is_none());
        assert!(view.participants[0].finished);
        assert!(!view.participants[1].finished);
        assert!(view.leaderboard.is_none());

        session_service::end_game(&state, session.session_id).await.unwrap();
        let finished = host_view(&state, session.session_id).await.unwrap();
        let board = finished.leaderboard.unwrap();
        assert_eq!(board[0].name, "ada");
        assert_eq!(board[0].score, 100);
    }

    #[tokio::test]
    async fn unknown_participant_is_not_found() {
        let state = state();
        assert!(matches!(
            participant_view(&state, Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
