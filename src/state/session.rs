//! Pacing-aware view over persisted session progress.

use indexmap::IndexMap;
use uuid::Uuid;

use crate::{
    dao::models::{PacingMode, ParticipantEntity, SessionEntity, SessionStatus},
    dto::ws::LeaderboardEntry,
};

/// Where a session stands, modelled per pacing mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// One global cursor advanced by the host; `None` while in the lobby.
    HostPaced { current_index: Option<usize> },
    /// One cursor per participant; `None` only while the session is in its lobby.
    SelfPaced {
        cursors: IndexMap<Uuid, Option<usize>>,
    },
}

impl Progress {
    /// Rebuild progress from stored rows. Only the cursors of `participants` are loaded.
    ///
    /// Once the session left its lobby, a self-paced participant without a stored cursor is on
    /// the first question.
    pub fn from_store<'a>(
        session: &SessionEntity,
        participants: impl IntoIterator<Item = &'a ParticipantEntity>,
    ) -> Self {
        let started = session.status != SessionStatus::Waiting;
        match session.mode {
            PacingMode::HostPaced => Self::HostPaced {
                current_index: session.current_question_index.map(|index| index as usize),
            },
            PacingMode::SelfPaced => Self::SelfPaced {
                cursors: participants
                    .into_iter()
                    .map(|participant| {
                        let cursor = match participant.question_cursor {
                            Some(cursor) => Some(cursor as usize),
                            None if started => Some(0),
                            None => None,
                        };
                        (participant.id, cursor)
                    })
                    .collect(),
            },
        }
    }

    /// Cursor of `participant_id`: the global index when host-paced, their own otherwise.
    ///
    /// May be past the last question when a self-paced participant has finished.
    pub fn cursor_for(&self, participant_id: Uuid) -> Option<usize> {
        match self {
            Self::HostPaced { current_index } => *current_index,
            Self::SelfPaced { cursors } => cursors.get(&participant_id).copied().flatten(),
        }
    }

    /// Index of the question `participant_id` may currently answer, if any.
    pub fn live_index_for(&self, participant_id: Uuid, question_count: usize) -> Option<usize> {
        self.cursor_for(participant_id)
            .filter(|index| *index < question_count)
    }

    /// Whether a self-paced participant went through every question.
    pub fn has_finished(&self, participant_id: Uuid, question_count: usize) -> bool {
        matches!(self, Self::SelfPaced { .. })
            && self
                .cursor_for(participant_id)
                .is_some_and(|cursor| cursor >= question_count)
    }
}

/// Wire form of a stored cursor, where `-1` stands for "not started".
pub fn cursor_or_sentinel(cursor: Option<u32>) -> i64 {
    cursor.map_or(-1, i64::from)
}

/// Rank `participants` (given in join order) by score, keeping join order among ties.
pub fn rank_leaderboard(participants: Vec<ParticipantEntity>, limit: usize) -> Vec<LeaderboardEntry> {
    let mut ranked = participants;
    // stable: equal scores keep join order
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
        .into_iter()
        .take(limit)
        .map(|participant| LeaderboardEntry {
            id: participant.id,
            name: participant.name,
            score: participant.score,
        })
        .collect()
}
