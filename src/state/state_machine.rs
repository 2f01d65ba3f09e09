use thiserror::Error;

use crate::dao::models::SessionStatus;

/// Indicates why a session moved to its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// Host-paced advance went past the last question.
    QuestionsExhausted,
    /// The host ended the game explicitly.
    HostEnded,
}

/// Events that can be applied to a session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Host starts the game from the lobby.
    Start,
    /// Host moves every participant to the next question.
    Advance,
    /// The game is over.
    Finish(FinishReason),
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while {from:?}")]
pub struct InvalidTransition {
    /// The status the session was in when the invalid event was received.
    pub from: SessionStatus,
    /// The event that cannot be applied from this status.
    pub event: SessionEvent,
}

/// Lifecycle of a single session: `WAITING -> ACTIVE -> FINISHED`, never backwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStateMachine {
    status: SessionStatus,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self {
            status: SessionStatus::Waiting,
        }
    }
}

impl From<SessionStatus> for SessionStateMachine {
    fn from(status: SessionStatus) -> Self {
        Self { status }
    }
}

impl SessionStateMachine {
    /// Create a state machine for a freshly created session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current status.
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Participants may register only while the lobby is open.
    pub fn accepts_joins(&self) -> bool {
        self.status == SessionStatus::Waiting
    }

    /// Answers are scored only during gameplay.
    pub fn accepts_answers(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Apply `event`, returning the new status.
    pub fn apply(&mut self, event: SessionEvent) -> Result<SessionStatus, InvalidTransition> {
        self.status = self.compute_transition(event)?;
        Ok(self.status)
    }

    /// Compute a transition from an event if the transition is valid.
    pub fn compute_transition(&self, event: SessionEvent) -> Result<SessionStatus, InvalidTransition> {
        let next = match (self.status, event) {
            (SessionStatus::Waiting, SessionEvent::Start) => SessionStatus::Active,
            (SessionStatus::Active, SessionEvent::Advance) => SessionStatus::Active,
            (SessionStatus::Active, SessionEvent::Finish(_)) => SessionStatus::Finished,
            // The host may close a lobby nobody played in.
            (SessionStatus::Waiting, SessionEvent::Finish(FinishReason::HostEnded)) => {
                SessionStatus::Finished
            }
            (SessionStatus::Finished, SessionEvent::Finish(FinishReason::HostEnded)) => {
                SessionStatus::Finished
            }
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}
