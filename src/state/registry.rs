//! Per-room bookkeeping of live WebSocket connections.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::ws::{Message, Utf8Bytes};
use dashmap::DashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::ws::ServerMessage;

/// Capability a connection was attached with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionRole {
    /// Session owner allowed to drive the game.
    Host,
    /// Player.
    #[default]
    Participant,
}

/// Identifies one attached connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionHandle {
    id: Uuid,
    code: String,
    role: ConnectionRole,
}

impl ConnectionHandle {
    /// Unique id of the connection.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Room the connection is attached to.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Role given at attach time.
    pub fn role(&self) -> ConnectionRole {
        self.role
    }
}

struct Member {
    role: ConnectionRole,
    participant_id: Option<Uuid>,
    name: Option<String>,
    tx: mpsc::Sender<Message>,
}

#[derive(Default)]
struct Room {
    members: IndexMap<Uuid, Member>,
}

impl Room {
    fn push(&self, code: &str, text: &Utf8Bytes) -> usize {
        self.members
            .iter()
            .filter(|(connection_id, member)| enqueue(code, **connection_id, &member.tx, text))
            .count()
    }
}

/// Snapshot of a connected member, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    /// Role of the connection.
    pub role: ConnectionRole,
    /// Participant bound to the connection, if known.
    pub participant_id: Option<Uuid>,
    /// Display name, once the participant joined.
    pub name: Option<String>,
}

/// Live connections grouped by room code.
///
/// Every room sits behind its own lock; fan-out enqueues into each member's bounded queue
/// while holding it, so all members observe a single order per room.
pub struct ConnectionRegistry {
    rooms: DashMap<String, Arc<Mutex<Room>>>,
    queue_capacity: usize,
}

fn lock(room: &Mutex<Room>) -> MutexGuard<'_, Room> {
    room.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Non-blocking send; a slow or gone receiver loses the frame instead of stalling the room.
fn enqueue(code: &str, connection_id: Uuid, tx: &mpsc::Sender<Message>, text: &Utf8Bytes) -> bool {
    match tx.try_send(Message::Text(text.clone())) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!(code, connection = %connection_id, "outbound queue full; dropping frame");
            false
        }
        Err(TrySendError::Closed(_)) => {
            debug!(code, connection = %connection_id, "outbound queue closed; dropping frame");
            false
        }
    }
}

fn serialize(message: &ServerMessage) -> Option<Utf8Bytes> {
    match serde_json::to_string(message) {
        Ok(payload) => Some(payload.into()),
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{message:?}`");
            None
        }
    }
}

impl ConnectionRegistry {
    /// Create an empty registry whose per-connection queues hold `queue_capacity` frames.
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Register a connection under `code`. Returns `None` for an empty code.
    ///
    /// The receiver yields every frame addressed to the connection until it is detached.
    pub fn attach(
        &self,
        code: &str,
        role: ConnectionRole,
        participant_id: Option<Uuid>,
    ) -> Option<(ConnectionHandle, mpsc::Receiver<Message>)> {
        let code = code.trim();
        if code.is_empty() {
            return None;
        }

        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let handle = ConnectionHandle {
            id: Uuid::new_v4(),
            code: code.to_owned(),
            role,
        };

        // Insert while the map entry is held so a concurrent detach cannot drop the room under us.
        let entry = self.rooms.entry(handle.code.clone()).or_default();
        lock(entry.value()).members.insert(
            handle.id,
            Member {
                role,
                participant_id,
                name: None,
                tx,
            },
        );
        drop(entry);

        Some((handle, rx))
    }

    /// Bind a participant identity and display name to an attached connection.
    pub fn identify(&self, handle: &ConnectionHandle, participant_id: Uuid, name: &str) -> bool {
        let Some(room) = self.room(&handle.code) else {
            return false;
        };
        let mut guard = lock(&room);
        match guard.members.get_mut(&handle.id) {
            Some(member) => {
                member.participant_id = Some(participant_id);
                member.name = Some(name.to_owned());
                true
            }
            None => false,
        }
    }

    /// Participant bound to a connection, if any.
    pub fn participant_id(&self, handle: &ConnectionHandle) -> Option<Uuid> {
        let room = self.room(&handle.code)?;
        let guard = lock(&room);
        guard
            .members
            .get(&handle.id)
            .and_then(|member| member.participant_id)
    }

    /// Remove a connection. Participants leaving trigger `PLAYER_LEFT` to the rest of the room.
    pub fn detach(&self, handle: &ConnectionHandle) {
        let Some(room) = self.room(&handle.code) else {
            return;
        };

        {
            let mut guard = lock(&room);
            let Some(member) = guard.members.shift_remove(&handle.id) else {
                return;
            };

            if member.role == ConnectionRole::Participant
                && let Some(text) = serialize(&ServerMessage::PlayerLeft {
                    participant_id: member.participant_id,
                })
            {
                guard.push(&handle.code, &text);
            }
        }

        self.rooms
            .remove_if(&handle.code, |_, room| lock(room).members.is_empty());
    }

    /// Deliver `message` to every connection of the room, returning how many queues accepted it.
    pub fn broadcast(&self, code: &str, message: &ServerMessage) -> usize {
        let Some(room) = self.room(code) else {
            debug!(code, "broadcast to a room without connections");
            return 0;
        };
        let Some(text) = serialize(message) else {
            return 0;
        };

        let guard = lock(&room);
        guard.push(code, &text)
    }

    /// Deliver `message` to a single connection.
    pub fn send_to(&self, handle: &ConnectionHandle, message: &ServerMessage) -> bool {
        let Some(room) = self.room(&handle.code) else {
            return false;
        };
        let Some(text) = serialize(message) else {
            return false;
        };

        let guard = lock(&room);
        guard
            .members
            .get(&handle.id)
            .is_some_and(|member| enqueue(&handle.code, handle.id, &member.tx, &text))
    }

    /// Members currently attached to `code`, in attach order.
    pub fn members(&self, code: &str) -> Vec<MemberInfo> {
        let Some(room) = self.room(code) else {
            return Vec::new();
        };
        let guard = lock(&room);
        guard
            .members
            .values()
            .map(|member| MemberInfo {
                role: member.role,
                participant_id: member.participant_id,
                name: member.name.clone(),
            })
            .collect()
    }

    /// Number of rooms with at least one connection.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn room(&self, code: &str) -> Option<Arc<Mutex<Room>>> {
        self.rooms.get(code).map(|room| room.value().clone())
    }
}
