use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Payload of the `/healthcheck` route.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// "ok", or "degraded" while storage is unreachable.
    pub status: String,
    /// Rooms with at least one live connection.
    pub active_rooms: usize,
}

impl HealthResponse {
    /// Storage reachable.
    pub fn ok(active_rooms: usize) -> Self {
        Self {
            status: "ok".to_string(),
            active_rooms,
        }
    }

    /// Running without storage.
    pub fn degraded(active_rooms: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            active_rooms,
        }
    }
}
