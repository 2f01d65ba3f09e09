use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    error::AppError,
    services::{
        session_service,
        websocket_service::{self, ConnectionParams},
    },
    state::{SharedState, registry::ConnectionRole},
};

/// Attach parameters of the `/ws` upgrade.
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct WsParams {
    /// Room code (the session's join code).
    #[serde(alias = "sessionId")]
    pub code: String,
    /// `HOST` or `PARTICIPANT` (default).
    #[serde(default)]
    pub role: ConnectionRole,
    /// Identity to recover on reconnect.
    pub participant_id: Option<Uuid>,
    /// Host token, required for `HOST`.
    pub token: Option<String>,
}

#[utoipa::path(
    get,
    path = "/ws",
    tag = "live",
    params(WsParams),
    responses(
        (status = 101, description = "Switching protocols to WebSocket"),
        (status = 401, description = "Host attach without a token"),
        (status = 403, description = "Host token or participant does not match the room"),
        (status = 404, description = "No game behind the room code"),
    )
)]
/// Upgrade the HTTP connection into a host or participant WebSocket session.
pub async fn ws_handler(
    State(state): State<SharedState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    if params.role == ConnectionRole::Host {
        let token = params
            .token
            .as_deref()
            .ok_or_else(|| AppError::Unauthorized("host attach requires `token`".into()))?;
        session_service::authorize_host_by_code(&state, &params.code, token).await?;
    } else if let Some(participant_id) = params.participant_id {
        session_service::authorize_participant_by_code(&state, &params.code, participant_id)
            .await?;
    }

    let connection = ConnectionParams {
        code: params.code,
        role: params.role,
        participant_id: params.participant_id,
    };
    Ok(ws
        .on_upgrade(move |socket| websocket_service::handle_socket(state, socket, connection))
        .into_response())
}

/// Configure the WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/ws", get(ws_handler))
}
