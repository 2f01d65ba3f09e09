use axum::{Router, http::HeaderMap};

use crate::{error::AppError, state::SharedState};

pub mod docs;
pub mod health;
pub mod quiz;
pub mod session;
pub mod websocket;

const HOST_ID_HEADER: &str = "x-host-id";

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(quiz::router())
        .merge(session::router(state.clone()))
        .merge(websocket::router());

    api_router.merge(docs::router()).with_state(state)
}

/// Host identity established upstream by the authentication layer.
pub(crate) fn host_id_header(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get(HOST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| AppError::Unauthorized("missing host identity header `X-Host-Id`".into()))
}
