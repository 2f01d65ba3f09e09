use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, Request},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::session::{
        CreateSessionResponse, HostView, JoinRequest, JoinResponse, LeaderboardResponse,
        NextQuestionResponse, ParticipantView, SessionSummary,
    },
    error::AppError,
    routes::host_id_header,
    services::{resume_service, session_service},
    state::SharedState,
};

const HOST_TOKEN_HEADER: &str = "x-host-token";

/// Session lifecycle endpoints: lobby creation, joining, host commands and resume views.
pub fn router(state: SharedState) -> Router<SharedState> {
    let host_routes = Router::new()
        .route("/sessions/{id}/start", post(start_game))
        .route("/sessions/{id}/next", post(next_question))
        .route("/sessions/{id}/end", post(end_game))
        .route("/sessions/{id}/host-view", get(host_view))
        .route_layer(middleware::from_fn_with_state(state, require_host_token));

    Router::new()
        .route("/quizzes/{id}/sessions", post(create_session))
        .route("/join", post(join))
        .route("/participants/{id}/resume", get(participant_resume))
        .merge(host_routes)
}

/// Open a lobby for a quiz owned by the calling host.
#[utoipa::path(
    post,
    path = "/quizzes/{id}/sessions",
    tag = "sessions",
    params(
        ("id" = Uuid, Path, description = "Quiz to play"),
        ("X-Host-Id" = String, Header, description = "Authenticated host identity"),
    ),
    responses(
        (status = 200, description = "Session created", body = CreateSessionResponse),
        (status = 403, description = "Quiz belongs to another host"),
        (status = 404, description = "Unknown quiz"),
    )
)]
pub async fn create_session(
    State(state): State<SharedState>,
    Path(quiz_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<CreateSessionResponse>, AppError> {
    let host_id = host_id_header(&headers)?;
    let created = session_service::create_session(&state, quiz_id, &host_id).await?;
    Ok(Json(created))
}

/// Register a participant in a waiting lobby.
#[utoipa::path(
    post,
    path = "/join",
    tag = "sessions",
    request_body = JoinRequest,
    responses(
        (status = 200, description = "Joined", body = JoinResponse),
        (status = 400, description = "Invalid name or join code"),
        (status = 404, description = "Game not found"),
        (status = 409, description = "Game already started or finished"),
    )
)]
pub async fn join(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<JoinRequest>>,
) -> Result<Json<JoinResponse>, AppError> {
    let joined = session_service::join(&state, payload).await?;
    Ok(Json(joined))
}

/// Open gameplay.
#[utoipa::path(
    post,
    path = "/sessions/{id}/start",
    tag = "sessions",
    params(
        ("id" = Uuid, Path, description = "Session identifier"),
        ("X-Host-Token" = String, Header, description = "Host token returned on session creation"),
    ),
    responses(
        (status = 200, description = "Game started", body = SessionSummary),
        (status = 409, description = "Game is not waiting or has no questions"),
    )
)]
pub async fn start_game(
    State(state): State<SharedState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionSummary>, AppError> {
    let summary = session_service::start_game(&state, session_id).await?;
    Ok(Json(summary))
}

/// Advance a host-paced game, finishing it after the last question.
#[utoipa::path(
    post,
    path = "/sessions/{id}/next",
    tag = "sessions",
    params(
        ("id" = Uuid, Path, description = "Session identifier"),
        ("X-Host-Token" = String, Header, description = "Host token returned on session creation"),
    ),
    responses(
        (status = 200, description = "Next question or final leaderboard", body = NextQuestionResponse),
        (status = 409, description = "Game is not running or is self-paced"),
    )
)]
pub async fn next_question(
    State(state): State<SharedState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<NextQuestionResponse>, AppError> {
    let outcome = session_service::advance(&state, session_id).await?;
    Ok(Json(outcome))
}

/// End the game and publish the final leaderboard.
#[utoipa::path(
    post,
    path = "/sessions/{id}/end",
    tag = "sessions",
    params(
        ("id" = Uuid, Path, description = "Session identifier"),
        ("X-Host-Token" = String, Header, description = "Host token returned on session creation"),
    ),
    responses((status = 200, description = "Final leaderboard", body = LeaderboardResponse))
)]
pub async fn end_game(
    State(state): State<SharedState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    let leaderboard = session_service::end_game(&state, session_id).await?;
    Ok(Json(leaderboard))
}

/// Snapshot a reloaded host page resumes from.
#[utoipa::path(
    get,
    path = "/sessions/{id}/host-view",
    tag = "sessions",
    params(
        ("id" = Uuid, Path, description = "Session identifier"),
        ("X-Host-Token" = String, Header, description = "Host token returned on session creation"),
    ),
    responses((status = 200, description = "Host resume state", body = HostView))
)]
pub async fn host_view(
    State(state): State<SharedState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<HostView>, AppError> {
    let view = resume_service::host_view(&state, session_id).await?;
    Ok(Json(view))
}

/// Snapshot a reloaded participant page resumes from.
#[utoipa::path(
    get,
    path = "/participants/{id}/resume",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Participant identifier")),
    responses(
        (status = 200, description = "Participant resume state", body = ParticipantView),
        (status = 404, description = "Unknown participant"),
    )
)]
pub async fn participant_resume(
    State(state): State<SharedState>,
    Path(participant_id): Path<Uuid>,
) -> Result<Json<ParticipantView>, AppError> {
    let view = resume_service::participant_view(&state, participant_id).await?;
    Ok(Json(view))
}

async fn require_host_token(
    State(state): State<SharedState>,
    Path(session_id): Path<Uuid>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(HOST_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_owned())
        .ok_or_else(|| AppError::Unauthorized("missing host token header `X-Host-Token`".into()))?;

    session_service::authorize_host(&state, session_id, &provided).await?;
    Ok(next.run(req).await)
}
