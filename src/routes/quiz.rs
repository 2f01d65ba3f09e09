use axum::{Json, Router, extract::State, http::HeaderMap, routing::post};
use axum_valid::Valid;

use crate::{
    dto::quiz::{CreateQuizRequest, QuizSummary},
    error::AppError,
    routes::host_id_header,
    services::quiz_service,
    state::SharedState,
};

/// Quiz seeding endpoint.
pub fn router() -> Router<SharedState> {
    Router::new().route("/quizzes", post(create_quiz))
}

/// Store a quiz with its questions and options, owned by the calling host.
#[utoipa::path(
    post,
    path = "/quizzes",
    tag = "quizzes",
    params(("X-Host-Id" = String, Header, description = "Authenticated host identity")),
    request_body = CreateQuizRequest,
    responses(
        (status = 200, description = "Quiz created", body = QuizSummary),
        (status = 400, description = "Invalid quiz definition"),
        (status = 401, description = "Missing host identity"),
    )
)]
pub async fn create_quiz(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Valid(Json(payload)): Valid<Json<CreateQuizRequest>>,
) -> Result<Json<QuizSummary>, AppError> {
    let host_id = host_id_header(&headers)?;
    let summary = quiz_service::create_quiz(&state, &host_id, payload).await?;
    Ok(Json(summary))
}
