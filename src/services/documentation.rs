use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for quiz-live-back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::quiz::create_quiz,
        crate::routes::session::create_session,
        crate::routes::session::join,
        crate::routes::session::start_game,
        crate::routes::session::next_question,
        crate::routes::session::end_game,
        crate::routes::session::host_view,
        crate::routes::session::participant_resume,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::quiz::CreateQuizRequest,
            crate::dto::quiz::QuestionInput,
            crate::dto::quiz::OptionInput,
            crate::dto::quiz::QuizSummary,
            crate::dto::session::CreateSessionResponse,
            crate::dto::session::JoinRequest,
            crate::dto::session::JoinResponse,
            crate::dto::session::SessionSummary,
            crate::dto::session::NextQuestionResponse,
            crate::dto::session::LeaderboardResponse,
            crate::dto::session::HostView,
            crate::dto::session::ParticipantProgressView,
            crate::dto::session::ParticipantView,
            crate::dto::session::ResumeState,
            crate::dto::ws::QuestionPayload,
            crate::dto::ws::OptionPayload,
            crate::dto::ws::LeaderboardEntry,
            crate::dao::models::PacingMode,
            crate::dao::models::SessionStatus,
            crate::state::registry::ConnectionRole,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "quizzes", description = "Quiz seeding"),
        (name = "sessions", description = "Lobby, host commands and resume views"),
        (name = "live", description = "WebSocket channel for hosts and participants"),
    )
)]
pub struct ApiDoc;
