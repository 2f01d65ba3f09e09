use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{services::documentation::ApiDoc, state::SharedState};

const UI_PATH: &str = "/docs";
const DOCUMENT_PATH: &str = "/api-doc/openapi.json";

/// Swagger UI for the quiz and live-session API.
pub fn router() -> Router<SharedState> {
    SwaggerUi::new(UI_PATH)
        .url(DOCUMENT_PATH, ApiDoc::openapi())
        .into()
}
