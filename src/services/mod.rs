/// Answer validation, scoring and self-paced progression.
pub mod answer_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Quiz seeding.
pub mod quiz_service;
/// Host and participant resume snapshots.
pub mod resume_service;
/// Session lifecycle: lobby, joins, start, advance and finish.
pub mod session_service;
/// Storage connection supervisor with degraded-mode toggling.
pub mod storage_supervisor;
/// WebSocket connection and message handling service.
pub mod websocket_service;

#[cfg(test)]
pub(crate) mod test_support;
