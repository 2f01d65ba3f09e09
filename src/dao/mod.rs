/// Persistence-agnostic records of quizzes, sessions, participants and answers.
pub mod models;
/// Quiz store trait and its backends.
pub mod quiz_store;
/// Storage abstraction layer for database operations.
pub mod storage;
