use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::{OptionEntity, QuestionEntity, QuizEntity},
    dto::quiz::{CreateQuizRequest, QuizSummary},
    error::ServiceError,
    state::SharedState,
};

/// Persist an authored quiz owned by `host_id`. Questions keep their payload order.
pub async fn create_quiz(
    state: &SharedState,
    host_id: &str,
    request: CreateQuizRequest,
) -> Result<QuizSummary, ServiceError> {
    let host_id = host_id.trim();
    if host_id.is_empty() {
        return Err(ServiceError::Unauthorized("missing host identity".into()));
    }

    let store = state.require_store().await?;
    let quiz = QuizEntity {
        id: Uuid::new_v4(),
        host_id: host_id.to_owned(),
        title: request.title.trim().to_owned(),
        description: request.description,
        mode: request.mode,
        created_at: SystemTime::now(),
    };

    let questions: Vec<QuestionEntity> = request
        .questions
        .into_iter()
        .enumerate()
        .map(|(position, input)| {
            let question_id = Uuid::new_v4();
            QuestionEntity {
                id: question_id,
                quiz_id: quiz.id,
                position: position as u32,
                text: input.text,
                time_limit_secs: input.time_limit,
                options: input
                    .options
                    .into_iter()
                    .map(|option| OptionEntity {
                        id: Uuid::new_v4(),
                        question_id,
                        text: option.text,
                        is_correct: option.is_correct,
                    })
                    .collect(),
            }
        })
        .collect();

    let summary = QuizSummary {
        id: quiz.id,
        title: quiz.title.clone(),
        description: quiz.description.clone(),
        mode: quiz.mode,
        question_count: questions.len(),
    };
    store.insert_quiz(quiz, questions).await?;
    info!(quiz = %summary.id, questions = summary.question_count, "quiz created");

    Ok(summary)
}
