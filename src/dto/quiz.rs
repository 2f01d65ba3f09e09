use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{dao::models::PacingMode, dto::validation::validate_not_blank};

/// Payload used to seed a quiz together with its questions.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateQuizRequest {
    #[validate(custom(function = "validate_not_blank"))]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub mode: PacingMode,
    #[validate(nested)]
    #[serde(default)]
    pub questions: Vec<QuestionInput>,
}

/// Question definition in quiz order.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_single_correct_option"))]
pub struct QuestionInput {
    #[validate(custom(function = "validate_not_blank"))]
    pub text: String,
    /// Seconds allowed to answer.
    #[validate(range(min = 5, max = 120))]
    pub time_limit: u32,
    #[validate(length(min = 2, max = 4))]
    #[validate(nested)]
    pub options: Vec<OptionInput>,
}

/// Candidate answer of a question.
#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OptionInput {
    #[validate(custom(function = "validate_not_blank"))]
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

fn validate_single_correct_option(question: &QuestionInput) -> Result<(), ValidationError> {
    let correct = question
        .options
        .iter()
        .filter(|option| option.is_correct)
        .count();
    if correct != 1 {
        let mut err = ValidationError::new("single_correct_option");
        err.message =
            Some(format!("Exactly one option must be correct (got {correct})").into());
        return Err(err);
    }
    Ok(())
}

/// Quiz as returned after creation.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizSummary {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub mode: PacingMode,
    pub question_count: usize,
}
