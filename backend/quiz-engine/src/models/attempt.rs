use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::answer::Answer;

/// One completed run through a quiz. The id is assigned by the grading
/// service on submission, never locally. A later revalidation may attach (or
/// replace) the `validation` breakdown; it never replaces the attempt itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub id: i64,
    pub quiz_id: i64,
    /// Integer percentage, 0-100, rounded from correct/total.
    pub score: i32,
    /// One entry per question, in quiz order; `None` marks a skipped slot.
    pub answers: Vec<Option<Answer>>,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationResult>,
}

/// AI-enhanced (or basic) per-question grading breakdown in canonical form.
/// All known server result shapes are normalized into this model by the
/// grading coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub overall_score: f64,
    #[serde(rename = "validation_method")]
    pub method: ValidationMethod,
    #[serde(rename = "validation_results")]
    pub questions: Vec<QuestionValidation>,
    pub revalidated_at: DateTime<Utc>,
}

/// Distinguishes quick heuristic scoring from AI-graded scoring so the UI
/// and analytics can tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMethod {
    Basic,
    Llm,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionValidation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_id: Option<i64>,
    /// 0-100; may carry partial credit, so fractional values are kept.
    pub score_percentage: f64,
    pub feedback: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_credit: Option<String>,
    /// The student answer echoed back by the grader, kept raw: its shape
    /// varies per question type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_answer: Option<Value>,
}

impl Attempt {
    /// Replace the attached validation breakdown and align the scalar score
    /// with the revalidated overall score. Calling this twice with the same
    /// result is idempotent in effect.
    pub fn attach_validation(&mut self, validation: ValidationResult) {
        self.score = validation.overall_score.round().clamp(0.0, 100.0) as i32;
        self.validation = Some(validation);
    }

    pub fn is_llm_validated(&self) -> bool {
        matches!(
            self.validation,
            Some(ValidationResult {
                method: ValidationMethod::Llm,
                ..
            })
        )
    }
}
