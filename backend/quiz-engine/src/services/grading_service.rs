use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::config::Config;
use crate::error::EngineError;
use crate::metrics::{ATTEMPTS_SUBMITTED_TOTAL, GRADING_REQUEST_DURATION_SECONDS, REVALIDATIONS_TOTAL};
use crate::models::answer::Answer;
use crate::models::{Attempt, AnswerSheet, QuestionValidation, Quiz, ValidationMethod, ValidationResult};

/// One answered slot as sent to the grading service. Sentinel (skipped)
/// slots are never serialized.
#[derive(Debug, Clone, Serialize)]
pub struct SubmittedAnswer {
    pub question_id: i64,
    pub answer: Answer,
}

/// The immediate (deterministic) grading result.
#[derive(Debug, Clone, Deserialize)]
pub struct GradedSubmission {
    pub attempt_id: i64,
    pub correct_count: u32,
    /// The service may echo a score; the engine derives its own from
    /// correct/total and treats this as advisory only.
    #[serde(default)]
    pub score: Option<f64>,
}

/// External scoring oracle. `revalidate` returns the raw JSON result on
/// purpose: the service has produced two different shapes over time and
/// normalizing them is the coordinator's job, not the transport's.
#[async_trait]
pub trait GradingService: Send + Sync {
    async fn submit(
        &self,
        quiz_id: i64,
        answers: &[SubmittedAnswer],
        idempotency_key: &str,
    ) -> Result<GradedSubmission, EngineError>;

    async fn revalidate(&self, attempt_id: i64) -> Result<Value, EngineError>;
}

/// HTTP-backed grading service against the study-aid backend API.
pub struct HttpGradingService {
    client: reqwest::Client,
    base_url: String,
    revalidate_timeout: std::time::Duration,
}

#[derive(Debug, Serialize)]
struct SubmitAttemptRequest<'a> {
    answers: &'a [SubmittedAnswer],
    idempotency_key: &'a str,
}

impl HttpGradingService {
    pub fn new(config: &Config) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.grading_api_url.trim_end_matches('/').to_string(),
            revalidate_timeout: std::time::Duration::from_secs(config.revalidate_timeout_secs),
        })
    }
}

#[async_trait]
impl GradingService for HttpGradingService {
    async fn submit(
        &self,
        quiz_id: i64,
        answers: &[SubmittedAnswer],
        idempotency_key: &str,
    ) -> Result<GradedSubmission, EngineError> {
        let url = format!("{}/api/quizzes/{}/attempts", self.base_url, quiz_id);
        tracing::debug!(
            "Submitting {} answers for quiz {} (key={})",
            answers.len(),
            quiz_id,
            idempotency_key
        );

        let response = self
            .client
            .post(&url)
            .json(&SubmitAttemptRequest {
                answers,
                idempotency_key,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(grading_http_error("submit", response.status().as_u16()));
        }

        Ok(response.json::<GradedSubmission>().await?)
    }

    async fn revalidate(&self, attempt_id: i64) -> Result<Value, EngineError> {
        let url = format!("{}/api/attempts/{}/revalidate", self.base_url, attempt_id);
        tracing::debug!("Requesting revalidation of attempt {}", attempt_id);

        // The LLM path is much slower than basic grading.
        let response = self
            .client
            .post(&url)
            .timeout(self.revalidate_timeout)
            .send()
            .await?;

        match response.status().as_u16() {
            200 => Ok(response.json::<Value>().await?),
            204 | 501 => Err(EngineError::ValidationUnavailable),
            status => Err(grading_http_error("revalidate", status)),
        }
    }
}

fn grading_http_error(operation: &str, status: u16) -> EngineError {
    match status {
        404 | 409 | 410 | 422 => EngineError::SubmissionRejected(format!(
            "grading service rejected {} with status {}",
            operation, status
        )),
        _ => EngineError::NetworkFailure(format!(
            "grading service returned {} for {}",
            status, operation
        )),
    }
}

/// Sits between the session state machine and the grading service: builds
/// answered-only submissions, owns the score derivation, and reconciles the
/// two known grading-result shapes into the canonical `ValidationResult`.
pub struct GradingCoordinator {
    service: Arc<dyn GradingService>,
}

impl GradingCoordinator {
    pub fn new(service: Arc<dyn GradingService>) -> Self {
        Self { service }
    }

    /// Submit the answered slots of the draft and build the graded Attempt.
    /// Unanswered questions are not sent; the service counts them incorrect
    /// by omission and the score denominator stays the full quiz length.
    pub async fn submit(
        &self,
        quiz: &Quiz,
        sheet: &AnswerSheet,
    ) -> Result<Attempt, EngineError> {
        let answers: Vec<SubmittedAnswer> = sheet
            .answered_entries()
            .map(|(index, answer)| SubmittedAnswer {
                question_id: quiz.questions[index].id,
                answer: answer.clone(),
            })
            .collect();

        let idempotency_key = Uuid::new_v4().to_string();
        let timer = GRADING_REQUEST_DURATION_SECONDS
            .with_label_values(&["submit"])
            .start_timer();
        let result = self
            .service
            .submit(quiz.id, &answers, &idempotency_key)
            .await;
        timer.observe_duration();

        let graded = match result {
            Ok(graded) => {
                ATTEMPTS_SUBMITTED_TOTAL.with_label_values(&["graded"]).inc();
                graded
            }
            Err(e) => {
                let label = match &e {
                    EngineError::SubmissionRejected(_) => "rejected",
                    _ => "failed",
                };
                ATTEMPTS_SUBMITTED_TOTAL.with_label_values(&[label]).inc();
                return Err(e);
            }
        };

        let score = derive_score(graded.correct_count, quiz.len());
        tracing::info!(
            "Attempt {} graded: {}/{} correct, score {}",
            graded.attempt_id,
            graded.correct_count,
            quiz.len(),
            score
        );

        Ok(Attempt {
            id: graded.attempt_id,
            quiz_id: quiz.id,
            score,
            answers: sheet.snapshot(),
            submitted_at: Utc::now(),
            validation: None,
        })
    }

    /// Request AI re-grading of an already scored attempt and normalize the
    /// result. Each call produces a fresh `ValidationResult` that the caller
    /// attaches in place of any previous one.
    pub async fn revalidate(&self, attempt: &Attempt) -> Result<ValidationResult, EngineError> {
        let timer = GRADING_REQUEST_DURATION_SECONDS
            .with_label_values(&["revalidate"])
            .start_timer();
        let raw = self.service.revalidate(attempt.id).await;
        timer.observe_duration();

        let validation = reconcile_validation(&raw?)?;
        REVALIDATIONS_TOTAL
            .with_label_values(&[match validation.method {
                ValidationMethod::Basic => "basic",
                ValidationMethod::Llm => "llm",
            }])
            .inc();

        tracing::info!(
            "Attempt {} revalidated: overall {:.1} ({:?}, {} questions)",
            attempt.id,
            validation.overall_score,
            validation.method,
            validation.questions.len()
        );

        Ok(validation)
    }
}

/// `round(100 * correct / total)`, clamped into the percentage range.
pub fn derive_score(correct_count: u32, total_questions: usize) -> i32 {
    if total_questions == 0 {
        return 0;
    }
    let raw = 100.0 * correct_count as f64 / total_questions as f64;
    (raw.round() as i32).clamp(0, 100)
}

/// Normalize a grading result into the canonical `ValidationResult`.
///
/// Two shapes are known:
/// - rich (AI grading): `{overall_score | new_score, validation_results: [...],
///   validation_method?}`
/// - flat (basic grading): `{score, correct_answers}`
///
/// Anything else fails loudly; guessing here would let a malformed grader
/// response masquerade as a real breakdown.
pub fn reconcile_validation(raw: &Value) -> Result<ValidationResult, EngineError> {
    if raw.is_null() {
        return Err(EngineError::ValidationUnavailable);
    }

    if let Some(list) = raw.get("validation_results") {
        if list.is_null() {
            return Err(EngineError::ValidationUnavailable);
        }
        let list = list.as_array().ok_or_else(|| {
            EngineError::MalformedQuestion("validation_results is not a list".into())
        })?;
        if list.is_empty() {
            return Err(EngineError::ValidationUnavailable);
        }

        let questions = list
            .iter()
            .map(decode_question_validation)
            .collect::<Result<Vec<_>, _>>()?;

        let overall_score = raw
            .get("overall_score")
            .or_else(|| raw.get("new_score"))
            .or_else(|| raw.get("score"))
            .and_then(Value::as_f64)
            .unwrap_or_else(|| {
                let sum: f64 = questions.iter().map(|q| q.score_percentage).sum();
                sum / questions.len() as f64
            });

        let method = match raw.get("validation_method").and_then(Value::as_str) {
            Some("basic") => ValidationMethod::Basic,
            // The rich shape comes from the LLM path unless tagged otherwise.
            _ => ValidationMethod::Llm,
        };

        return Ok(ValidationResult {
            overall_score,
            method,
            questions,
            revalidated_at: Utc::now(),
        });
    }

    if let (Some(score), Some(correct)) = (
        raw.get("score").and_then(Value::as_f64),
        raw.get("correct_answers"),
    ) {
        let questions = decode_flat_correct_answers(correct)?;
        return Ok(ValidationResult {
            overall_score: score,
            method: ValidationMethod::Basic,
            questions,
            revalidated_at: Utc::now(),
        });
    }

    Err(EngineError::MalformedQuestion(
        "unrecognized grading result shape".into(),
    ))
}

fn decode_question_validation(raw: &Value) -> Result<QuestionValidation, EngineError> {
    let score_percentage = raw
        .get("score_percentage")
        .or_else(|| raw.get("score"))
        .and_then(Value::as_f64)
        .ok_or_else(|| {
            EngineError::MalformedQuestion("validation entry missing score_percentage".into())
        })?;

    Ok(QuestionValidation {
        question_id: raw.get("question_id").and_then(Value::as_i64),
        score_percentage,
        feedback: raw
            .get("feedback")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        partial_credit: raw
            .get("partial_credit")
            .or_else(|| raw.get("partial_credit_explanation"))
            .and_then(Value::as_str)
            .map(str::to_string),
        student_answer: raw.get("student_answer").cloned().filter(|v| !v.is_null()),
    })
}

/// The flat shape's `correct_answers` is either a plain count or a list of
/// per-question booleans / `{question_id, correct}` objects.
fn decode_flat_correct_answers(raw: &Value) -> Result<Vec<QuestionValidation>, EngineError> {
    let list = match raw {
        Value::Number(_) => return Ok(Vec::new()),
        Value::Array(list) => list,
        _ => {
            return Err(EngineError::MalformedQuestion(
                "correct_answers is neither count nor list".into(),
            ))
        }
    };

    list.iter()
        .enumerate()
        .map(|(idx, entry)| {
            let (question_id, correct) = match entry {
                Value::Bool(b) => (None, *b),
                Value::Object(obj) => (
                    obj.get("question_id").and_then(Value::as_i64),
                    obj.get("correct").and_then(Value::as_bool).unwrap_or(false),
                ),
                _ => {
                    return Err(EngineError::MalformedQuestion(format!(
                        "correct_answers entry {} is neither bool nor object",
                        idx
                    )))
                }
            };
            Ok(QuestionValidation {
                question_id,
                score_percentage: if correct { 100.0 } else { 0.0 },
                feedback: if correct {
                    "Correct.".to_string()
                } else {
                    "Incorrect.".to_string()
                },
                partial_credit: None,
                student_answer: None,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn score_is_rounded_integer_percentage() {
        assert_eq!(derive_score(2, 3), 67);
        assert_eq!(derive_score(1, 3), 33);
        assert_eq!(derive_score(0, 3), 0);
        assert_eq!(derive_score(3, 3), 100);
        assert_eq!(derive_score(0, 0), 0);
    }

    #[test]
    fn reconciles_rich_llm_shape() {
        let raw = json!({
            "overall_score": 83.5,
            "validation_results": [
                {"question_id": 1, "score_percentage": 100.0, "feedback": "Correct."},
                {"question_id": 2, "score_percentage": 67.0, "feedback": "Partially right.",
                 "partial_credit_explanation": "Second blank is misspelled.",
                 "student_answer": ["Paris", "Frnce"]}
            ]
        });

        let v = reconcile_validation(&raw).unwrap();
        assert_eq!(v.method, ValidationMethod::Llm);
        assert_eq!(v.overall_score, 83.5);
        assert_eq!(v.questions.len(), 2);
        assert_eq!(
            v.questions[1].partial_credit.as_deref(),
            Some("Second blank is misspelled.")
        );
    }

    #[test]
    fn rich_shape_overall_falls_back_to_new_score_then_mean() {
        let raw = json!({
            "new_score": 75.0,
            "validation_results": [{"score_percentage": 50.0, "feedback": ""}]
        });
        assert_eq!(reconcile_validation(&raw).unwrap().overall_score, 75.0);

        let raw = json!({
            "validation_results": [
                {"score_percentage": 50.0, "feedback": ""},
                {"score_percentage": 100.0, "feedback": ""}
            ]
        });
        assert_eq!(reconcile_validation(&raw).unwrap().overall_score, 75.0);
    }

    #[test]
    fn reconciles_flat_basic_shape() {
        let raw = json!({"score": 67, "correct_answers": [true, false, true]});

        let v = reconcile_validation(&raw).unwrap();
        assert_eq!(v.method, ValidationMethod::Basic);
        assert_eq!(v.overall_score, 67.0);
        assert_eq!(v.questions.len(), 3);
        assert_eq!(v.questions[0].score_percentage, 100.0);
        assert_eq!(v.questions[1].score_percentage, 0.0);
    }

    #[test]
    fn flat_shape_accepts_plain_count() {
        let raw = json!({"score": 50, "correct_answers": 2});
        let v = reconcile_validation(&raw).unwrap();
        assert_eq!(v.method, ValidationMethod::Basic);
        assert!(v.questions.is_empty());
    }

    #[test]
    fn reconciliation_is_deterministic() {
        let raw = json!({
            "overall_score": 90.0,
            "validation_results": [{"question_id": 1, "score_percentage": 90.0, "feedback": "ok"}]
        });
        let a = reconcile_validation(&raw).unwrap();
        let b = reconcile_validation(&raw).unwrap();
        assert_eq!(a.overall_score, b.overall_score);
        assert_eq!(a.questions, b.questions);
        assert_eq!(a.method, b.method);
    }

    #[test]
    fn unknown_shape_fails_loudly() {
        let raw = json!({"grade": "A+", "vibes": "good"});
        assert!(matches!(
            reconcile_validation(&raw),
            Err(EngineError::MalformedQuestion(_))
        ));
    }

    #[test]
    fn null_or_empty_breakdown_is_unavailable() {
        assert!(matches!(
            reconcile_validation(&Value::Null),
            Err(EngineError::ValidationUnavailable)
        ));
        assert!(matches!(
            reconcile_validation(&json!({"validation_results": null})),
            Err(EngineError::ValidationUnavailable)
        ));
        assert!(matches!(
            reconcile_validation(&json!({"validation_results": []})),
            Err(EngineError::ValidationUnavailable)
        ));
    }
}
