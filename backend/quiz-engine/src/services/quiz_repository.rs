use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde_json::Value;

use crate::config::Config;
use crate::error::EngineError;
use crate::models::{AnalyticsSeed, Attempt, Quiz};
use crate::services::grading_service::reconcile_validation;

/// Source of quiz definitions and attempt history. The engine calls it,
/// never owns it; persistence lives on the other side of this trait.
#[async_trait]
pub trait QuizRepository: Send + Sync {
    async fn get_quiz(&self, quiz_id: i64) -> Result<Quiz, EngineError>;

    async fn get_attempts(&self, quiz_id: i64) -> Result<Vec<Attempt>, EngineError>;

    /// Pre-aggregated statistics, when the repository computes them. `None`
    /// means the caller must aggregate raw attempts itself.
    async fn get_analytics_seed(&self, quiz_id: i64)
        -> Result<Option<AnalyticsSeed>, EngineError>;
}

/// HTTP-backed repository against the study-aid backend API.
pub struct HttpQuizRepository {
    client: reqwest::Client,
    base_url: String,
}

impl HttpQuizRepository {
    pub fn new(config: &Config) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.grading_api_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json(&self, url: &str) -> Result<Value, EngineError> {
        tracing::debug!("Fetching {}", url);
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(http_error("repository", response.status(), url));
        }

        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl QuizRepository for HttpQuizRepository {
    async fn get_quiz(&self, quiz_id: i64) -> Result<Quiz, EngineError> {
        let url = format!("{}/api/quizzes/{}", self.base_url, quiz_id);
        let raw = self.get_json(&url).await?;
        let quiz = Quiz::decode(&raw)?;
        tracing::info!(
            "Loaded quiz {} ('{}', {} questions)",
            quiz.id,
            quiz.title,
            quiz.len()
        );
        Ok(quiz)
    }

    async fn get_attempts(&self, quiz_id: i64) -> Result<Vec<Attempt>, EngineError> {
        let url = format!("{}/api/quizzes/{}/attempts", self.base_url, quiz_id);
        let raw = self.get_json(&url).await?;

        let rows = raw.as_array().ok_or_else(|| {
            EngineError::MalformedQuestion(format!("quiz {}: attempts payload is not a list", quiz_id))
        })?;

        rows.iter()
            .map(|row| decode_attempt(quiz_id, row))
            .collect()
    }

    async fn get_analytics_seed(
        &self,
        quiz_id: i64,
    ) -> Result<Option<AnalyticsSeed>, EngineError> {
        let url = format!("{}/api/quizzes/{}/analytics", self.base_url, quiz_id);
        let response = self.client.get(&url).send().await?;

        // Not every deployment pre-aggregates; absence is not an error.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(http_error("repository", response.status(), &url));
        }

        let seed = response.json::<AnalyticsSeed>().await?;
        Ok(Some(seed))
    }
}

fn http_error(who: &str, status: StatusCode, url: &str) -> EngineError {
    match status.as_u16() {
        404 | 409 | 410 | 422 => {
            EngineError::SubmissionRejected(format!("{} {} for {}", who, status, url))
        }
        _ => EngineError::NetworkFailure(format!("{} returned {} for {}", who, status, url)),
    }
}

/// Decode one stored attempt row. Historical rows may carry either grading
/// shape in `validation_results`; an undecodable breakdown is dropped with a
/// warning rather than poisoning the whole history.
fn decode_attempt(quiz_id: i64, raw: &Value) -> Result<Attempt, EngineError> {
    let id = raw.get("id").and_then(Value::as_i64).ok_or_else(|| {
        EngineError::MalformedQuestion(format!("quiz {}: attempt missing integer id", quiz_id))
    })?;

    let score = raw
        .get("score")
        .and_then(Value::as_f64)
        .ok_or_else(|| {
            EngineError::MalformedQuestion(format!("attempt {} missing score", id))
        })?
        .round()
        .clamp(0.0, 100.0) as i32;

    let submitted_at = raw
        .get("submitted_at")
        .and_then(Value::as_str)
        .and_then(parse_timestamp)
        .ok_or_else(|| {
            EngineError::MalformedQuestion(format!("attempt {} missing submitted_at", id))
        })?;

    let answers = raw
        .get("answers")
        .filter(|v| !v.is_null())
        .cloned()
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| {
            EngineError::MalformedQuestion(format!("attempt {}: bad answers payload: {}", id, e))
        })?
        .unwrap_or_default();

    let validation = match raw.get("validation_results") {
        None | Some(Value::Null) => None,
        Some(v) => match reconcile_validation(v) {
            Ok(mut validation) => {
                if let Some(at) = raw
                    .get("revalidated_at")
                    .and_then(Value::as_str)
                    .and_then(parse_timestamp)
                {
                    validation.revalidated_at = at;
                }
                Some(validation)
            }
            Err(e) => {
                tracing::warn!("Attempt {}: dropping undecodable validation: {}", id, e);
                None
            }
        },
    };

    Ok(Attempt {
        id,
        quiz_id,
        score,
        answers,
        submitted_at,
        validation,
    })
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_attempt_row_with_validation() {
        let raw = json!({
            "id": 7,
            "score": 66.7,
            "submitted_at": "2026-07-01T10:00:00Z",
            "answers": [1, null, ["Paris", "France"]],
            "validation_results": {
                "overall_score": 67.0,
                "validation_method": "llm",
                "validation_results": [
                    {"question_id": 1, "score_percentage": 100.0, "feedback": "Correct."}
                ]
            },
            "revalidated_at": "2026-07-01T10:05:00Z"
        });

        let attempt = decode_attempt(3, &raw).unwrap();
        assert_eq!(attempt.id, 7);
        assert_eq!(attempt.quiz_id, 3);
        assert_eq!(attempt.score, 67);
        assert_eq!(attempt.answers.len(), 3);
        assert!(attempt.answers[1].is_none());
        let validation = attempt.validation.unwrap();
        assert_eq!(validation.questions.len(), 1);
        assert_eq!(
            validation.revalidated_at,
            parse_timestamp("2026-07-01T10:05:00Z").unwrap()
        );
    }

    #[test]
    fn garbage_validation_is_dropped_not_fatal() {
        let raw = json!({
            "id": 8,
            "score": 50,
            "submitted_at": "2026-07-01T10:00:00Z",
            "validation_results": {"surprise": true}
        });

        let attempt = decode_attempt(3, &raw).unwrap();
        assert!(attempt.validation.is_none());
    }

    #[test]
    fn attempt_without_id_is_malformed() {
        let raw = json!({"score": 10, "submitted_at": "2026-07-01T10:00:00Z"});
        assert!(matches!(
            decode_attempt(3, &raw),
            Err(EngineError::MalformedQuestion(_))
        ));
    }
}
