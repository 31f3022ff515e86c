use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineError;

pub mod answer;
pub mod attempt;
pub mod question;

pub use answer::{Answer, AnswerSheet};
pub use attempt::{Attempt, QuestionValidation, ValidationMethod, ValidationResult};
pub use question::{Question, QuestionKind, QuestionOption};

/// A generated quiz. Question order is significant and fixed for the life of
/// every attempt that references it.
#[derive(Debug, Clone, PartialEq)]
pub struct Quiz {
    pub id: i64,
    pub title: String,
    pub difficulty: Difficulty,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Extreme,
}

impl Difficulty {
    /// Lenient parse: the storage layer defaults the column to "medium", so
    /// unknown strings degrade to that rather than failing the whole quiz.
    pub fn parse(raw: &str) -> Difficulty {
        match raw.to_lowercase().as_str() {
            "easy" => Difficulty::Easy,
            "medium" => Difficulty::Medium,
            "hard" => Difficulty::Hard,
            "extreme" => Difficulty::Extreme,
            other => {
                tracing::debug!("Unknown difficulty '{}', defaulting to medium", other);
                Difficulty::Medium
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
            Difficulty::Extreme => "extreme",
        }
    }
}

impl Quiz {
    /// Decode a raw quiz payload. Any question that fails to decode aborts
    /// the whole quiz with `MalformedQuestion`.
    pub fn decode(raw: &Value) -> Result<Quiz, EngineError> {
        let id = raw
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| EngineError::MalformedQuestion("quiz missing integer id".into()))?;

        let title = raw
            .get("title")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                EngineError::MalformedQuestion(format!("quiz {} missing title", id))
            })?
            .to_string();

        let difficulty = raw
            .get("difficulty")
            .and_then(Value::as_str)
            .map(Difficulty::parse)
            .unwrap_or(Difficulty::Medium);

        let raw_questions = raw
            .get("questions")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                EngineError::MalformedQuestion(format!("quiz {} missing questions", id))
            })?;

        let questions = raw_questions
            .iter()
            .map(Question::decode)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Quiz {
            id,
            title,
            difficulty,
            questions,
        })
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// Pre-aggregated attempt statistics the repository may serve instead of raw
/// attempts. `recent_scores` is ordered most recent first, matching the
/// repository's `submitted_at DESC` convention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsSeed {
    pub total_attempts: u32,
    pub avg_score: f64,
    pub best_score: i32,
    #[serde(default)]
    pub recent_scores: Vec<i32>,
}
