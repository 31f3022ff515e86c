use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::error::EngineError;

lazy_static! {
    static ref BLANK_RUN: Regex = Regex::new("_+").unwrap();
}

/// Instructional prefixes the quiz generator sometimes prepends to
/// fill-in-blank texts. Matched case-insensitively and stripped before the
/// blank markers are counted.
const BLANK_PREFIXES: [&str; 4] = [
    "fill in the blanks:",
    "fill in the blank:",
    "fill in:",
    "complete the following:",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub id: i64,
    pub text: String,
    pub kind: QuestionKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QuestionKind {
    MultipleChoice {
        options: Vec<QuestionOption>,
        /// Correct option index; present only in server-side payloads.
        correct: Option<usize>,
    },
    TrueFalse {
        /// Correct value; present only in server-side payloads. The engine
        /// convention is option index 0 = true.
        correct: Option<bool>,
    },
    ShortAnswer,
    FillInBlank {
        /// Question text split around the blank markers. `parts.len() - 1`
        /// blanks sit between consecutive parts.
        parts: Vec<String>,
        blanks: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestionOption {
    pub key: String,
    pub text: String,
}

impl Question {
    /// Decode one raw question payload into the tagged union.
    pub fn decode(raw: &Value) -> Result<Question, EngineError> {
        let id = raw
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| malformed("question missing integer id"))?;

        let text = raw
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed(&format!("question {} missing text", id)))?
            .to_string();

        // The generator's storage schema defaults the type column to
        // multiple-choice, so a missing tag is treated the same way.
        let question_type = raw
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("multiple-choice");

        let kind = match question_type {
            "multiple-choice" => {
                let options = decode_options(id, raw.get("options"))?;
                let correct = decode_correct_index(raw.get("correct_answer"));
                if let Some(idx) = correct {
                    if idx >= options.len() {
                        return Err(malformed(&format!(
                            "question {}: correct option {} outside {} options",
                            id,
                            idx,
                            options.len()
                        )));
                    }
                }
                QuestionKind::MultipleChoice { options, correct }
            }
            "true-false" => {
                let correct = match raw.get("correct_answer") {
                    Some(Value::Bool(b)) => Some(*b),
                    // Stored as an option index: 0 = true, 1 = false.
                    Some(v) => v.as_i64().map(|idx| idx == 0),
                    None => None,
                };
                QuestionKind::TrueFalse { correct }
            }
            "short-answer" => QuestionKind::ShortAnswer,
            "fill-in-blank" => {
                let (parts, blanks) = parse_blank_parts(&text);
                if blanks == 0 {
                    return Err(malformed(&format!(
                        "question {}: fill-in-blank text contains no blank markers",
                        id
                    )));
                }
                QuestionKind::FillInBlank { parts, blanks }
            }
            other => {
                return Err(malformed(&format!(
                    "question {}: unrecognized type '{}'",
                    id, other
                )));
            }
        };

        Ok(Question { id, text, kind })
    }

    /// Number of sub-answers this question requires (1 except for
    /// fill-in-blank, where it equals the blank count).
    pub fn answer_arity(&self) -> usize {
        match &self.kind {
            QuestionKind::FillInBlank { blanks, .. } => *blanks,
            _ => 1,
        }
    }
}

fn malformed(msg: &str) -> EngineError {
    EngineError::MalformedQuestion(msg.to_string())
}

/// Options arrive either as a bare string array (keys are generated A, B, …)
/// or as an array of `{key, text}` objects. Anything else is malformed.
fn decode_options(id: i64, raw: Option<&Value>) -> Result<Vec<QuestionOption>, EngineError> {
    let list = raw
        .and_then(Value::as_array)
        .ok_or_else(|| malformed(&format!("question {}: multiple-choice without options", id)))?;

    if list.is_empty() {
        return Err(malformed(&format!("question {}: empty options list", id)));
    }

    let mut options = Vec::with_capacity(list.len());
    for (idx, entry) in list.iter().enumerate() {
        match entry {
            Value::String(text) => options.push(QuestionOption {
                key: option_key(idx),
                text: text.clone(),
            }),
            Value::Object(obj) => {
                let text = obj
                    .get("text")
                    .or_else(|| obj.get("value"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        malformed(&format!("question {}: option {} missing text", id, idx))
                    })?;
                let key = obj
                    .get("key")
                    .or_else(|| obj.get("label"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| option_key(idx));
                options.push(QuestionOption {
                    key,
                    text: text.to_string(),
                });
            }
            _ => {
                return Err(malformed(&format!(
                    "question {}: option {} is neither string nor object",
                    id, idx
                )));
            }
        }
    }

    Ok(options)
}

fn option_key(idx: usize) -> String {
    // A, B, … Z, then AA-style fallback for absurdly long option lists.
    let letter = (b'A' + (idx % 26) as u8) as char;
    if idx < 26 {
        letter.to_string()
    } else {
        format!("{}{}", letter, idx / 26)
    }
}

fn decode_correct_index(raw: Option<&Value>) -> Option<usize> {
    match raw {
        Some(Value::Number(n)) => n.as_u64().map(|v| v as usize),
        // The storage layer sometimes stringifies the index.
        Some(Value::String(s)) => s.trim().parse::<usize>().ok(),
        _ => None,
    }
}

/// Split a fill-in-blank text into its parts. A leading instructional prefix
/// is stripped first (case-insensitive); blanks are runs of one or more
/// underscores. Returns the parts and the blank count (`parts.len() - 1`).
pub fn parse_blank_parts(text: &str) -> (Vec<String>, usize) {
    let mut body = text.trim();
    for prefix in BLANK_PREFIXES {
        if let Some(head) = body.get(..prefix.len()) {
            if head.eq_ignore_ascii_case(prefix) {
                body = body[prefix.len()..].trim_start();
                break;
            }
        }
    }

    let parts: Vec<String> = BLANK_RUN.split(body).map(str::to_string).collect();
    let blanks = parts.len().saturating_sub(1);
    (parts, blanks)
}
