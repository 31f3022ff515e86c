#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use studyquiz_engine::error::EngineError;
use studyquiz_engine::models::{
    AnalyticsSeed, Answer, Attempt, Question, QuestionKind, Quiz,
};
use studyquiz_engine::services::grading_service::{
    GradedSubmission, GradingService, SubmittedAnswer,
};
use studyquiz_engine::services::quiz_repository::QuizRepository;

/// Initialize tracing for tests.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// The three-question fixture: multiple-choice (correct = option 1),
/// true-false (correct = true, i.e. option index 0), fill-in-blank with
/// blanks "Paris" / "France".
pub fn fixture_quiz() -> Quiz {
    Quiz::decode(&json!({
        "id": 1,
        "title": "European capitals",
        "difficulty": "medium",
        "questions": [
            {"id": 101, "text": "Which city is the capital of France?",
             "type": "multiple-choice",
             "options": ["Lyon", "Paris", "Marseille", "Nice"],
             "correct_answer": 1},
            {"id": 102, "text": "France is in Europe.",
             "type": "true-false", "correct_answer": 0},
            {"id": 103, "text": "Fill in the blanks: ____ is the capital of ____.",
             "type": "fill-in-blank"}
        ]
    }))
    .expect("fixture quiz decodes")
}

/// Exact-match blank answers for the fixture quiz.
pub fn fixture_blanks() -> HashMap<i64, Vec<String>> {
    let mut blanks = HashMap::new();
    blanks.insert(103, vec!["Paris".to_string(), "France".to_string()]);
    blanks
}

pub struct MockRepository {
    pub quiz: Option<Quiz>,
    pub attempts: Vec<Attempt>,
    pub seed: Option<AnalyticsSeed>,
    pub fail_load: bool,
}

impl MockRepository {
    pub fn with_quiz(quiz: Quiz) -> Self {
        Self {
            quiz: Some(quiz),
            attempts: Vec::new(),
            seed: None,
            fail_load: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            quiz: None,
            attempts: Vec::new(),
            seed: None,
            fail_load: true,
        }
    }
}

#[async_trait]
impl QuizRepository for MockRepository {
    async fn get_quiz(&self, quiz_id: i64) -> Result<Quiz, EngineError> {
        if self.fail_load {
            return Err(EngineError::NetworkFailure("repository down".into()));
        }
        match &self.quiz {
            Some(quiz) if quiz.id == quiz_id => Ok(quiz.clone()),
            _ => Err(EngineError::SubmissionRejected(format!(
                "unknown quiz {}",
                quiz_id
            ))),
        }
    }

    async fn get_attempts(&self, quiz_id: i64) -> Result<Vec<Attempt>, EngineError> {
        Ok(self
            .attempts
            .iter()
            .filter(|a| a.quiz_id == quiz_id)
            .cloned()
            .collect())
    }

    async fn get_analytics_seed(
        &self,
        _quiz_id: i64,
    ) -> Result<Option<AnalyticsSeed>, EngineError> {
        Ok(self.seed.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradingFailure {
    None,
    Rejected,
    Network,
}

/// Grading oracle with the engine's documented semantics: exact option match
/// for choice questions (true = index 0), every blank exact for
/// fill-in-blank, stored exact text for short-answer. Revalidation replies
/// with whatever raw value the test programmed.
pub struct MockGrading {
    quiz: Quiz,
    blank_answers: HashMap<i64, Vec<String>>,
    text_answers: HashMap<i64, String>,
    pub failure: Mutex<GradingFailure>,
    pub revalidate_response: Mutex<Result<Value, GradingFailure>>,
    pub submitted_counts: Mutex<Vec<usize>>,
    next_attempt_id: AtomicI64,
}

impl MockGrading {
    pub fn for_quiz(quiz: Quiz) -> Self {
        Self {
            quiz,
            blank_answers: fixture_blanks(),
            text_answers: HashMap::new(),
            failure: Mutex::new(GradingFailure::None),
            revalidate_response: Mutex::new(Ok(Value::Null)),
            submitted_counts: Mutex::new(Vec::new()),
            next_attempt_id: AtomicI64::new(500),
        }
    }

    pub fn set_failure(&self, failure: GradingFailure) {
        *self.failure.lock().unwrap() = failure;
    }

    pub fn set_revalidate_response(&self, response: Value) {
        *self.revalidate_response.lock().unwrap() = Ok(response);
    }

    fn is_correct(&self, question: &Question, answer: &Answer) -> bool {
        match (&question.kind, answer) {
            (QuestionKind::MultipleChoice { correct: Some(c), .. }, Answer::Choice(i)) => i == c,
            (QuestionKind::TrueFalse { correct: Some(c) }, Answer::Choice(i)) => (*i == 0) == *c,
            (QuestionKind::FillInBlank { blanks, .. }, Answer::Blanks(given)) => {
                match self.blank_answers.get(&question.id) {
                    Some(expected) => {
                        given.len() == *blanks
                            && expected.len() == *blanks
                            && given
                                .iter()
                                .zip(expected)
                                .all(|(g, e)| g.as_deref() == Some(e.as_str()))
                    }
                    None => false,
                }
            }
            (QuestionKind::ShortAnswer, Answer::Text(text)) => self
                .text_answers
                .get(&question.id)
                .is_some_and(|expected| expected == text),
            _ => false,
        }
    }
}

#[async_trait]
impl GradingService for MockGrading {
    async fn submit(
        &self,
        quiz_id: i64,
        answers: &[SubmittedAnswer],
        _idempotency_key: &str,
    ) -> Result<GradedSubmission, EngineError> {
        match *self.failure.lock().unwrap() {
            GradingFailure::Rejected => {
                return Err(EngineError::SubmissionRejected("stale quiz".into()))
            }
            GradingFailure::Network => {
                return Err(EngineError::NetworkFailure("grader down".into()))
            }
            GradingFailure::None => {}
        }

        if quiz_id != self.quiz.id {
            return Err(EngineError::SubmissionRejected(format!(
                "unknown quiz {}",
                quiz_id
            )));
        }

        self.submitted_counts.lock().unwrap().push(answers.len());

        let correct_count = answers
            .iter()
            .filter(|submitted| {
                self.quiz
                    .questions
                    .iter()
                    .find(|q| q.id == submitted.question_id)
                    .is_some_and(|q| self.is_correct(q, &submitted.answer))
            })
            .count() as u32;

        Ok(GradedSubmission {
            attempt_id: self.next_attempt_id.fetch_add(1, Ordering::SeqCst),
            correct_count,
            score: None,
        })
    }

    async fn revalidate(&self, _attempt_id: i64) -> Result<Value, EngineError> {
        match &*self.revalidate_response.lock().unwrap() {
            Ok(value) => Ok(value.clone()),
            Err(GradingFailure::Network) => {
                Err(EngineError::NetworkFailure("grader down".into()))
            }
            Err(_) => Err(EngineError::SubmissionRejected("unknown attempt".into())),
        }
    }
}
