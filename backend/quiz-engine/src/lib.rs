#![allow(dead_code)]

//! Quiz-session engine for the study-aid backend: question model, answer
//! collection, the quiz-taking state machine, grading coordination and
//! attempt analytics. Quiz storage and the AI grader itself live behind the
//! `QuizRepository` and `GradingService` traits; this crate exposes no
//! network surface of its own.

pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::EngineError;
pub use models::{Answer, AnswerSheet, Attempt, Question, QuestionKind, Quiz};
pub use services::{
    AnalyticsService, GradingCoordinator, GradingService, QuizRepository, QuizSession,
    SessionState,
};
