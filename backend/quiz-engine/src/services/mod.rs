pub mod analytics_service;
pub mod grading_service;
pub mod quiz_repository;
pub mod session_service;

pub use analytics_service::{AnalyticsService, QuizAnalytics};
pub use grading_service::{
    GradedSubmission, GradingCoordinator, GradingService, HttpGradingService, SubmittedAnswer,
};
pub use quiz_repository::{HttpQuizRepository, QuizRepository};
pub use session_service::{QuizSession, SessionState};
