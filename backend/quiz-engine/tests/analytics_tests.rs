mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{fixture_quiz, MockRepository};
use studyquiz_engine::models::{AnalyticsSeed, Attempt};
use studyquiz_engine::services::analytics_service::AnalyticsService;
use studyquiz_engine::services::quiz_repository::QuizRepository;

fn attempt(id: i64, score: i32, minutes_ago: i64) -> Attempt {
    Attempt {
        id,
        quiz_id: 1,
        score,
        answers: Vec::new(),
        submitted_at: Utc::now() - Duration::minutes(minutes_ago),
        validation: None,
    }
}

#[tokio::test]
async fn aggregates_repository_history() {
    common::init_tracing();
    let mut repository = MockRepository::with_quiz(fixture_quiz());
    // Stored most recent first, as the repository serves them.
    repository.attempts = vec![
        attempt(3, 90, 10),
        attempt(2, 70, 20),
        attempt(1, 60, 30),
    ];
    let repository = Arc::new(repository);

    let attempts = repository.get_attempts(1).await.unwrap();
    let analytics = AnalyticsService::aggregate_attempts(&attempts).unwrap();

    assert_eq!(analytics.total_attempts, 3);
    assert_eq!(analytics.best_score, 90);
    assert_eq!(analytics.avg_score, 73);
    assert!(analytics.improvement_trend > 0.0);
    assert!(analytics
        .insights
        .iter()
        .any(|i| i.contains("improving")));
}

#[tokio::test]
async fn input_ordering_does_not_matter() {
    let shuffled = vec![attempt(2, 70, 20), attempt(3, 90, 10), attempt(1, 60, 30)];
    let ordered = vec![attempt(1, 60, 30), attempt(2, 70, 20), attempt(3, 90, 10)];

    let a = AnalyticsService::aggregate_attempts(&shuffled).unwrap();
    let b = AnalyticsService::aggregate_attempts(&ordered).unwrap();
    assert_eq!(a.improvement_trend, b.improvement_trend);
    assert_eq!(a.consistency_score, b.consistency_score);
}

#[tokio::test]
async fn tolerates_a_pre_aggregated_seed() {
    common::init_tracing();
    let mut repository = MockRepository::with_quiz(fixture_quiz());
    repository.seed = Some(AnalyticsSeed {
        total_attempts: 12,
        avg_score: 81.4,
        best_score: 98,
        recent_scores: vec![95, 88, 72], // most recent first
    });
    let repository = Arc::new(repository);

    let seed = repository.get_analytics_seed(1).await.unwrap().unwrap();
    let analytics = AnalyticsService::aggregate_seed(&seed).unwrap();

    assert_eq!(analytics.total_attempts, 12);
    assert_eq!(analytics.best_score, 98);
    assert_eq!(analytics.avg_score, 81);
    assert!(analytics.improvement_trend > 0.0);
}

#[tokio::test]
async fn missing_seed_falls_back_to_raw_attempts() {
    let repository = Arc::new(MockRepository::with_quiz(fixture_quiz()));
    assert!(repository.get_analytics_seed(1).await.unwrap().is_none());
}

#[test]
fn equal_mean_lower_variance_scores_at_least_as_consistent() {
    let tight = [69, 70, 71, 70];
    let wide = [40, 100, 55, 85];

    let tight_score = AnalyticsService::consistency_score(&tight);
    let wide_score = AnalyticsService::consistency_score(&wide);
    assert!(tight_score >= wide_score);
    assert!(tight_score > 90);
}
