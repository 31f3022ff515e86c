use crate::models::{AnalyticsSeed, Attempt};

/// Aggregated view of one quiz's attempt history.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizAnalytics {
    pub total_attempts: usize,
    pub best_score: i32,
    /// Rounded to the nearest integer percentage.
    pub avg_score: i32,
    /// Mean of the most recent third of attempts minus the mean of the
    /// earliest third. Positive means improvement.
    pub improvement_trend: f64,
    /// 0-100; 100 means identical scores on every attempt. Strictly
    /// non-increasing in score variance.
    pub consistency_score: i32,
    /// Deterministic advisory strings derived from the aggregates above.
    pub insights: Vec<String>,
}

/// Stateless, side-effect-free aggregation over attempt history. Safe to
/// invoke repeatedly with no coordination.
pub struct AnalyticsService;

impl AnalyticsService {
    /// Aggregate raw attempts. Ordering of the input is not trusted: the
    /// attempts are sorted by `submitted_at` here before "recent" windows
    /// are derived. Returns `None` when there is no history.
    pub fn aggregate_attempts(attempts: &[Attempt]) -> Option<QuizAnalytics> {
        if attempts.is_empty() {
            return None;
        }

        let mut ordered: Vec<(&Attempt, i32)> =
            attempts.iter().map(|a| (a, a.score)).collect();
        // Oldest first; ties keep their input order.
        ordered.sort_by_key(|(a, _)| a.submitted_at);
        let scores: Vec<i32> = ordered.into_iter().map(|(_, s)| s).collect();

        Some(Self::from_scores(&scores, scores.len()))
    }

    /// Aggregate a repository-provided seed. The seed's own best/avg cover
    /// the full history; trend and consistency come from the recent-scores
    /// window it carries (most recent first, per repository convention).
    pub fn aggregate_seed(seed: &AnalyticsSeed) -> Option<QuizAnalytics> {
        if seed.total_attempts == 0 {
            return None;
        }

        let oldest_first: Vec<i32> = seed.recent_scores.iter().rev().copied().collect();
        let improvement_trend = Self::improvement_trend(&oldest_first);
        let consistency_score = Self::consistency_score(&oldest_first);
        let best_score = seed.best_score;
        let avg_score = seed.avg_score.round().clamp(0.0, 100.0) as i32;
        let total_attempts = seed.total_attempts as usize;

        Some(QuizAnalytics {
            total_attempts,
            best_score,
            avg_score,
            improvement_trend,
            consistency_score,
            insights: Self::insights(
                total_attempts,
                best_score,
                avg_score,
                improvement_trend,
                consistency_score,
            ),
        })
    }

    fn from_scores(oldest_first: &[i32], total_attempts: usize) -> QuizAnalytics {
        let best_score = oldest_first.iter().copied().max().unwrap_or(0);
        let avg_score = (mean(oldest_first).round()).clamp(0.0, 100.0) as i32;
        let improvement_trend = Self::improvement_trend(oldest_first);
        let consistency_score = Self::consistency_score(oldest_first);

        QuizAnalytics {
            total_attempts,
            best_score,
            avg_score,
            improvement_trend,
            consistency_score,
            insights: Self::insights(
                total_attempts,
                best_score,
                avg_score,
                improvement_trend,
                consistency_score,
            ),
        }
    }

    /// Difference between the mean of the most recent window and the mean of
    /// the earliest window; window = max(n/3, 1). Zero with fewer than two
    /// attempts.
    pub fn improvement_trend(oldest_first: &[i32]) -> f64 {
        let n = oldest_first.len();
        if n < 2 {
            return 0.0;
        }
        let window = (n / 3).max(1);
        let earliest = mean(&oldest_first[..window]);
        let recent = mean(&oldest_first[n - window..]);
        recent - earliest
    }

    /// `clamp(100 - 2 * stddev, 0, 100)` rounded. Zero variance maps to 100;
    /// a higher spread always maps to an equal-or-lower value.
    pub fn consistency_score(scores: &[i32]) -> i32 {
        if scores.len() < 2 {
            return 100;
        }
        let sd = std_deviation(scores);
        (100.0 - 2.0 * sd).clamp(0.0, 100.0).round() as i32
    }

    fn insights(
        total_attempts: usize,
        best_score: i32,
        avg_score: i32,
        trend: f64,
        consistency: i32,
    ) -> Vec<String> {
        let mut insights = Vec::new();

        if total_attempts == 1 {
            insights.push("Take this quiz again to start tracking your progress.".to_string());
        }
        if best_score >= 90 {
            insights.push("Excellent best score; you have a strong grasp of this material.".to_string());
        }
        if trend > 5.0 {
            insights.push("Scores are improving across recent attempts.".to_string());
        }
        if trend < -5.0 {
            insights.push(
                "Declining scores; revisit the source material before retrying.".to_string(),
            );
        }
        if total_attempts >= 3 && consistency >= 80 {
            insights.push("Performance is consistent across attempts.".to_string());
        }
        if total_attempts >= 3 && consistency < 50 {
            insights.push(
                "Scores vary widely between attempts; review the questions you miss.".to_string(),
            );
        }
        if avg_score < 60 {
            insights.push(
                "Average score is below 60; review the document and retake the quiz.".to_string(),
            );
        }

        insights
    }
}

fn mean(scores: &[i32]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    scores.iter().map(|s| *s as f64).sum::<f64>() / scores.len() as f64
}

fn std_deviation(scores: &[i32]) -> f64 {
    let m = mean(scores);
    let variance = scores
        .iter()
        .map(|s| {
            let d = *s as f64 - m;
            d * d
        })
        .sum::<f64>()
        / scores.len() as f64;
    variance.sqrt()
}
