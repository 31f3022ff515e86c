use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder, HistogramVec,
    IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // Business Metrics
    pub static ref QUIZ_SESSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "quiz_sessions_total",
        "Total number of quiz-taking sessions",
        &["status"]
    )
    .unwrap();

    pub static ref QUIZ_SESSIONS_ACTIVE: IntGauge = register_int_gauge!(
        "quiz_sessions_active",
        "Number of currently active quiz sessions"
    )
    .unwrap();

    pub static ref ATTEMPTS_SUBMITTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "attempts_submitted_total",
        "Total number of quiz attempts submitted for grading",
        &["result"]
    )
    .unwrap();

    pub static ref REVALIDATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "revalidations_total",
        "Total number of attempt revalidations",
        &["method"]
    )
    .unwrap();

    pub static ref GRADING_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "grading_request_duration_seconds",
        "Grading service call duration in seconds",
        &["operation"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .unwrap();
}

/// Render the current metrics in Prometheus text format. The engine has no
/// HTTP surface of its own; the embedding application exposes this however
/// it likes.
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

pub fn record_session_started() {
    QUIZ_SESSIONS_TOTAL.with_label_values(&["started"]).inc();
    QUIZ_SESSIONS_ACTIVE.inc();
}

pub fn record_session_completed() {
    QUIZ_SESSIONS_TOTAL.with_label_values(&["completed"]).inc();
    QUIZ_SESSIONS_ACTIVE.dec();
}

pub fn record_session_abandoned() {
    QUIZ_SESSIONS_TOTAL.with_label_values(&["abandoned"]).inc();
    QUIZ_SESSIONS_ACTIVE.dec();
}
