use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    // Database Metrics (MongoDB)
    pub static ref DB_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "db_operations_total",
        "Total number of database operations",
        &["operation", "collection", "status"]
    )
    .unwrap();

    pub static ref DB_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "db_operation_duration_seconds",
        "Database operation duration in seconds",
        &["operation", "collection"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .unwrap();

    // Attempt lifecycle
    pub static ref ATTEMPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "assessment_attempts_total",
        "Assessment attempt lifecycle events",
        &["event"]
    )
    .unwrap();

    pub static ref QUESTIONS_GRADED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "questions_graded_total",
        "Total number of graded questions",
        &["question_type", "correct"]
    )
    .unwrap();

    // Progress aggregation
    pub static ref PROGRESS_RECALCULATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "progress_recalculations_total",
        "Total number of enrollment progress recalculations",
        &["status"]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Helper: track database operation with metrics
pub async fn track_db_operation<F, T>(
    operation: &str,
    collection: &str,
    future: F,
) -> Result<T, anyhow::Error>
where
    F: std::future::Future<Output = Result<T, anyhow::Error>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let duration = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "success" } else { "error" };

    DB_OPERATIONS_TOTAL
        .with_label_values(&[operation, collection, status])
        .inc();

    DB_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation, collection])
        .observe(duration);

    result
}

pub fn record_attempt_event(event: &str) {
    ATTEMPTS_TOTAL.with_label_values(&[event]).inc();
}

pub fn record_question_graded(question_type: &str, correct: bool) {
    let correct_label = if correct { "true" } else { "false" };
    QUESTIONS_GRADED_TOTAL
        .with_label_values(&[question_type, correct_label])
        .inc();
}
