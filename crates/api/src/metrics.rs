//! In-memory API and retraining metrics.
//!
//! [`MetricsTracker`] backs both `GET /metrics` (JSON summary) and
//! `GET /metrics/prometheus` (text exposition format 0.0.4). It also
//! implements [`RetrainTelemetry`] so the retraining service can report
//! sample and retrain counts without knowing about HTTP.

use std::collections::{BTreeMap, VecDeque};
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use housing_core::prediction::round_to;
use housing_retraining::executor::RetrainOutcome;
use housing_retraining::telemetry::RetrainTelemetry;
use serde::Serialize;

/// Response times kept for the rolling average.
pub const RESPONSE_TIME_WINDOW: usize = 1000;

const PREDICTION_BATCH_BUCKETS: &[f64] = &[1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 500.0, 1000.0];
const TRAINING_BATCH_BUCKETS: &[f64] = &[1.0, 5.0, 10.0, 25.0, 50.0, 100.0];

// ---------------------------------------------------------------------------
// JSON views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ApiStatistics {
    pub total_requests: u64,
    pub total_predictions: u64,
    pub total_errors: u64,
    pub success_rate_percent: f64,
    pub uptime_hours: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceMetrics {
    pub average_response_time_seconds: f64,
    pub total_requests_timed: usize,
}

/// Counters that stay available even when the full report cannot be built.
#[derive(Debug, Clone, Serialize)]
pub struct BasicStats {
    pub total_requests: u64,
    pub total_predictions: u64,
    pub total_errors: u64,
    pub uptime_hours: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelStats {
    pub model_name: String,
    pub prediction_count: u64,
}

// ---------------------------------------------------------------------------
// Histogram
// ---------------------------------------------------------------------------

struct Histogram {
    bounds: &'static [f64],
    /// Per-bucket (non-cumulative) counts; the last slot is `+Inf`.
    counts: Vec<u64>,
    sum: f64,
    count: u64,
}

impl Histogram {
    fn new(bounds: &'static [f64]) -> Self {
        Self {
            bounds,
            counts: vec![0; bounds.len() + 1],
            sum: 0.0,
            count: 0,
        }
    }

    fn observe(&mut self, value: f64) {
        let slot = self
            .bounds
            .iter()
            .position(|b| value <= *b)
            .unwrap_or(self.bounds.len());
        self.counts[slot] += 1;
        self.sum += value;
        self.count += 1;
    }

    fn render(&self, out: &mut String, name: &str, help: &str) {
        let _ = writeln!(out, "# HELP {name} {help}");
        let _ = writeln!(out, "# TYPE {name} histogram");
        let mut cumulative = 0;
        for (bound, count) in self.bounds.iter().zip(&self.counts) {
            cumulative += count;
            let _ = writeln!(out, "{name}_bucket{{le=\"{bound}\"}} {cumulative}");
        }
        let _ = writeln!(out, "{name}_bucket{{le=\"+Inf\"}} {}", self.count);
        let _ = writeln!(out, "{name}_sum {}", self.sum);
        let _ = writeln!(out, "{name}_count {}", self.count);
    }
}

// ---------------------------------------------------------------------------
// MetricsTracker
// ---------------------------------------------------------------------------

/// Process-wide counters. Shared as `Arc<MetricsTracker>`.
pub struct MetricsTracker {
    started: Instant,

    total_requests: AtomicU64,
    total_predictions: AtomicU64,
    total_errors: AtomicU64,
    model_predictions: AtomicU64,
    error_types: Mutex<BTreeMap<String, u64>>,
    response_times: Mutex<VecDeque<f64>>,
    /// Keyed by `(endpoint, status)`.
    prediction_requests: Mutex<BTreeMap<(String, String), u64>>,
    prediction_batch_sizes: Mutex<Histogram>,

    new_data_points: AtomicU64,
    retrain_triggers: AtomicU64,
    retrain_outcomes: Mutex<BTreeMap<&'static str, u64>>,
    training_batch_requests: Mutex<BTreeMap<String, u64>>,
    training_batch_sizes: Mutex<Histogram>,
    training_samples_failed: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Default for MetricsTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            total_requests: AtomicU64::new(0),
            total_predictions: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            model_predictions: AtomicU64::new(0),
            error_types: Mutex::new(BTreeMap::new()),
            response_times: Mutex::new(VecDeque::with_capacity(RESPONSE_TIME_WINDOW)),
            prediction_requests: Mutex::new(BTreeMap::new()),
            prediction_batch_sizes: Mutex::new(Histogram::new(PREDICTION_BATCH_BUCKETS)),
            new_data_points: AtomicU64::new(0),
            retrain_triggers: AtomicU64::new(0),
            retrain_outcomes: Mutex::new(BTreeMap::new()),
            training_batch_requests: Mutex::new(BTreeMap::new()),
            training_batch_sizes: Mutex::new(Histogram::new(TRAINING_BATCH_BUCKETS)),
            training_samples_failed: AtomicU64::new(0),
        }
    }

    // -- Recording ----------------------------------------------------------

    pub fn track_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn track_response_time(&self, seconds: f64) {
        let mut times = lock(&self.response_times);
        if times.len() == RESPONSE_TIME_WINDOW {
            times.pop_front();
        }
        times.push_back(seconds);
    }

    /// Count an error under `kind`, e.g. `HTTP_404`.
    pub fn track_error(&self, kind: &str) {
        self.total_errors.fetch_add(1, Ordering::Relaxed);
        *lock(&self.error_types).entry(kind.to_string()).or_default() += 1;
    }

    /// `count` successful predictions served by the model.
    pub fn track_predictions(&self, count: usize) {
        self.total_predictions
            .fetch_add(count as u64, Ordering::Relaxed);
        self.model_predictions
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn track_prediction_request(&self, endpoint: &str, status: &str) {
        *lock(&self.prediction_requests)
            .entry((endpoint.to_string(), status.to_string()))
            .or_default() += 1;
    }

    pub fn track_prediction_batch_size(&self, size: usize) {
        lock(&self.prediction_batch_sizes).observe(size as f64);
    }

    // -- Views --------------------------------------------------------------

    fn uptime_hours(&self) -> f64 {
        round_to(self.started.elapsed().as_secs_f64() / 3600.0, 2)
    }

    pub fn api_statistics(&self) -> ApiStatistics {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let total_errors = self.total_errors.load(Ordering::Relaxed);
        let success_rate = if total_requests > 0 {
            total_requests.saturating_sub(total_errors) as f64 / total_requests as f64 * 100.0
        } else {
            0.0
        };
        ApiStatistics {
            total_requests,
            total_predictions: self.total_predictions.load(Ordering::Relaxed),
            total_errors,
            success_rate_percent: round_to(success_rate, 2),
            uptime_hours: self.uptime_hours(),
        }
    }

    pub fn performance_metrics(&self) -> PerformanceMetrics {
        let times = lock(&self.response_times);
        let average = if times.is_empty() {
            0.0
        } else {
            round_to(times.iter().sum::<f64>() / times.len() as f64, 4)
        };
        PerformanceMetrics {
            average_response_time_seconds: average,
            total_requests_timed: times.len(),
        }
    }

    pub fn error_breakdown(&self) -> BTreeMap<String, u64> {
        lock(&self.error_types).clone()
    }

    pub fn basic_stats(&self) -> BasicStats {
        BasicStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            total_predictions: self.total_predictions.load(Ordering::Relaxed),
            total_errors: self.total_errors.load(Ordering::Relaxed),
            uptime_hours: self.uptime_hours(),
        }
    }

    pub fn model_stats(&self, model_name: &str) -> ModelStats {
        ModelStats {
            model_name: model_name.to_string(),
            prediction_count: self.model_predictions.load(Ordering::Relaxed),
        }
    }

    /// Render every metric in the Prometheus text exposition format.
    pub fn render_prometheus(&self, model_loaded: bool) -> String {
        let mut out = String::new();

        counter(
            &mut out,
            "housing_api_requests_total",
            "Total HTTP requests received",
            self.total_requests.load(Ordering::Relaxed),
        );
        counter(
            &mut out,
            "housing_api_errors_total",
            "Total HTTP responses with status >= 400",
            self.total_errors.load(Ordering::Relaxed),
        );

        let _ = writeln!(out, "# HELP housing_api_errors_by_type_total API errors by type");
        let _ = writeln!(out, "# TYPE housing_api_errors_by_type_total counter");
        for (kind, count) in lock(&self.error_types).iter() {
            let _ = writeln!(
                out,
                "housing_api_errors_by_type_total{{type=\"{}\"}} {count}",
                escape_label_value(kind)
            );
        }

        let _ = writeln!(
            out,
            "# HELP housing_prediction_requests_total Prediction requests by endpoint and status"
        );
        let _ = writeln!(out, "# TYPE housing_prediction_requests_total counter");
        for ((endpoint, status), count) in lock(&self.prediction_requests).iter() {
            let _ = writeln!(
                out,
                "housing_prediction_requests_total{{endpoint=\"{}\",status=\"{}\"}} {count}",
                escape_label_value(endpoint),
                escape_label_value(status)
            );
        }

        counter(
            &mut out,
            "housing_model_predictions_total",
            "Total predictions made by the model",
            self.model_predictions.load(Ordering::Relaxed),
        );

        let _ = writeln!(
            out,
            "# HELP housing_model_loaded Whether the model is loaded (1 = loaded, 0 = not loaded)"
        );
        let _ = writeln!(out, "# TYPE housing_model_loaded gauge");
        let _ = writeln!(out, "housing_model_loaded {}", u8::from(model_loaded));

        lock(&self.prediction_batch_sizes).render(
            &mut out,
            "housing_batch_size",
            "Size of batch prediction requests",
        );

        counter(
            &mut out,
            "housing_retraining_triggered_total",
            "Number of times model retraining was triggered",
            self.retrain_triggers.load(Ordering::Relaxed),
        );

        let _ = writeln!(
            out,
            "# HELP housing_retraining_outcomes_total Retraining runs by outcome"
        );
        let _ = writeln!(out, "# TYPE housing_retraining_outcomes_total counter");
        for (outcome, count) in lock(&self.retrain_outcomes).iter() {
            let _ = writeln!(
                out,
                "housing_retraining_outcomes_total{{outcome=\"{outcome}\"}} {count}"
            );
        }

        counter(
            &mut out,
            "housing_new_data_points_total",
            "Total number of new training data points received",
            self.new_data_points.load(Ordering::Relaxed),
        );

        let _ = writeln!(
            out,
            "# HELP housing_training_batch_requests_total Batch training requests by status"
        );
        let _ = writeln!(out, "# TYPE housing_training_batch_requests_total counter");
        for (status, count) in lock(&self.training_batch_requests).iter() {
            let _ = writeln!(
                out,
                "housing_training_batch_requests_total{{status=\"{}\"}} {count}",
                escape_label_value(status)
            );
        }

        lock(&self.training_batch_sizes).render(
            &mut out,
            "housing_training_batch_size",
            "Size of training batch requests",
        );

        counter(
            &mut out,
            "housing_training_samples_failed_total",
            "Total number of training samples that failed validation",
            self.training_samples_failed.load(Ordering::Relaxed),
        );

        out
    }
}

impl RetrainTelemetry for MetricsTracker {
    fn new_samples(&self, count: usize) {
        self.new_data_points
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    fn training_batch(&self, size: usize, failed: usize, status: &str) {
        *lock(&self.training_batch_requests)
            .entry(status.to_string())
            .or_default() += 1;
        lock(&self.training_batch_sizes).observe(size as f64);
        self.training_samples_failed
            .fetch_add(failed as u64, Ordering::Relaxed);
    }

    fn retrain_triggered(&self, _reason: &str, _force: bool) {
        self.retrain_triggers.fetch_add(1, Ordering::Relaxed);
    }

    fn retrain_finished(&self, outcome: &RetrainOutcome) {
        let label = match outcome {
            RetrainOutcome::Completed(_) => "completed",
            RetrainOutcome::Rejected(_) => "rejected",
            RetrainOutcome::Failed(_) => "failed",
        };
        *lock(&self.retrain_outcomes).entry(label).or_default() += 1;
    }
}

fn counter(out: &mut String, name: &str, help: &str, value: u64) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} counter");
    let _ = writeln!(out, "{name} {value}");
}

fn escape_label_value(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use housing_retraining::executor::RetrainRejection;

    use super::*;

    #[test]
    fn success_rate_counts_errors() {
        let metrics = MetricsTracker::new();
        for _ in 0..4 {
            metrics.track_request();
        }
        metrics.track_error("HTTP_404");

        let stats = metrics.api_statistics();
        assert_eq!(stats.total_requests, 4);
        assert_eq!(stats.total_errors, 1);
        assert_eq!(stats.success_rate_percent, 75.0);
        assert_eq!(metrics.error_breakdown()["HTTP_404"], 1);
    }

    #[test]
    fn response_time_window_is_bounded() {
        let metrics = MetricsTracker::new();
        for i in 0..(RESPONSE_TIME_WINDOW + 10) {
            metrics.track_response_time(i as f64);
        }
        assert_eq!(
            metrics.performance_metrics().total_requests_timed,
            RESPONSE_TIME_WINDOW
        );
    }

    #[test]
    fn empty_tracker_reports_zeroes() {
        let metrics = MetricsTracker::new();
        assert_eq!(metrics.api_statistics().success_rate_percent, 0.0);
        assert_eq!(metrics.performance_metrics().average_response_time_seconds, 0.0);
    }

    #[test]
    fn histogram_buckets_are_cumulative() {
        let mut h = Histogram::new(&[1.0, 5.0]);
        h.observe(1.0);
        h.observe(3.0);
        h.observe(9.0);
        let mut out = String::new();
        h.render(&mut out, "h", "help");
        assert!(out.contains("h_bucket{le=\"1\"} 1\n"));
        assert!(out.contains("h_bucket{le=\"5\"} 2\n"));
        assert!(out.contains("h_bucket{le=\"+Inf\"} 3\n"));
        assert!(out.contains("h_sum 13\n"));
    }

    #[test]
    fn prometheus_text_includes_retraining_counters() {
        let metrics = MetricsTracker::new();
        metrics.new_samples(3);
        metrics.training_batch(5, 1, "partial_success");
        metrics.retrain_triggered("manual", false);
        metrics.retrain_finished(&RetrainOutcome::Rejected(RetrainRejection::NoNewData));
        metrics.track_predictions(2);
        metrics.track_prediction_request("/api/v1/predict", "success");

        let text = metrics.render_prometheus(true);
        assert!(text.contains("housing_new_data_points_total 3\n"));
        assert!(text.contains(
            "housing_training_batch_requests_total{status=\"partial_success\"} 1\n"
        ));
        assert!(text.contains("housing_training_samples_failed_total 1\n"));
        assert!(text.contains("housing_retraining_triggered_total 1\n"));
        assert!(text.contains("housing_retraining_outcomes_total{outcome=\"rejected\"} 1\n"));
        assert!(text.contains("housing_model_predictions_total 2\n"));
        assert!(text.contains("housing_model_loaded 1\n"));
        assert!(text.contains(
            "housing_prediction_requests_total{endpoint=\"/api/v1/predict\",status=\"success\"} 1\n"
        ));
    }

    #[test]
    fn label_values_are_escaped() {
        assert_eq!(escape_label_value("a\"b\\c\nd"), "a\\\"b\\\\c\\nd");
    }
}
