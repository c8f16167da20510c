//! Metrics collection for observability

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec_with_registry, register_counter_with_registry,
    register_histogram_vec_with_registry, register_histogram_with_registry,
    register_int_gauge_with_registry, Counter, CounterVec, Histogram, HistogramVec, IntGauge,
    Opts, Registry,
};
use std::sync::Arc;

/// Global metrics registry
pub static METRICS: Lazy<Arc<Metrics>> =
    Lazy::new(|| Arc::new(Metrics::new().expect("Failed to initialize metrics")));

/// Metrics collector
pub struct Metrics {
    registry: Registry,

    // Summarization pipeline metrics
    pub summarize_requests: CounterVec,
    pub summarize_duration: HistogramVec,
    pub chunks_processed: Counter,
    pub chunks_failed: Counter,
    pub chunks_dropped: Counter,
    pub meta_summaries: Counter,

    // Upstream LLM call metrics
    pub llm_requests: CounterVec,
    pub llm_request_duration: Histogram,
    pub llm_retries: Counter,

    // Rate limiter metrics
    pub rate_limiter_waits: Counter,

    // Worker pool metrics
    pub tasks_retried: Counter,
    pub tasks_timed_out: Counter,
    pub pool_size: IntGauge,
    pub pool_active: IntGauge,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let registry = Registry::new();

        let summarize_requests = register_counter_vec_with_registry!(
            Opts::new("summarize_requests_total", "Total summarization requests"),
            &["status"],
            registry
        )?;

        let summarize_duration = register_histogram_vec_with_registry!(
            "summarize_duration_seconds",
            "End-to-end summarization duration in seconds",
            &["path"],
            registry
        )?;

        let chunks_processed = register_counter_with_registry!(
            Opts::new("chunks_processed_total", "Total chunks submitted for summarization"),
            registry
        )?;

        let chunks_failed = register_counter_with_registry!(
            Opts::new("chunks_failed_total", "Total chunks that failed permanently"),
            registry
        )?;

        let chunks_dropped = register_counter_with_registry!(
            Opts::new("chunks_dropped_total", "Total chunks dropped by the per-request cap"),
            registry
        )?;

        let meta_summaries = register_counter_with_registry!(
            Opts::new("meta_summaries_total", "Total second-pass meta-summary calls"),
            registry
        )?;

        let llm_requests = register_counter_vec_with_registry!(
            Opts::new("llm_requests_total", "Total upstream LLM call outcomes"),
            &["status"],
            registry
        )?;

        let llm_request_duration = register_histogram_with_registry!(
            "llm_request_duration_seconds",
            "Upstream LLM call duration in seconds",
            registry
        )?;

        let llm_retries = register_counter_with_registry!(
            Opts::new("llm_retries_total", "Total transient-failure retries"),
            registry
        )?;

        let rate_limiter_waits = register_counter_with_registry!(
            Opts::new("rate_limiter_waits_total", "Total calls that waited for a rate slot"),
            registry
        )?;

        let tasks_retried = register_counter_with_registry!(
            Opts::new("tasks_retried_total", "Total tasks re-enqueued after failure"),
            registry
        )?;

        let tasks_timed_out = register_counter_with_registry!(
            Opts::new("tasks_timed_out_total", "Total tasks that exceeded the task timeout"),
            registry
        )?;

        let pool_size = register_int_gauge_with_registry!(
            Opts::new("pool_size", "Current worker pool size"),
            registry
        )?;

        let pool_active = register_int_gauge_with_registry!(
            Opts::new("pool_active", "Currently executing tasks"),
            registry
        )?;

        Ok(Self {
            registry,
            summarize_requests,
            summarize_duration,
            chunks_processed,
            chunks_failed,
            chunks_dropped,
            meta_summaries,
            llm_requests,
            llm_request_duration,
            llm_retries,
            rate_limiter_waits,
            tasks_retried,
            tasks_timed_out,
            pool_size,
            pool_active,
        })
    }

    /// Get the metrics registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record a finished summarization request
    pub fn record_summarize(&self, success: bool, path: &str, seconds: f64) {
        let status = if success { "success" } else { "error" };
        self.summarize_requests.with_label_values(&[status]).inc();
        self.summarize_duration
            .with_label_values(&[path])
            .observe(seconds);
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap_or_default();

        String::from_utf8(buffer).unwrap_or_default()
    }
}
