//! Service configuration
//!
//! Loaded from an optional `config` file plus `SUMMARY__`-prefixed environment
//! variables. Every field carries a serde default so a bare environment still
//! produces a usable configuration.

use crate::error::{Result, SummarizeError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl Config {
    /// Load configuration from file (optional) and environment
    pub fn load() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("SUMMARY").separator("__"))
            .build()
            .map_err(|e| SummarizeError::Configuration(e.to_string()))?;

        settings
            .try_deserialize()
            .map_err(|e| SummarizeError::Configuration(e.to_string()))
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum request body size in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_body_bytes() -> usize {
    4 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Upstream LLM API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible chat completions endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Bearer token, if the endpoint requires one
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model used for chunk summaries
    #[serde(default = "default_model")]
    pub model: String,

    /// Model used for the meta-summary pass; falls back to `model`
    #[serde(default)]
    pub meta_model: Option<String>,

    /// Completion token cap per call
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Outbound call budget per rolling minute
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: usize,

    /// Retry budget for transient upstream failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff delay in milliseconds
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

fn default_endpoint() -> String {
    "http://localhost:8081/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_max_tokens() -> usize {
    1024
}

fn default_temperature() -> f32 {
    0.3
}

fn default_request_timeout_ms() -> u64 {
    60_000
}

fn default_requests_per_minute() -> usize {
    50
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

impl LlmConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    /// Model for the meta-summary pass
    pub fn meta_model(&self) -> &str {
        self.meta_model.as_deref().unwrap_or(&self.model)
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            model: default_model(),
            meta_model: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            request_timeout_ms: default_request_timeout_ms(),
            requests_per_minute: default_requests_per_minute(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

/// Chunking and aggregation thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,

    /// Chunks shorter than this merge into their predecessor
    #[serde(default = "default_min_chunk_size")]
    pub min_chunk_size: usize,

    /// Inputs at or below this size take the single-shot path
    #[serde(default = "default_small_content_threshold")]
    pub small_content_threshold: usize,

    /// At or below this many chunk summaries, skip the meta-summary call
    #[serde(default = "default_small_chunk_count_threshold")]
    pub small_chunk_count_threshold: usize,

    /// Hard cap on chunks processed per request; the excess is dropped
    #[serde(default = "default_max_chunks_per_request")]
    pub max_chunks_per_request: usize,
}

fn default_max_chunk_size() -> usize {
    28_000
}

fn default_min_chunk_size() -> usize {
    500
}

fn default_small_content_threshold() -> usize {
    10_000
}

fn default_small_chunk_count_threshold() -> usize {
    4
}

fn default_max_chunks_per_request() -> usize {
    24
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: default_max_chunk_size(),
            min_chunk_size: default_min_chunk_size(),
            small_content_threshold: default_small_content_threshold(),
            small_chunk_count_threshold: default_small_chunk_count_threshold(),
            max_chunks_per_request: default_max_chunks_per_request(),
        }
    }
}

/// Worker pool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Upper bound on concurrently executing tasks
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Lower bound for dynamic pool resizing
    #[serde(default = "default_min_workers")]
    pub min_workers: usize,

    /// Per-task timeout in milliseconds; frees the worker slot on expiry
    #[serde(default = "default_task_timeout_ms")]
    pub task_timeout_ms: u64,

    /// Task-level retry budget (re-enqueues with boosted priority)
    #[serde(default = "default_max_task_retries")]
    pub max_task_retries: u32,

    /// Priority boost applied to re-enqueued tasks
    #[serde(default = "default_retry_priority_boost")]
    pub retry_priority_boost: i64,

    /// Base delay for task retry backoff in milliseconds
    #[serde(default = "default_task_retry_base_delay_ms")]
    pub task_retry_base_delay_ms: u64,

    /// Interval between pool resize evaluations in seconds
    #[serde(default = "default_resize_interval_secs")]
    pub resize_interval_secs: u64,

    /// Fractional worker-count change below which resizing is skipped
    #[serde(default = "default_resize_threshold")]
    pub resize_threshold: f64,
}

fn default_max_concurrent_requests() -> usize {
    5
}

fn default_min_workers() -> usize {
    1
}

fn default_task_timeout_ms() -> u64 {
    120_000
}

fn default_max_task_retries() -> u32 {
    2
}

fn default_retry_priority_boost() -> i64 {
    1000
}

fn default_task_retry_base_delay_ms() -> u64 {
    1000
}

fn default_resize_interval_secs() -> u64 {
    180
}

fn default_resize_threshold() -> f64 {
    0.25
}

impl SchedulerConfig {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.task_timeout_ms)
    }

    pub fn task_retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.task_retry_base_delay_ms)
    }

    pub fn resize_interval(&self) -> Duration {
        Duration::from_secs(self.resize_interval_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_max_concurrent_requests(),
            min_workers: default_min_workers(),
            task_timeout_ms: default_task_timeout_ms(),
            max_task_retries: default_max_task_retries(),
            retry_priority_boost: default_retry_priority_boost(),
            task_retry_base_delay_ms: default_task_retry_base_delay_ms(),
            resize_interval_secs: default_resize_interval_secs(),
            resize_threshold: default_resize_threshold(),
        }
    }
}
