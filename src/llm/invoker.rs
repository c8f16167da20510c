//! Retry-with-backoff wrapper around the completion backend
//!
//! Every attempt first takes a rate-limiter slot, so retries consume the same
//! per-minute budget as fresh calls. Transient failures back off
//! exponentially; terminal failures propagate on the first attempt.

use super::{ChunkSummary, CompletionBackend, CompletionRequest};
use crate::error::Result;
use crate::limiter::RateLimiter;
use crate::metrics::METRICS;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Invokes the backend with rate limiting and exponential-backoff retry
pub struct RetryingInvoker {
    backend: Arc<dyn CompletionBackend>,
    limiter: Arc<RateLimiter>,
    max_retries: u32,
    base_delay: Duration,
}

impl RetryingInvoker {
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        limiter: Arc<RateLimiter>,
        max_retries: u32,
        base_delay: Duration,
    ) -> Self {
        Self {
            backend,
            limiter,
            max_retries,
            base_delay,
        }
    }

    /// One summarization unit of work: at most `max_retries` transient
    /// retries, then the last error surfaces to the caller.
    pub async fn invoke(
        &self,
        request: CompletionRequest,
        source_chunk_index: Option<usize>,
    ) -> Result<ChunkSummary> {
        let mut attempt: u32 = 0;

        loop {
            self.limiter.acquire().await;

            let start = Instant::now();
            match self.backend.complete(request.clone()).await {
                Ok(response) => {
                    let elapsed_ms = start.elapsed().as_millis() as u64;
                    METRICS.llm_requests.with_label_values(&["success"]).inc();
                    METRICS
                        .llm_request_duration
                        .observe(start.elapsed().as_secs_f64());
                    debug!(
                        "completion succeeded in {}ms (attempt {})",
                        elapsed_ms,
                        attempt + 1
                    );

                    return Ok(ChunkSummary {
                        text: response.text,
                        source_chunk_index,
                        model: response.model,
                        elapsed_ms,
                    });
                }
                Err(err) if err.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.backoff_delay(attempt, err.retry_after_secs());
                    warn!(
                        "transient upstream failure ({err}), retry {attempt}/{} in {delay:?}",
                        self.max_retries
                    );
                    METRICS.llm_retries.inc();
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    let status = if err.is_transient() {
                        warn!("giving up after {} attempts: {err}", attempt + 1);
                        "transient_exhausted"
                    } else {
                        "terminal"
                    };
                    METRICS.llm_requests.with_label_values(&[status]).inc();
                    return Err(err);
                }
            }
        }
    }

    /// `2^retry * base`, unless the upstream sent a Retry-After hint.
    fn backoff_delay(&self, retry: u32, hint_secs: Option<u64>) -> Duration {
        match hint_secs {
            Some(secs) => Duration::from_secs(secs),
            None => self.base_delay.saturating_mul(1u32 << retry.min(16)),
        }
    }
}
