//! Summarization pipeline: chunking, dispatch, aggregation
//!
//! Decides between the single-shot and chunked paths, submits chunk jobs to
//! the worker pool, and folds partial summaries into one output. Completion
//! order is unordered; reassembly always follows chunk index.

use crate::chunker;
use crate::config::Config;
use crate::error::{Result, SummarizeError};
use crate::events::{EventSink, ProgressEvent};
use crate::limiter::RateLimiter;
use crate::llm::{ChunkSummary, CompletionBackend, CompletionRequest, RetryingInvoker};
use crate::metrics::METRICS;
use crate::prompts::{self, SummaryMode};
use crate::scheduler::{PoolConfig, PoolStatus, TaskFn, TaskOutcome, WorkerPool};
use futures::FutureExt;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Final summarization output
#[derive(Debug, Clone, Serialize)]
pub struct SummaryResult {
    pub text: String,
    pub model: String,
    pub elapsed_ms: u64,
    pub chunk_count: usize,
    pub dropped_chunks: usize,
}

/// Summarization engine
///
/// Owns the rate limiter, retrying invoker, and worker pool; constructed once
/// at startup and shared behind an `Arc`.
pub struct SummarizeEngine {
    config: Config,
    invoker: Arc<RetryingInvoker>,
    pool: WorkerPool<ChunkSummary>,
}

impl SummarizeEngine {
    pub fn new(config: Config, backend: Arc<dyn CompletionBackend>) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.llm.requests_per_minute));
        let invoker = Arc::new(RetryingInvoker::new(
            backend,
            limiter,
            config.llm.max_retries,
            config.llm.retry_base_delay(),
        ));
        let pool = WorkerPool::new(PoolConfig::from(&config.scheduler));

        Self {
            config,
            invoker,
            pool,
        }
    }

    /// Start background maintenance (pool resizing)
    pub fn start(&self) -> tokio::task::JoinHandle<()> {
        self.pool.spawn_resize_loop()
    }

    pub fn pool_status(&self) -> PoolStatus {
        self.pool.status()
    }

    /// Summarize `text`, emitting progress events along the way.
    pub async fn summarize(
        &self,
        text: &str,
        mode: SummaryMode,
        events: &EventSink,
    ) -> Result<SummaryResult> {
        let started = Instant::now();
        events.emit(ProgressEvent::Processing);

        let single = text.len() <= self.config.chunking.small_content_threshold;
        let result = if single {
            self.summarize_single(text, mode, started).await
        } else {
            self.summarize_chunked(text, mode, events, started).await
        };

        let path = if single { "single" } else { "chunked" };
        match result {
            Ok(summary) => {
                METRICS.record_summarize(true, path, started.elapsed().as_secs_f64());
                info!(
                    "summarization finished in {}ms ({} chunks)",
                    summary.elapsed_ms, summary.chunk_count
                );
                events.emit(ProgressEvent::Result {
                    summary: summary.clone(),
                });
                events.emit(ProgressEvent::Complete);
                Ok(summary)
            }
            Err(err) => {
                METRICS.record_summarize(false, path, started.elapsed().as_secs_f64());
                Err(err)
            }
        }
    }

    /// Small input: one invocation, no pool batching.
    async fn summarize_single(
        &self,
        text: &str,
        mode: SummaryMode,
        started: Instant,
    ) -> Result<SummaryResult> {
        debug!("input of {} chars takes the single-shot path", text.len());

        let request = self.completion_request(
            prompts::SUMMARY_SYSTEM_PROMPT,
            prompts::single_shot_prompt(mode, text),
            &self.config.llm.model,
        );
        let summary = self.invoker.invoke(request, None).await?;

        Ok(SummaryResult {
            text: summary.text,
            model: summary.model,
            elapsed_ms: started.elapsed().as_millis() as u64,
            chunk_count: 1,
            dropped_chunks: 0,
        })
    }

    /// Large input: chunk, dispatch to the pool, aggregate.
    async fn summarize_chunked(
        &self,
        text: &str,
        mode: SummaryMode,
        events: &EventSink,
        started: Instant,
    ) -> Result<SummaryResult> {
        let chunking = self.config.chunking.clone();
        let mut chunks =
            chunker::chunk_with_min(text, chunking.max_chunk_size, chunking.min_chunk_size);

        let mut dropped = 0;
        if chunks.len() > chunking.max_chunks_per_request {
            dropped = chunks.len() - chunking.max_chunks_per_request;
            chunks.truncate(chunking.max_chunks_per_request);
            warn!("chunk cap reached, dropping {dropped} trailing chunks");
            METRICS.chunks_dropped.inc_by(dropped as f64);
            events.emit(ProgressEvent::Warning {
                message: format!(
                    "input exceeds the processing cap; {dropped} trailing sections were skipped"
                ),
            });
        }

        let total = chunks.len();
        info!("split {} chars into {} chunks", text.len(), total);
        events.emit(ProgressEvent::Info {
            message: format!("split input into {total} chunks"),
        });
        METRICS.chunks_processed.inc_by(total as f64);

        let completed = Arc::new(AtomicUsize::new(0));
        let mut joins = Vec::with_capacity(total);

        for chunk in chunks {
            let index = chunk.index;
            let request = self.completion_request(
                prompts::SUMMARY_SYSTEM_PROMPT,
                prompts::chunk_prompt(mode, index + 1, total, &chunk.text),
                &self.config.llm.model,
            );

            let invoker = self.invoker.clone();
            let run: TaskFn<ChunkSummary> = Arc::new(move || {
                let invoker = invoker.clone();
                let request = request.clone();
                async move {
                    match invoker.invoke(request, Some(index)).await {
                        Ok(summary) => TaskOutcome::Completed(summary),
                        Err(err) if err.is_transient() => TaskOutcome::Retry(err),
                        Err(err) => TaskOutcome::Failed(err),
                    }
                }
                .boxed()
            });

            // earlier chunks win under contention
            let priority = (total - index) as i64;
            let handle = self
                .pool
                .submit(run, priority, self.config.scheduler.max_task_retries);

            let events = events.clone();
            let completed = completed.clone();
            joins.push(async move {
                let result = handle.join().await;
                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                match &result {
                    Ok(summary) => {
                        events.emit(ProgressEvent::Chunk {
                            index,
                            summary: summary.text.clone(),
                        });
                    }
                    Err(err) => {
                        warn!("chunk {index} failed permanently: {err}");
                        METRICS.chunks_failed.inc();
                        events.emit(ProgressEvent::Warning {
                            message: format!("section {} could not be summarized: {err}", index + 1),
                        });
                    }
                }
                events.emit(ProgressEvent::Progress {
                    chunk_index: index,
                    total_chunks: total,
                    percent: (done * 100 / total) as u8,
                    stage: None,
                });
                (index, result)
            });
        }

        let outcomes = futures::future::join_all(joins).await;

        // reassemble by chunk index, not completion order
        let mut summaries: Vec<Option<ChunkSummary>> = (0..total).map(|_| None).collect();
        for (index, result) in outcomes {
            if let Ok(summary) = result {
                summaries[index] = Some(summary);
            }
        }

        let valid = summaries.iter().flatten().count();
        if valid == 0 {
            return Err(SummarizeError::AllChunksFailed);
        }

        let model = summaries
            .iter()
            .flatten()
            .next()
            .map(|s| s.model.clone())
            .unwrap_or_else(|| self.config.llm.model.clone());
        let sections = compose_sections(&summaries);

        let text_out = if valid <= chunking.small_chunk_count_threshold {
            debug!("{valid} summaries at or below threshold, skipping meta-summary");
            sections
        } else {
            events.emit(ProgressEvent::Progress {
                chunk_index: total,
                total_chunks: total,
                percent: 100,
                stage: Some("finalizing".to_string()),
            });
            match self.meta_summarize(&sections).await {
                Ok(summary) => summary.text,
                Err(err) => {
                    warn!("meta-summary failed ({err}), falling back to concatenated sections");
                    events.emit(ProgressEvent::Warning {
                        message: "synthesis pass failed; returning per-section summaries"
                            .to_string(),
                    });
                    sections
                }
            }
        };

        Ok(SummaryResult {
            text: text_out,
            model,
            elapsed_ms: started.elapsed().as_millis() as u64,
            chunk_count: total,
            dropped_chunks: dropped,
        })
    }

    /// Second-pass synthesis over the concatenated chunk summaries.
    async fn meta_summarize(&self, sections: &str) -> Result<ChunkSummary> {
        METRICS.meta_summaries.inc();
        let request = self.completion_request(
            prompts::META_SYSTEM_PROMPT,
            prompts::meta_prompt(sections),
            self.config.llm.meta_model(),
        );
        self.invoker.invoke(request, None).await
    }

    fn completion_request(
        &self,
        system_prompt: &str,
        user_prompt: String,
        model: &str,
    ) -> CompletionRequest {
        CompletionRequest {
            system_prompt: system_prompt.to_string(),
            user_prompt,
            model: model.to_string(),
            max_tokens: self.config.llm.max_tokens,
            temperature: self.config.llm.temperature,
        }
    }
}

/// Lay chunk summaries out under numbered section headers, substituting a
/// placeholder for sections that failed permanently.
fn compose_sections(summaries: &[Option<ChunkSummary>]) -> String {
    let mut out = String::new();
    for (i, slot) in summaries.iter().enumerate() {
        if i > 0 {
            out.push_str("\n\n");
        }
        out.push_str(&format!("## Part {}\n\n", i + 1));
        match slot {
            Some(summary) => out.push_str(summary.text.trim()),
            None => out.push_str(&format!(
                "[Section {} unavailable: summarization failed]",
                i + 1
            )),
        }
    }
    out
}
