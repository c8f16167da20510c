//! End-to-end pipeline tests against a scripted in-process backend
//!
//! Exercises the orchestrator, worker pool, rate limiter, and invoker
//! together: single-shot vs chunked paths, aggregation policy, retry
//! behavior, partial failure, and the concurrency bound.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use summary_engine::error::{Result, SummarizeError};
use summary_engine::events::{EventSink, ProgressEvent};
use summary_engine::llm::{CompletionBackend, CompletionRequest, CompletionResponse};
use summary_engine::prompts::SummaryMode;
use summary_engine::{Config, SummarizeEngine};

/// Backend with programmable failure behavior and concurrency tracking
#[derive(Default)]
struct ScriptedBackend {
    /// fail this many leading calls with an overloaded error
    fail_first: usize,
    /// fail every call terminally
    terminal: bool,
    /// fail the chunk whose prompt names this part terminally
    terminal_for_part: Option<usize>,
    /// simulated call latency
    delay_ms: u64,
    calls: AtomicUsize,
    concurrent: AtomicUsize,
    peak_concurrent: AtomicUsize,
}

impl ScriptedBackend {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn peak(&self) -> usize {
        self.peak_concurrent.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_concurrent.fetch_max(now, Ordering::SeqCst);
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
        self.concurrent.fetch_sub(1, Ordering::SeqCst);

        if self.terminal {
            return Err(SummarizeError::Upstream {
                status: 400,
                message: "bad request".to_string(),
            });
        }
        if let Some(part) = self.terminal_for_part {
            if request.user_prompt.contains(&format!("part {part} of")) {
                return Err(SummarizeError::Upstream {
                    status: 400,
                    message: "bad chunk".to_string(),
                });
            }
        }
        if call < self.fail_first {
            return Err(SummarizeError::Overloaded("overloaded".to_string()));
        }
        if request.user_prompt.starts_with("Synthesize") {
            return Ok(CompletionResponse {
                text: "synthesized summary".to_string(),
                model: request.model,
            });
        }

        Ok(CompletionResponse {
            text: format!("summary of call {call}"),
            model: request.model,
        })
    }
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.llm.requests_per_minute = 1000;
    config.llm.retry_base_delay_ms = 10;
    config.chunking.max_chunk_size = 1000;
    config.chunking.min_chunk_size = 100;
    config.chunking.small_content_threshold = 1000;
    config
}

/// A paragraph of ~800 chars plus a paragraph break
fn paragraphs(count: usize) -> String {
    format!("{}\n\n", "a".repeat(800)).repeat(count)
}

fn engine_with(backend: Arc<ScriptedBackend>, config: Config) -> SummarizeEngine {
    SummarizeEngine::new(config, backend)
}

#[tokio::test(start_paused = true)]
async fn test_small_input_takes_single_path() {
    let backend = Arc::new(ScriptedBackend::default());
    let engine = engine_with(backend.clone(), test_config());

    let result = engine
        .summarize("short input", SummaryMode::Document, &EventSink::disabled())
        .await
        .unwrap();

    assert_eq!(backend.calls(), 1);
    assert_eq!(result.chunk_count, 1);
    assert_eq!(result.dropped_chunks, 0);
    assert!(!result.text.contains("## Part"));
}

#[tokio::test(start_paused = true)]
async fn test_few_chunks_concatenated_without_meta_call() {
    let backend = Arc::new(ScriptedBackend::default());
    let engine = engine_with(backend.clone(), test_config());

    let result = engine
        .summarize(&paragraphs(4), SummaryMode::Document, &EventSink::disabled())
        .await
        .unwrap();

    // one call per chunk, no synthesis pass
    assert_eq!(result.chunk_count, 4);
    assert_eq!(backend.calls(), 4);
    assert!(result.text.contains("## Part 1"));
    assert!(result.text.contains("## Part 4"));
}

#[tokio::test(start_paused = true)]
async fn test_many_chunks_trigger_meta_summary() {
    let backend = Arc::new(ScriptedBackend::default());
    let engine = engine_with(backend.clone(), test_config());

    let result = engine
        .summarize(&paragraphs(9), SummaryMode::Document, &EventSink::disabled())
        .await
        .unwrap();

    assert_eq!(result.chunk_count, 9);
    // nine chunk calls plus one meta-summary call
    assert_eq!(backend.calls(), 10);
    assert_eq!(result.text, "synthesized summary");
}

#[tokio::test(start_paused = true)]
async fn test_overloaded_twice_then_success() {
    let backend = Arc::new(ScriptedBackend {
        fail_first: 2,
        ..ScriptedBackend::default()
    });
    let engine = engine_with(backend.clone(), test_config());

    let result = engine
        .summarize("short input", SummaryMode::Document, &EventSink::disabled())
        .await
        .unwrap();

    // two transient failures consumed by in-invoker retries
    assert_eq!(backend.calls(), 3);
    assert_eq!(result.chunk_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_all_chunks_failing_is_hard_error() {
    let backend = Arc::new(ScriptedBackend {
        terminal: true,
        ..ScriptedBackend::default()
    });
    let engine = engine_with(backend.clone(), test_config());

    let err = engine
        .summarize(&paragraphs(4), SummaryMode::Document, &EventSink::disabled())
        .await
        .unwrap_err();

    assert!(matches!(err, SummarizeError::AllChunksFailed));
    // terminal failures are attempted exactly once per chunk
    assert_eq!(backend.calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_single_failed_chunk_becomes_placeholder() {
    let backend = Arc::new(ScriptedBackend {
        terminal_for_part: Some(2),
        ..ScriptedBackend::default()
    });
    let engine = engine_with(backend.clone(), test_config());

    let result = engine
        .summarize(&paragraphs(4), SummaryMode::Document, &EventSink::disabled())
        .await
        .unwrap();

    assert_eq!(result.chunk_count, 4);
    assert!(result.text.contains("## Part 2"));
    assert!(result
        .text
        .contains("[Section 2 unavailable: summarization failed]"));
    assert!(result.text.contains("## Part 3"));
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_stays_within_bound() {
    let backend = Arc::new(ScriptedBackend {
        delay_ms: 50,
        ..ScriptedBackend::default()
    });
    let mut config = test_config();
    config.scheduler.max_concurrent_requests = 5;

    let engine = engine_with(backend.clone(), config);
    let result = engine
        .summarize(&paragraphs(20), SummaryMode::Document, &EventSink::disabled())
        .await
        .unwrap();

    assert_eq!(result.chunk_count, 20);
    // twenty chunk calls plus the meta-summary
    assert_eq!(backend.calls(), 21);
    assert!(backend.peak() <= 5, "peak concurrency {}", backend.peak());
}

#[tokio::test(start_paused = true)]
async fn test_chunk_cap_drops_excess_with_report() {
    let backend = Arc::new(ScriptedBackend::default());
    let mut config = test_config();
    config.chunking.max_chunks_per_request = 3;

    let engine = engine_with(backend.clone(), config);
    let (sink, mut rx) = EventSink::channel();

    let result = engine
        .summarize(&paragraphs(6), SummaryMode::Document, &sink)
        .await
        .unwrap();
    drop(sink);

    assert_eq!(result.chunk_count, 3);
    assert_eq!(result.dropped_chunks, 3);

    let mut saw_drop_warning = false;
    while let Ok(event) = rx.try_recv() {
        if let ProgressEvent::Warning { message } = event {
            saw_drop_warning |= message.contains("3 trailing sections were skipped");
        }
    }
    assert!(saw_drop_warning);
}

#[tokio::test(start_paused = true)]
async fn test_event_stream_shape() {
    let backend = Arc::new(ScriptedBackend::default());
    let engine = engine_with(backend.clone(), test_config());
    let (sink, mut rx) = EventSink::channel();

    engine
        .summarize(&paragraphs(4), SummaryMode::Document, &sink)
        .await
        .unwrap();
    drop(sink);

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }

    assert_eq!(events.first().unwrap().name(), "processing");
    assert_eq!(events.last().unwrap().name(), "complete");

    let names: Vec<_> = events.iter().map(|e| e.name()).collect();
    assert!(names.contains(&"info"));
    assert_eq!(names.iter().filter(|n| **n == "chunk").count(), 4);
    assert_eq!(names.iter().filter(|n| **n == "progress").count(), 4);
    assert_eq!(names.iter().filter(|n| **n == "result").count(), 1);

    // the final progress event reports full completion
    let last_progress = events
        .iter()
        .rev()
        .find_map(|e| match e {
            ProgressEvent::Progress { percent, .. } => Some(*percent),
            _ => None,
        })
        .unwrap();
    assert_eq!(last_progress, 100);
}

#[tokio::test(start_paused = true)]
async fn test_meta_failure_falls_back_to_sections() {
    // chunk calls succeed; the meta call (the tenth) fails terminally
    struct MetaFailBackend {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionBackend for MetaFailBackend {
        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if request.user_prompt.starts_with("Synthesize") {
                return Err(SummarizeError::Upstream {
                    status: 400,
                    message: "meta rejected".to_string(),
                });
            }
            Ok(CompletionResponse {
                text: format!("summary {call}"),
                model: request.model,
            })
        }
    }

    let backend = Arc::new(MetaFailBackend {
        calls: AtomicUsize::new(0),
    });
    let engine = SummarizeEngine::new(test_config(), backend);

    let result = engine
        .summarize(&paragraphs(6), SummaryMode::Document, &EventSink::disabled())
        .await
        .unwrap();

    // degraded but usable output
    assert!(result.text.contains("## Part 1"));
    assert!(result.text.contains("## Part 6"));
}
