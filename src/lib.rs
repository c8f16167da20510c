//! LLM-backed summarization of large text
//!
//! Splits oversized input into boundary-aware chunks, dispatches per-chunk
//! summarization calls through a rate-limited, retrying worker pool, and
//! folds the partial results into a single summary (direct concatenation or a
//! second-pass meta-summary).

pub mod api;
pub mod chunker;
pub mod config;
pub mod error;
pub mod events;
pub mod limiter;
pub mod llm;
pub mod metrics;
pub mod orchestrator;
pub mod prompts;
pub mod scheduler;

pub use config::Config;
pub use error::{Result, SummarizeError};
pub use events::{EventSink, ProgressEvent};
pub use orchestrator::{SummarizeEngine, SummaryResult};
pub use prompts::SummaryMode;
