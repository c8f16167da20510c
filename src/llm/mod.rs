//! External summarization backend
//!
//! The LLM call is an opaque async operation behind [`CompletionBackend`]:
//! the HTTP implementation lives in `client`, retry-with-backoff in
//! `invoker`. Tests and fallbacks supply their own backend implementations.

pub mod client;
pub mod invoker;

pub use client::HttpCompletionBackend;
pub use invoker::RetryingInvoker;

use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;

/// One summarization call, fully specified
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub model: String,
    pub max_tokens: usize,
    pub temperature: f32,
}

/// Raw backend response
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub text: String,
    pub model: String,
}

/// A finished per-chunk (or single-shot) summary
///
/// Not mutated after creation; elapsed time and model identifier ride along
/// for observability.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkSummary {
    pub text: String,
    pub source_chunk_index: Option<usize>,
    pub model: String,
    pub elapsed_ms: u64,
}

/// Opaque external summarization operation
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;
}
