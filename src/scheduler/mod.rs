//! Bounded-concurrency task scheduling
//!
//! `pool` owns dispatch, retry, and timeouts; `resize` holds the pure sizing
//! heuristic the pool consults on a timer.

pub mod pool;
pub mod resize;

pub use pool::{PoolConfig, PoolStatus, TaskFn, TaskHandle, Worker, WorkerPool};
pub use resize::compute_target_size;

use crate::error::SummarizeError;

/// Tagged task result
///
/// Settling goes through exactly one of these arms, so the pool's active
/// count is incremented and decremented exactly once per task attempt no
/// matter how the task ends.
pub enum TaskOutcome<T> {
    /// Task produced a value
    Completed(T),
    /// Recoverable failure: re-enqueue with boosted priority if budget remains
    Retry(SummarizeError),
    /// Unrecoverable failure: reject the caller immediately
    Failed(SummarizeError),
}
