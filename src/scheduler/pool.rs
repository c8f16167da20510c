//! Bounded-concurrency worker pool with priority queue and task retry
//!
//! Workers are concurrency slots, not threads: every task runs as a spawned
//! future, and the pool only bounds how many are in flight. Tasks settle
//! exactly once through a single completion path (success, failure, retry
//! exhaustion, or timeout), which keeps the active count balanced on every
//! path.

use super::{resize, TaskOutcome};
use crate::config::SchedulerConfig;
use crate::error::{Result, SummarizeError};
use crate::metrics::METRICS;
use futures::future::BoxFuture;
use rand::Rng;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Task body: invoked once per attempt, reports a tagged outcome
pub type TaskFn<T> = Arc<dyn Fn() -> BoxFuture<'static, TaskOutcome<T>> + Send + Sync>;

/// Pool tuning knobs
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_concurrent_requests: usize,
    pub min_workers: usize,
    pub task_timeout: Duration,
    pub retry_base_delay: Duration,
    pub retry_priority_boost: i64,
    pub resize_interval: Duration,
    pub resize_threshold: f64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 5,
            min_workers: 1,
            task_timeout: Duration::from_secs(120),
            retry_base_delay: Duration::from_secs(1),
            retry_priority_boost: 1000,
            resize_interval: Duration::from_secs(180),
            resize_threshold: 0.25,
        }
    }
}

impl From<&SchedulerConfig> for PoolConfig {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            max_concurrent_requests: config.max_concurrent_requests.max(1),
            min_workers: config.min_workers.max(1),
            task_timeout: config.task_timeout(),
            retry_base_delay: config.task_retry_base_delay(),
            retry_priority_boost: config.retry_priority_boost,
            resize_interval: config.resize_interval(),
            resize_threshold: config.resize_threshold,
        }
    }
}

/// A concurrency slot
#[derive(Debug, Clone)]
pub struct Worker {
    pub id: usize,
    pub busy: bool,
    pub last_active: Instant,
}

/// Point-in-time pool snapshot
#[derive(Debug, Clone, serde::Serialize)]
pub struct PoolStatus {
    pub size: usize,
    pub active: usize,
    pub queued: usize,
    pub completed: u64,
}

/// Awaitable task result
pub struct TaskHandle<T> {
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> TaskHandle<T> {
    pub async fn join(self) -> Result<T> {
        self.rx
            .await
            .unwrap_or_else(|_| Err(SummarizeError::Internal("task dropped without settling".to_string())))
    }
}

struct QueuedTask<T> {
    id: Uuid,
    priority: i64,
    seq: u64,
    retries: u32,
    max_retries: u32,
    enqueued_at: Instant,
    run: TaskFn<T>,
    done: oneshot::Sender<Result<T>>,
}

impl<T> PartialEq for QueuedTask<T> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl<T> Eq for QueuedTask<T> {}

impl<T> PartialOrd for QueuedTask<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for QueuedTask<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // higher priority first; ties go to the earlier submission
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct PoolState<T> {
    queue: BinaryHeap<QueuedTask<T>>,
    workers: Vec<Worker>,
    active: usize,
    completed: u64,
    seq: u64,
    next_worker_id: usize,
}

struct PoolInner<T> {
    config: PoolConfig,
    state: Mutex<PoolState<T>>,
}

/// Bounded-concurrency scheduler
pub struct WorkerPool<T> {
    inner: Arc<PoolInner<T>>,
}

impl<T> Clone for WorkerPool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + 'static> WorkerPool<T> {
    pub fn new(config: PoolConfig) -> Self {
        let size = config.max_concurrent_requests.max(1);
        let now = Instant::now();
        let workers = (0..size)
            .map(|id| Worker {
                id,
                busy: false,
                last_active: now,
            })
            .collect();

        METRICS.pool_size.set(size as i64);

        Self {
            inner: Arc::new(PoolInner {
                config,
                state: Mutex::new(PoolState {
                    queue: BinaryHeap::new(),
                    workers,
                    active: 0,
                    completed: 0,
                    seq: 0,
                    next_worker_id: size,
                }),
            }),
        }
    }

    /// Queue a task; the handle resolves exactly once when the task settles.
    pub fn submit(&self, run: TaskFn<T>, priority: i64, max_retries: u32) -> TaskHandle<T> {
        let (done, rx) = oneshot::channel();
        {
            let mut state = self.inner.state.lock().unwrap();
            let seq = state.seq;
            state.seq += 1;
            state.queue.push(QueuedTask {
                id: Uuid::new_v4(),
                priority,
                seq,
                retries: 0,
                max_retries,
                enqueued_at: Instant::now(),
                run,
                done,
            });
        }
        self.process_queue();
        TaskHandle { rx }
    }

    pub fn status(&self) -> PoolStatus {
        let state = self.inner.state.lock().unwrap();
        PoolStatus {
            size: state.workers.len(),
            active: state.active,
            queued: state.queue.len(),
            completed: state.completed,
        }
    }

    /// Dispatch queued tasks while an idle worker and a concurrency slot exist.
    fn process_queue(&self) {
        loop {
            let (task, worker_id) = {
                let mut state = self.inner.state.lock().unwrap();
                if state.active >= self.inner.config.max_concurrent_requests {
                    break;
                }
                let Some(slot) = state.workers.iter().position(|w| !w.busy) else {
                    break;
                };
                let Some(task) = state.queue.pop() else {
                    break;
                };
                state.workers[slot].busy = true;
                state.workers[slot].last_active = Instant::now();
                state.active += 1;
                METRICS.pool_active.set(state.active as i64);
                let worker_id = state.workers[slot].id;
                (task, worker_id)
            };

            let pool = self.clone();
            tokio::spawn(async move {
                pool.run_task(task, worker_id).await;
            });
        }
    }

    async fn run_task(self, mut task: QueuedTask<T>, worker_id: usize) {
        debug!(
            "task {} executing (priority {}, retry {}/{}, queued {:?})",
            task.id,
            task.priority,
            task.retries,
            task.max_retries,
            task.enqueued_at.elapsed()
        );

        let mut call = tokio::spawn((task.run)());
        let outcome = match tokio::time::timeout(self.inner.config.task_timeout, &mut call).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(join_err)) => TaskOutcome::Failed(SummarizeError::Internal(format!(
                "task {} panicked: {join_err}",
                task.id
            ))),
            Err(_) => {
                // free the slot without cancelling the call; a late result is
                // discarded when the detached future finishes
                warn!(
                    "task {} exceeded {:?}, freeing worker slot",
                    task.id, self.inner.config.task_timeout
                );
                METRICS.tasks_timed_out.inc();
                self.release_worker(worker_id);
                let _ = task.done.send(Err(SummarizeError::Timeout));
                self.process_queue();
                return;
            }
        };

        self.release_worker(worker_id);

        match outcome {
            TaskOutcome::Completed(value) => {
                self.inner.state.lock().unwrap().completed += 1;
                let _ = task.done.send(Ok(value));
            }
            TaskOutcome::Failed(err) => {
                debug!("task {} failed terminally: {err}", task.id);
                let _ = task.done.send(Err(err));
            }
            TaskOutcome::Retry(err) => {
                if task.retries < task.max_retries {
                    self.schedule_retry(task, err);
                } else {
                    warn!(
                        "task {} exhausted {} retries: {err}",
                        task.id, task.max_retries
                    );
                    let _ = task.done.send(Err(err));
                }
            }
        }

        self.process_queue();
    }

    /// Re-enqueue a failed task with boosted priority after a jittered
    /// exponential backoff, so retries neither starve nor stampede.
    fn schedule_retry(&self, mut task: QueuedTask<T>, err: SummarizeError) {
        task.retries += 1;
        task.priority += self.inner.config.retry_priority_boost;
        let delay = self.retry_delay(task.retries);
        warn!(
            "task {} failed ({err}), retry {}/{} in {delay:?}",
            task.id, task.retries, task.max_retries
        );
        METRICS.tasks_retried.inc();

        let pool = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut state = pool.inner.state.lock().unwrap();
                task.seq = state.seq;
                state.seq += 1;
                task.enqueued_at = Instant::now();
                state.queue.push(task);
            }
            pool.process_queue();
        });
    }

    fn retry_delay(&self, retry: u32) -> Duration {
        let base = self
            .inner
            .config
            .retry_base_delay
            .saturating_mul(1u32 << retry.min(16));
        let jitter = rand::thread_rng().gen_range(0.0..0.2);
        base.mul_f64(1.0 + jitter)
    }

    fn release_worker(&self, worker_id: usize) {
        let mut state = self.inner.state.lock().unwrap();
        if let Some(worker) = state.workers.iter_mut().find(|w| w.id == worker_id) {
            worker.busy = false;
            worker.last_active = Instant::now();
        }
        state.active = state.active.saturating_sub(1);
        METRICS.pool_active.set(state.active as i64);
    }

    /// Periodically adjust worker count toward observed throughput.
    pub fn spawn_resize_loop(&self) -> tokio::task::JoinHandle<()> {
        let pool = self.clone();
        tokio::spawn(async move {
            let interval_secs = pool.inner.config.resize_interval.as_secs_f64().max(1.0);
            let mut ticker = tokio::time::interval(pool.inner.config.resize_interval);
            ticker.tick().await;
            let mut last_completed = pool.status().completed;
            loop {
                ticker.tick().await;
                let completed = pool.status().completed;
                let per_minute = (completed - last_completed) as f64 * 60.0 / interval_secs;
                last_completed = completed;
                pool.apply_resize(per_minute);
            }
        })
    }

    /// Resize toward the throughput estimate; shrinking removes idle workers
    /// only, never an executing one.
    pub fn apply_resize(&self, completed_per_minute: f64) {
        let config = &self.inner.config;
        let mut state = self.inner.state.lock().unwrap();
        let current = state.workers.len();
        let target = resize::compute_target_size(
            completed_per_minute,
            current,
            config.min_workers,
            config.max_concurrent_requests,
            config.resize_threshold,
        );
        if target == current {
            return;
        }

        if target > current {
            for _ in current..target {
                let id = state.next_worker_id;
                state.next_worker_id += 1;
                state.workers.push(Worker {
                    id,
                    busy: false,
                    last_active: Instant::now(),
                });
            }
        } else {
            let mut excess = current - target;
            state.workers.retain(|w| {
                if excess > 0 && !w.busy {
                    excess -= 1;
                    false
                } else {
                    true
                }
            });
        }

        let new_size = state.workers.len();
        METRICS.pool_size.set(new_size as i64);
        info!(
            "worker pool resized {current} -> {new_size} (throughput {completed_per_minute:.1}/min)"
        );
        drop(state);
        self.process_queue();
    }
}
