//! Sliding-window rate limiting for outbound API calls
//!
//! Keeps a rolling 60-second window of granted call timestamps. When the
//! window is full, callers take a ticket on an ordered waiting list and poll
//! until they reach the front and a slot frees up, so waiters are served
//! first-requested-first-served and none is skipped by a newer arrival.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

const WINDOW: Duration = Duration::from_secs(60);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Sliding-window rate limiter
///
/// Constructed explicitly and shared via `Arc`; there is no ambient global.
pub struct RateLimiter {
    max_per_minute: usize,
    state: Mutex<LimiterState>,
}

struct LimiterState {
    window: VecDeque<Instant>,
    waiters: VecDeque<u64>,
    next_ticket: u64,
}

impl LimiterState {
    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.window.front() {
            if now.duration_since(*front) >= WINDOW {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }

    fn has_room(&self, max: usize) -> bool {
        self.window.len() < max
    }
}

impl RateLimiter {
    pub fn new(max_per_minute: usize) -> Self {
        Self {
            max_per_minute: max_per_minute.max(1),
            state: Mutex::new(LimiterState {
                window: VecDeque::new(),
                waiters: VecDeque::new(),
                next_ticket: 0,
            }),
        }
    }

    /// Whether a call would be granted right now without waiting
    pub fn can_proceed(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        state.prune(Instant::now());
        state.has_room(self.max_per_minute) && state.waiters.is_empty()
    }

    /// Number of granted calls still inside the rolling window
    pub fn granted_in_window(&self) -> usize {
        let mut state = self.state.lock().unwrap();
        state.prune(Instant::now());
        state.window.len()
    }

    /// Suspend until a slot is free, then record the call.
    pub async fn acquire(&self) {
        let ticket = {
            let mut state = self.state.lock().unwrap();
            let now = Instant::now();
            state.prune(now);
            if state.has_room(self.max_per_minute) && state.waiters.is_empty() {
                state.window.push_back(now);
                return;
            }
            let ticket = state.next_ticket;
            state.next_ticket += 1;
            state.waiters.push_back(ticket);
            ticket
        };

        debug!("rate budget exhausted, waiting (ticket {ticket})");
        crate::metrics::METRICS.rate_limiter_waits.inc();

        loop {
            tokio::time::sleep(POLL_INTERVAL).await;

            let mut state = self.state.lock().unwrap();
            let now = Instant::now();
            state.prune(now);
            if state.has_room(self.max_per_minute) && state.waiters.front() == Some(&ticket) {
                state.waiters.pop_front();
                state.window.push_back(now);
                return;
            }
        }
    }
}
