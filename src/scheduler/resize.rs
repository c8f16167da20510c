//! Pool sizing heuristic
//!
//! Pure functions, called on a timer by the pool, so the sizing policy is
//! testable without spinning up workers.

/// Propose a worker count from observed throughput.
///
/// The estimate is clamped to `[min_workers, max_workers]`; proposals whose
/// relative change from `current_size` is at or below `threshold` return
/// `current_size` unchanged, so the pool does not thrash on noise.
pub fn compute_target_size(
    completed_per_minute: f64,
    current_size: usize,
    min_workers: usize,
    max_workers: usize,
    threshold: f64,
) -> usize {
    let estimate = completed_per_minute.max(0.0).ceil() as usize;
    let target = estimate.clamp(min_workers, max_workers.max(min_workers));

    if is_significant_change(current_size, target, threshold) {
        target
    } else {
        current_size
    }
}

/// Whether a proposed size differs from the current one by more than
/// `threshold` (fractional, relative to the current size).
pub fn is_significant_change(current: usize, target: usize, threshold: f64) -> bool {
    if current == target {
        return false;
    }
    if current == 0 {
        return true;
    }
    current.abs_diff(target) as f64 / current as f64 > threshold
}
