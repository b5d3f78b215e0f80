use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tracing::warn;

/// Counts consecutive transient failures across the articles of one run.
/// Once `threshold` is reached it opens and stays open for the rest of the run.
#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    consecutive: AtomicU32,
    open: AtomicBool,
}

impl CircuitBreaker {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            consecutive: AtomicU32::new(0),
            open: AtomicBool::new(false),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub fn record_success(&self) {
        self.consecutive.store(0, Ordering::SeqCst);
    }

    pub fn record_transient_failure(&self) {
        let count = self.consecutive.fetch_add(1, Ordering::SeqCst) + 1;
        if count >= self.threshold && !self.open.swap(true, Ordering::SeqCst) {
            warn!(
                consecutive_failures = count,
                threshold = self.threshold,
                "Enrichment circuit breaker opened; remaining articles are short-circuited"
            );
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive.load(Ordering::SeqCst)
    }
}
