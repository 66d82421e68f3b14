//! Per-request usage and timing accounting
//!
//! Every upstream call made on behalf of one request reports its token usage
//! here, including calls whose output was later rejected. Directives record
//! concurrently, so the counters are atomics rather than a locked record.

use sdk::types::UsageRecord;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct UsageAggregator {
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
    reasoning_tokens: AtomicU64,
    total_tokens: AtomicU64,
    calls: AtomicU32,
    started: Instant,
}

impl UsageAggregator {
    /// Start accounting; elapsed time is measured from this instant
    pub fn new() -> Self {
        Self {
            input_tokens: AtomicU64::new(0),
            output_tokens: AtomicU64::new(0),
            reasoning_tokens: AtomicU64::new(0),
            total_tokens: AtomicU64::new(0),
            calls: AtomicU32::new(0),
            started: Instant::now(),
        }
    }

    /// Fold one call's usage into the running totals
    pub fn record(&self, usage: &UsageRecord) {
        self.input_tokens
            .fetch_add(usage.input_tokens, Ordering::Relaxed);
        self.output_tokens
            .fetch_add(usage.output_tokens, Ordering::Relaxed);
        self.reasoning_tokens
            .fetch_add(usage.reasoning_tokens, Ordering::Relaxed);
        self.total_tokens
            .fetch_add(usage.total_tokens, Ordering::Relaxed);
        self.calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Totals recorded so far
    pub fn snapshot(&self) -> UsageRecord {
        UsageRecord::new(
            self.input_tokens.load(Ordering::Relaxed),
            self.output_tokens.load(Ordering::Relaxed),
            self.reasoning_tokens.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
        )
    }

    /// Number of upstream calls that returned usage
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Whole milliseconds since start, rounded up and never below 1
    pub fn elapsed_ms(&self) -> u64 {
        ceil_millis(self.started.elapsed())
    }
}

impl Default for UsageAggregator {
    fn default() -> Self {
        Self::new()
    }
}

fn ceil_millis(elapsed: Duration) -> u64 {
    let millis = elapsed.as_nanos().div_ceil(1_000_000);
    u64::try_from(millis).unwrap_or(u64::MAX).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_record_sums_fields() {
        let usage = UsageAggregator::new();
        usage.record(&UsageRecord::new(100, 40, 10, 150));
        usage.record(&UsageRecord::new(20, 5, 0, 25));

        assert_eq!(usage.snapshot(), UsageRecord::new(120, 45, 10, 175));
        assert_eq!(usage.calls(), 2);
    }

    #[test]
    fn test_ceil_millis() {
        assert_eq!(ceil_millis(Duration::ZERO), 1);
        assert_eq!(ceil_millis(Duration::from_micros(1)), 1);
        assert_eq!(ceil_millis(Duration::from_millis(7)), 7);
        assert_eq!(ceil_millis(Duration::from_micros(7_001)), 8);
    }

    #[test]
    fn test_concurrent_recording() {
        let usage = Arc::new(UsageAggregator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let usage = Arc::clone(&usage);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        usage.record(&UsageRecord::new(1, 1, 0, 2));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(usage.snapshot().total_tokens, 1600);
        assert_eq!(usage.calls(), 800);
    }
}
