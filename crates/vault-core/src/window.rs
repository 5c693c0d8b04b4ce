//! Time-pruned event window used by the rate heuristics.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Timestamps younger than `span`, oldest first.
///
/// Eviction is lazy: entries are dropped on `record` and `prune`, never in the
/// background. After either call every retained entry satisfies
/// `now - t < span`.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    span: Duration,
    times: VecDeque<Instant>,
}

impl SlidingWindow {
    pub fn new(span: Duration) -> Self {
        Self {
            span,
            times: VecDeque::new(),
        }
    }

    /// Add `at` and prune relative to it. Returns the retained count.
    pub fn record(&mut self, at: Instant) -> usize {
        self.times.push_back(at);
        self.prune(at)
    }

    /// Drop entries that are `span` or older at `now`. Returns the retained count.
    pub fn prune(&mut self, now: Instant) -> usize {
        self.times
            .retain(|t| now.saturating_duration_since(*t) < self.span);
        self.times.len()
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn clear(&mut self) {
        self.times.clear();
    }
}
