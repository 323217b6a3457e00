//! Run metrics.
//!
//! Counts only; wall-clock timing goes to the log, never into a report.

use serde::Serialize;

/// Step counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    /// Steps whose body was invoked
    pub steps_executed: u64,
    /// Steps that succeeded
    pub steps_succeeded: u64,
    /// Steps that failed, before or after running
    pub steps_failed: u64,
    /// Steps skipped by their run condition
    pub steps_skipped: u64,
    /// Tags credited to the satisfied set
    pub tags_credited: u64,
}

impl Metrics {
    /// Create new metrics
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a step body invocation
    pub fn record_execution(&mut self) {
        self.steps_executed += 1;
    }

    /// Record a success
    pub fn record_success(&mut self) {
        self.steps_succeeded += 1;
    }

    /// Record a failure
    pub fn record_failure(&mut self) {
        self.steps_failed += 1;
    }

    /// Record a skip
    pub fn record_skip(&mut self) {
        self.steps_skipped += 1;
    }

    /// Record credited tags
    pub fn record_credit(&mut self, count: usize) {
        self.tags_credited += count as u64;
    }

    /// Steps seen in total
    #[must_use]
    pub fn total(&self) -> u64 {
        self.steps_succeeded + self.steps_failed + self.steps_skipped
    }

    /// Get success rate (0.0 - 1.0)
    ///
    /// Skipped steps count as successful.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 1.0;
        }
        (self.steps_succeeded + self.steps_skipped) as f64 / total as f64
    }

    /// Get failure rate (0.0 - 1.0)
    #[must_use]
    pub fn failure_rate(&self) -> f64 {
        1.0 - self.success_rate()
    }
}
