use std::collections::{HashMap, VecDeque};

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::config::JobConfig;

/// Mutable per-job counters, updated only from the job's own runner task.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobStatistics {
    /// Time of the last successful fetch attempt (changed or not).
    pub last_update: Option<String>,
    pub last_update_timestamp: Option<i64>,

    /// Time the payload was last observed to actually differ.
    pub last_change: Option<String>,
    pub last_change_timestamp: Option<i64>,

    pub last_error: Option<String>,
    pub last_error_timestamp: Option<i64>,

    /// Successful fetch count.
    pub run_counter: u64,
    pub error_counter: u64,

    /// Error message → occurrence count.
    pub errors: HashMap<String, u64>,

    /// Last N fetch durations in ms, oldest first.
    pub benchmark: VecDeque<u64>,

    #[serde(skip)]
    benchmark_size: usize,
}

impl JobStatistics {
    pub fn new(benchmark_size: usize) -> Self {
        Self {
            benchmark_size,
            ..Self::default()
        }
    }

    /// Record a successful fetch attempt (runs even when the payload turns
    /// out to be unchanged).
    pub fn record_success(&mut self, elapsed_ms: u64) {
        let now = Utc::now();
        self.last_update = Some(now.format("%Y-%m-%d %H:%M:%S").to_string());
        self.last_update_timestamp = Some(now.timestamp());
        self.run_counter += 1;
        self.push_benchmark(elapsed_ms);
    }

    /// Record that the payload actually changed this cycle.
    pub fn record_change(&mut self) {
        let now = Utc::now();
        self.last_change = Some(now.format("%Y-%m-%d %H:%M:%S").to_string());
        self.last_change_timestamp = Some(now.timestamp());
    }

    /// Record a failed fetch. Updates the error timestamp the retry
    /// controller keys on, so call this only for fetch failures.
    pub fn record_fetch_error(&mut self, message: &str) {
        self.count_error(message);
        self.last_error = Some(message.to_string());
        self.last_error_timestamp = Some(Utc::now().timestamp());
    }

    /// Record a non-fetch failure (transformer, diff, sink). Counted, but
    /// does not touch the retry timestamp.
    pub fn record_side_error(&mut self, message: &str) {
        self.count_error(message);
    }

    fn count_error(&mut self, message: &str) {
        self.error_counter += 1;
        *self.errors.entry(message.to_string()).or_insert(0) += 1;
    }

    fn push_benchmark(&mut self, elapsed_ms: u64) {
        if self.benchmark_size == 0 {
            return;
        }
        if self.benchmark.len() >= self.benchmark_size {
            self.benchmark.pop_front();
        }
        self.benchmark.push_back(elapsed_ms);
    }
}

/// Mutable runtime state of one job, exclusively owned by its runner task.
///
/// Kept apart from [`JobConfig`] so configuration can never be mutated
/// accidentally mid-run.
#[derive(Debug)]
pub struct JobState {
    /// False permanently disables scheduling for this job.
    pub valid: bool,
    /// True once the first successful fetch completed.
    pub available: bool,
    /// Content hash of the last stored raw payload.
    pub last_hash: Option<String>,
    /// Previous transformer outputs, kept for diffing.
    pub last_artifacts: HashMap<String, Value>,
    pub statistics: JobStatistics,
}

impl JobState {
    pub fn new(config: &JobConfig) -> Self {
        Self {
            valid: true,
            available: false,
            last_hash: None,
            last_artifacts: HashMap::new(),
            statistics: JobStatistics::new(config.benchmark_size),
        }
    }

    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    /// Snapshot for the serving layer.
    pub fn snapshot(&self, id: &str) -> JobStatusReport {
        JobStatusReport {
            id: id.to_string(),
            valid: self.valid,
            available: self.available,
            statistics: self.statistics.clone(),
        }
    }
}

/// Read-only status published to the store after every cycle.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatusReport {
    pub id: String,
    pub valid: bool,
    pub available: bool,
    pub statistics: JobStatistics,
}

impl JobStatusReport {
    /// Status for a job that failed configuration validation and was never
    /// scheduled.
    pub fn invalid(id: &str, error: &str) -> Self {
        let mut statistics = JobStatistics::new(0);
        statistics.record_fetch_error(error);
        Self {
            id: id.to_string(),
            valid: false,
            available: false,
            statistics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn benchmark_is_bounded_fifo() {
        let mut stats = JobStatistics::new(3);
        for ms in [10, 20, 30, 40, 50] {
            stats.record_success(ms);
        }
        assert_eq!(stats.benchmark.len(), 3);
        assert_eq!(stats.benchmark, VecDeque::from([30, 40, 50]));
        assert_eq!(stats.run_counter, 5);
    }

    #[test]
    fn fetch_errors_are_classified_by_message() {
        let mut stats = JobStatistics::new(4);
        stats.record_fetch_error("HTTP error: HTTP 503 for https://example.org");
        stats.record_fetch_error("HTTP error: HTTP 503 for https://example.org");
        stats.record_fetch_error("Request timed out after 5 seconds");
        assert_eq!(stats.error_counter, 3);
        assert_eq!(
            stats.errors["HTTP error: HTTP 503 for https://example.org"],
            2
        );
        assert_eq!(stats.errors["Request timed out after 5 seconds"], 1);
        assert!(stats.last_error_timestamp.is_some());
    }

    #[test]
    fn side_errors_do_not_touch_retry_timestamp() {
        let mut stats = JobStatistics::new(4);
        stats.record_side_error("Transformer 'simplify_ask' failed: bad shape");
        assert_eq!(stats.error_counter, 1);
        assert!(stats.last_error_timestamp.is_none());
    }

    #[test]
    fn success_updates_attempt_but_not_change() {
        let mut stats = JobStatistics::new(4);
        stats.record_success(42);
        assert!(stats.last_update_timestamp.is_some());
        assert!(stats.last_change_timestamp.is_none());
        stats.record_change();
        assert!(stats.last_change_timestamp.is_some());
    }

    #[test]
    fn invalid_report_carries_the_error() {
        let report = JobStatusReport::invalid("broken", "Configuration error: no source");
        assert!(!report.valid);
        assert!(!report.available);
        assert_eq!(report.statistics.error_counter, 1);
    }
}
