//! Shared failure aggregation.
//!
//! During fan-out every task may fail independently; failures are
//! collected into one [`FailureLog`] shared by all tasks. The list and
//! the counter live behind a single mutex so a record-and-count is one
//! atomic step. Insertion order is completion order, which is
//! non-deterministic across runs.
//!
//! After the join barrier the log is read into a [`RunResult`], which the
//! notifier and the exit-status decision consume. The counter can exceed
//! the record count by one when the failure notification itself fails to
//! deliver ([`FailureLog::bump()`]).

use std::sync::Mutex;

/// One failed recipient, identified by its short host name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub recipient: String,
}

#[derive(Debug, Default)]
struct FailureLogInner {
    records: Vec<FailureRecord>,
    count: usize,
}

/// Thread-safe failure collector shared across concurrent tasks.
#[derive(Debug, Default)]
pub struct FailureLog {
    inner: Mutex<FailureLogInner>,
}

impl FailureLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failed recipient and bump the counter, atomically.
    pub fn record(&self, recipient: impl Into<String>) {
        let mut inner = self.inner.lock().expect("failure log poisoned");
        inner.records.push(FailureRecord {
            recipient: recipient.into(),
        });
        inner.count += 1;
    }

    /// Bump the counter without a record (notification delivery failure).
    pub fn bump(&self) {
        self.inner.lock().expect("failure log poisoned").count += 1;
    }

    /// Current failure count.
    pub fn count(&self) -> usize {
        self.inner.lock().expect("failure log poisoned").count
    }

    /// Copy of the records in insertion order.
    pub fn snapshot(&self) -> Vec<FailureRecord> {
        self.inner
            .lock()
            .expect("failure log poisoned")
            .records
            .clone()
    }
}

/// Outcome of one replication run, computed after the join barrier.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Recipients that were actually launched (malformed descriptors
    /// are skipped before launch and not counted here).
    pub total_recipients: usize,
    /// Aggregate failure count, including a failed notification.
    pub failed_count: usize,
    /// Per-recipient failure records in completion order.
    pub records: Vec<FailureRecord>,
}

impl RunResult {
    pub fn has_failures(&self) -> bool {
        self.failed_count > 0
    }
}
