//! Pipeline counters.
//!
//! Metrics are an explicit collector object injected at construction, never
//! ambient global state, so tests can assert on an isolated instance. All
//! counters use atomic increments; the per-rule-set map takes a short write
//! lock. These are the only pieces of state shared between records.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Shared counters for one pipeline instance.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    records_ingested: AtomicU64,
    records_quarantined: AtomicU64,
    cast_warnings: AtomicU64,
    records_normalized: AtomicU64,
    records_emitted: AtomicU64,
    emit_failures: AtomicU64,
    batch_failures: AtomicU64,
    ruleset_applications: RwLock<BTreeMap<String, u64>>,
}

/// Point-in-time copy of the counters, for the observability surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Records decoded successfully.
    pub records_ingested: u64,
    /// Records quarantined during decoding.
    pub records_quarantined: u64,
    /// Soft numeric-cast failures.
    pub cast_warnings: u64,
    /// Records that completed normalization.
    pub records_normalized: u64,
    /// Records accepted by the sink.
    pub records_emitted: u64,
    /// Per-record emit failures.
    pub emit_failures: u64,
    /// Batches that failed terminally.
    pub batch_failures: u64,
    /// How many records each rule set was applied to.
    pub ruleset_applications: BTreeMap<String, u64>,
}

impl PipelineMetrics {
    /// Creates a fresh collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fresh collector wrapped in an `Arc`.
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Counts records decoded successfully.
    pub fn record_ingested(&self, count: u64) {
        self.records_ingested.fetch_add(count, Ordering::Relaxed);
    }

    /// Counts one quarantined record.
    pub fn record_quarantined(&self) {
        self.records_quarantined.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one soft cast failure.
    pub fn record_cast_warning(&self) {
        self.cast_warnings.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one application of a rule set to a record.
    pub fn record_ruleset_applied(&self, name: &str) {
        if let Ok(mut map) = self.ruleset_applications.write() {
            *map.entry(name.to_string()).or_insert(0) += 1;
        }
        // A poisoned lock only loses a counter update.
    }

    /// Counts records that completed normalization.
    pub fn record_normalized(&self, count: u64) {
        self.records_normalized.fetch_add(count, Ordering::Relaxed);
    }

    /// Counts records accepted by the sink.
    pub fn record_emitted(&self, count: u64) {
        self.records_emitted.fetch_add(count, Ordering::Relaxed);
    }

    /// Counts one per-record emit failure.
    pub fn record_emit_failure(&self) {
        self.emit_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one terminal batch failure.
    pub fn record_batch_failure(&self) {
        self.batch_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a consistent-enough snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_ingested: self.records_ingested.load(Ordering::Relaxed),
            records_quarantined: self.records_quarantined.load(Ordering::Relaxed),
            cast_warnings: self.cast_warnings.load(Ordering::Relaxed),
            records_normalized: self.records_normalized.load(Ordering::Relaxed),
            records_emitted: self.records_emitted.load(Ordering::Relaxed),
            emit_failures: self.emit_failures.load(Ordering::Relaxed),
            batch_failures: self.batch_failures.load(Ordering::Relaxed),
            ruleset_applications: self
                .ruleset_applications
                .read()
                .map(|map| map.clone())
                .unwrap_or_default(),
        }
    }
}
