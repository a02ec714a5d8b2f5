//! Optimizer statistics.
//!
//! Counters are kept locally for introspection and mirrored to the `metrics`
//! facade for export.

use std::sync::atomic::{AtomicU64, Ordering};

use metrics::{counter, gauge, histogram};
use serde::Serialize;

use super::error::QueryError;

pub const METRIC_CACHE_HIT: &str = "vitrine_query_cache_hit_total";
pub const METRIC_CACHE_MISS: &str = "vitrine_query_cache_miss_total";
pub const METRIC_CACHE_EVICT: &str = "vitrine_query_cache_evict_total";
pub const METRIC_CACHE_EXPIRE: &str = "vitrine_query_cache_expire_total";
pub const METRIC_CACHE_ENTRIES: &str = "vitrine_query_cache_entries";
pub const METRIC_DISPATCH: &str = "vitrine_query_dispatch_total";
pub const METRIC_FAILURE: &str = "vitrine_query_failure_total";
pub const METRIC_BATCH_FLUSH: &str = "vitrine_batch_flush_total";
pub const METRIC_BATCH_SIZE: &str = "vitrine_batch_size";
pub const METRIC_DISPATCH_MS: &str = "vitrine_query_dispatch_ms";

/// Which path a network dispatch took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPath {
    Direct,
    Batched,
}

impl DispatchPath {
    fn label(self) -> &'static str {
        match self {
            DispatchPath::Direct => "direct",
            DispatchPath::Batched => "batched",
        }
    }
}

/// Live counters owned by one optimizer.
#[derive(Debug, Default)]
pub struct StatsRecorder {
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
    evictions: AtomicU64,
    direct_dispatches: AtomicU64,
    batched_dispatches: AtomicU64,
    batches_flushed: AtomicU64,
    failures: AtomicU64,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_CACHE_HIT).increment(1);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_CACHE_MISS).increment(1);
    }

    pub fn record_expirations(&self, count: usize) {
        if count == 0 {
            return;
        }
        self.expirations.fetch_add(count as u64, Ordering::Relaxed);
        counter!(METRIC_CACHE_EXPIRE).increment(count as u64);
    }

    pub fn record_evictions(&self, count: usize) {
        if count == 0 {
            return;
        }
        self.evictions.fetch_add(count as u64, Ordering::Relaxed);
        counter!(METRIC_CACHE_EVICT).increment(count as u64);
    }

    pub fn record_entry_count(&self, entries: usize) {
        gauge!(METRIC_CACHE_ENTRIES).set(entries as f64);
    }

    pub fn record_dispatch(&self, path: DispatchPath, elapsed_ms: f64) {
        let counter = match path {
            DispatchPath::Direct => &self.direct_dispatches,
            DispatchPath::Batched => &self.batched_dispatches,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_DISPATCH, "path" => path.label()).increment(1);
        histogram!(METRIC_DISPATCH_MS, "path" => path.label()).record(elapsed_ms);
    }

    pub fn record_failure(&self, error: &QueryError) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_FAILURE, "kind" => error.kind()).increment(1);
    }

    pub fn record_flush(&self, batch_size: usize) {
        self.batches_flushed.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_BATCH_FLUSH).increment(1);
        histogram!(METRIC_BATCH_SIZE).record(batch_size as f64);
    }

    pub fn batches_flushed(&self) -> u64 {
        self.batches_flushed.load(Ordering::Relaxed)
    }

    /// Capture the counters together with the current store and queue sizes.
    pub fn snapshot(&self, entries: usize, pending_batch_items: usize) -> OptimizerStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        };

        OptimizerStats {
            entries,
            pending_batch_items,
            hits,
            misses,
            hit_rate,
            direct_dispatches: self.direct_dispatches.load(Ordering::Relaxed),
            batched_dispatches: self.batched_dispatches.load(Ordering::Relaxed),
            batches_flushed: self.batches_flushed(),
            expirations: self.expirations.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.hits,
            &self.misses,
            &self.expirations,
            &self.evictions,
            &self.direct_dispatches,
            &self.batched_dispatches,
            &self.batches_flushed,
            &self.failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Point-in-time view of an optimizer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizerStats {
    pub entries: usize,
    pub pending_batch_items: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub direct_dispatches: u64,
    pub batched_dispatches: u64,
    pub batches_flushed: u64,
    pub expirations: u64,
    pub evictions: u64,
    pub failures: u64,
}

impl OptimizerStats {
    pub fn total_dispatches(&self) -> u64 {
        self.direct_dispatches + self.batched_dispatches
    }
}
