//! Bounded query result store.
//!
//! Entries carry a creation instant, a time-to-live and a set of dependency
//! tags. Expired entries are dropped lazily on read and in bulk by the sweep
//! that runs on every `sweep_interval`-th size or when the bound is exceeded.
//! Overflow is resolved by creation order: the oldest entries go first,
//! whether or not they were read recently.

use std::collections::{BTreeSet, HashMap};
use std::num::NonZeroUsize;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info};

use super::config::OptimizerConfig;
use super::keys::CacheKey;
use super::lock::{rw_read, rw_write};
use super::registry::DependencyIndex;
use super::stats::StatsRecorder;

const SOURCE: &str = "cache::store";

/// One cached result. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    value: Arc<Value>,
    created_at: Instant,
    ttl: Duration,
    sequence: u64,
}

impl CacheEntry {
    fn new(value: Arc<Value>, created_at: Instant, ttl: Duration, sequence: u64) -> Self {
        Self {
            value,
            created_at,
            ttl,
            sequence,
        }
    }

    /// An entry is valid while less than `ttl` has elapsed since creation.
    pub fn is_valid_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) < self.ttl
    }
}

/// Outcome of one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    pub evicted: usize,
}

#[derive(Debug, Default)]
struct StoreState {
    entries: HashMap<CacheKey, CacheEntry>,
    index: DependencyIndex,
    next_sequence: u64,
}

impl StoreState {
    fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.index.unregister(key);
        }
        removed
    }
}

/// Query result store owned by one optimizer.
pub struct QueryStore {
    state: RwLock<StoreState>,
    max_entries: NonZeroUsize,
    sweep_interval: NonZeroUsize,
    stats: Arc<StatsRecorder>,
}

impl QueryStore {
    pub fn new(config: &OptimizerConfig, stats: Arc<StatsRecorder>) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            max_entries: config.max_entries_non_zero(),
            sweep_interval: config.sweep_interval_non_zero(),
            stats,
        }
    }

    /// Return the cached value if present and still valid.
    ///
    /// An expired entry is removed before reporting absence.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<Value>> {
        let now = Instant::now();
        {
            let state = rw_read(&self.state, SOURCE, "get");
            match state.entries.get(key) {
                None => return None,
                Some(entry) if entry.is_valid_at(now) => return Some(Arc::clone(&entry.value)),
                Some(_) => {}
            }
        }

        let mut state = rw_write(&self.state, SOURCE, "get.expire");
        // Another writer may have replaced the entry between the two locks.
        match state.entries.get(key) {
            Some(entry) if entry.is_valid_at(now) => Some(Arc::clone(&entry.value)),
            Some(_) => {
                state.remove(key);
                self.stats.record_expirations(1);
                self.stats.record_entry_count(state.entries.len());
                debug!(key = %key, "Expired cache entry removed on read");
                None
            }
            None => None,
        }
    }

    /// Insert a fresh entry for `key`, replacing any previous one.
    ///
    /// Returns the sweep report when the insertion triggered a sweep.
    pub fn set(
        &self,
        key: CacheKey,
        value: Arc<Value>,
        ttl: Duration,
        dependencies: BTreeSet<String>,
    ) -> Option<SweepReport> {
        let now = Instant::now();
        let mut state = rw_write(&self.state, SOURCE, "set");

        let sequence = state.next_sequence;
        state.next_sequence += 1;

        state.index.register(&key, &dependencies);
        state
            .entries
            .insert(key, CacheEntry::new(value, now, ttl, sequence));

        let size = state.entries.len();
        let report = if size % self.sweep_interval.get() == 0 || size > self.max_entries.get() {
            Some(self.sweep_locked(&mut state, now))
        } else {
            None
        };

        self.stats.record_entry_count(state.entries.len());
        report
    }

    /// Remove one entry unconditionally.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let mut state = rw_write(&self.state, SOURCE, "invalidate");
        let removed = state.remove(key).is_some();
        self.stats.record_entry_count(state.entries.len());
        removed
    }

    /// Remove every entry tagged with `tag`, regardless of remaining TTL.
    pub fn invalidate_by_dependency(&self, tag: &str) -> usize {
        let mut state = rw_write(&self.state, SOURCE, "invalidate_by_dependency");
        let keys = state.index.keys_for_tag(tag);
        let mut removed = 0;
        for key in &keys {
            if state.remove(key).is_some() {
                removed += 1;
            }
        }
        self.stats.record_entry_count(state.entries.len());
        removed
    }

    pub fn clear(&self) {
        let mut state = rw_write(&self.state, SOURCE, "clear");
        state.entries.clear();
        state.index.clear();
        self.stats.record_entry_count(0);
    }

    /// Run a sweep pass now.
    pub fn sweep(&self) -> SweepReport {
        let now = Instant::now();
        let mut state = rw_write(&self.state, SOURCE, "sweep");
        let report = self.sweep_locked(&mut state, now);
        self.stats.record_entry_count(state.entries.len());
        report
    }

    fn sweep_locked(&self, state: &mut StoreState, now: Instant) -> SweepReport {
        let expired: Vec<CacheKey> = state
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_valid_at(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            state.remove(key);
        }

        let mut evicted = 0;
        let max_entries = self.max_entries.get();
        if state.entries.len() > max_entries {
            let mut by_age: Vec<(Instant, u64, CacheKey)> = state
                .entries
                .iter()
                .map(|(key, entry)| (entry.created_at, entry.sequence, key.clone()))
                .collect();
            by_age.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

            let excess = state.entries.len() - max_entries;
            for (_, _, key) in by_age.into_iter().take(excess) {
                state.remove(&key);
                evicted += 1;
            }
        }

        let report = SweepReport {
            expired: expired.len(),
            evicted,
        };
        self.stats.record_expirations(report.expired);
        self.stats.record_evictions(report.evicted);

        if report.evicted > 0 {
            info!(
                expired = report.expired,
                evicted = report.evicted,
                remaining = state.entries.len(),
                max_entries,
                "Cache sweep evicted entries over the bound"
            );
        } else {
            debug!(
                expired = report.expired,
                remaining = state.entries.len(),
                "Cache sweep finished"
            );
        }

        report
    }

    /// Clone of the entry for `key`, valid or not.
    pub fn entry(&self, key: &CacheKey) -> Option<CacheEntry> {
        rw_read(&self.state, SOURCE, "entry").entries.get(key).cloned()
    }

    /// Keys currently held, in key order.
    pub fn keys(&self) -> Vec<CacheKey> {
        let state = rw_read(&self.state, SOURCE, "keys");
        let mut keys: Vec<CacheKey> = state.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        rw_read(&self.state, SOURCE, "len").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries.get()
    }
}
