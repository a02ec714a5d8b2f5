//! Optimizer configuration.
//!
//! Controls the query store bound, the sweep cadence, and the coalescing
//! window via the `[cache]` section of `vitrine.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

const DEFAULT_MAX_ENTRIES: usize = 1000;
const DEFAULT_SWEEP_INTERVAL: usize = 100;
const DEFAULT_COALESCE_WINDOW_MS: u64 = 5;

/// Optimizer configuration.
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Hard upper bound on cached entries.
    pub max_entries: usize,
    /// A sweep runs whenever the store size is a multiple of this value.
    pub sweep_interval: usize,
    /// Delay between the first batched request and the flush.
    pub coalesce_window_ms: u64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            coalesce_window_ms: DEFAULT_COALESCE_WINDOW_MS,
        }
    }
}

impl From<&crate::config::CacheSettings> for OptimizerConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            max_entries: settings.max_entries.get(),
            sweep_interval: settings.sweep_interval.get(),
            coalesce_window_ms: settings.coalesce_window.as_millis() as u64,
        }
    }
}

impl OptimizerConfig {
    /// Returns the entry bound as NonZeroUsize, clamping to 1 if zero.
    pub fn max_entries_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_entries).unwrap_or(NonZeroUsize::MIN)
    }

    /// Returns the sweep interval as NonZeroUsize, clamping to 1 if zero.
    pub fn sweep_interval_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.sweep_interval).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn coalesce_window(&self) -> Duration {
        Duration::from_millis(self.coalesce_window_ms)
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn with_sweep_interval(mut self, sweep_interval: usize) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }

    pub fn with_coalesce_window(mut self, window: Duration) -> Self {
        self.coalesce_window_ms = window.as_millis() as u64;
        self
    }
}
