//! Vitrine query optimizer
//!
//! Sits between UI-facing services and the GraphQL transport:
//!
//! - **Store**: bounded, TTL-validated results with dependency tags and
//!   creation-order eviction
//! - **Coalescer**: batches same-window cache misses into one concurrent
//!   dispatch with per-request settlement
//! - **Facade**: [`Optimizer::execute_query`] plus invalidation and
//!   introspection
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! max_entries = 1000
//! sweep_interval = 100
//! coalesce_window_ms = 5
//! ```

mod batch;
mod config;
mod error;
mod keys;
mod lock;
mod optimizer;
mod options;
mod registry;
mod stats;
mod store;
mod transport;

pub use config::OptimizerConfig;
pub use error::{KeyError, QueryError, TransportError};
pub use keys::{CacheKey, QueryRequest, normalize_query};
pub use optimizer::Optimizer;
pub use options::{DEFAULT_TTL, QueryOptions};
pub use registry::DependencyIndex;
pub use stats::{
    METRIC_BATCH_FLUSH, METRIC_BATCH_SIZE, METRIC_CACHE_ENTRIES, METRIC_CACHE_EVICT,
    METRIC_CACHE_EXPIRE, METRIC_CACHE_HIT, METRIC_CACHE_MISS, METRIC_DISPATCH,
    METRIC_DISPATCH_MS, METRIC_FAILURE, OptimizerStats, StatsRecorder,
};
pub use store::{QueryStore, SweepReport};
pub use transport::Transport;
