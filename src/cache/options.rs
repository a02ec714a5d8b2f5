use std::collections::BTreeSet;
use std::time::Duration;

/// Default lifetime of a cached result.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Per-call options for [`Optimizer::execute_query`](super::Optimizer::execute_query).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    /// Read from and populate the cache.
    pub cache: bool,
    /// How long a successful result stays reusable.
    pub ttl: Duration,
    /// Tags attached to the cached entry.
    pub dependencies: BTreeSet<String>,
    /// Route a cache miss through the coalescer.
    pub batch: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            cache: true,
            ttl: DEFAULT_TTL,
            dependencies: BTreeSet::new(),
            batch: false,
        }
    }
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bypass the cache entirely: no lookup and no population.
    pub fn uncached(mut self) -> Self {
        self.cache = false;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_dependency(mut self, tag: impl Into<String>) -> Self {
        self.dependencies.insert(tag.into());
        self
    }

    pub fn with_dependencies<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn batched(mut self) -> Self {
        self.batch = true;
        self
    }
}
