//! Optimizer facade.
//!
//! Ties key derivation, store lookup, optional coalescing and store
//! population together behind [`Optimizer::execute_query`]. One instance is
//! meant to be shared by every consumer in the process so that their batched
//! requests coalesce with each other.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::batch::{CacheWrite, Coalescer};
use super::config::OptimizerConfig;
use super::error::{KeyError, QueryError};
use super::keys::{CacheKey, QueryRequest};
use super::options::QueryOptions;
use super::stats::{DispatchPath, OptimizerStats, StatsRecorder};
use super::store::{QueryStore, SweepReport};
use super::transport::Transport;

/// Query result cache and request coalescer.
pub struct Optimizer {
    config: OptimizerConfig,
    transport: Arc<dyn Transport>,
    store: Arc<QueryStore>,
    coalescer: Coalescer,
    stats: Arc<StatsRecorder>,
}

impl Optimizer {
    pub fn new(config: OptimizerConfig, transport: Arc<dyn Transport>) -> Self {
        let stats = Arc::new(StatsRecorder::new());
        let store = Arc::new(QueryStore::new(&config, Arc::clone(&stats)));
        let coalescer = Coalescer::new(
            config.coalesce_window(),
            Arc::clone(&transport),
            Arc::clone(&store),
            Arc::clone(&stats),
        );

        Self {
            config,
            transport,
            store,
            coalescer,
            stats,
        }
    }

    /// Execute a query, serving it from the cache when a valid entry exists.
    ///
    /// On a miss the request goes straight to the transport, or through the
    /// coalescer when `options.batch` is set. Successful results are cached
    /// under the request's key with `options.ttl` and `options.dependencies`
    /// when `options.cache` is set. Failures are returned as-is and never
    /// cached.
    pub async fn execute_query<V>(
        &self,
        query: &str,
        variables: &V,
        options: QueryOptions,
    ) -> Result<Arc<Value>, QueryError>
    where
        V: Serialize + Sync + ?Sized,
    {
        let request = QueryRequest::new(query, variables)
            .map_err(QueryError::from)
            .inspect_err(|error| {
                self.stats.record_failure(error);
                warn!(error = %error, "Rejected query with unserializable variables");
            })?;
        self.execute_request(request, options).await
    }

    /// [`execute_query`](Self::execute_query) followed by a typed read of the result.
    pub async fn execute_as<T, V>(
        &self,
        query: &str,
        variables: &V,
        options: QueryOptions,
    ) -> Result<T, QueryError>
    where
        T: DeserializeOwned,
        V: Serialize + Sync + ?Sized,
    {
        let value = self.execute_query(query, variables, options).await?;
        T::deserialize(value.as_ref()).map_err(|err| QueryError::Decode(err.to_string()))
    }

    #[instrument(
        skip_all,
        fields(operation = request.operation_name().unwrap_or("anonymous"), batch = options.batch)
    )]
    pub async fn execute_request(
        &self,
        request: QueryRequest,
        options: QueryOptions,
    ) -> Result<Arc<Value>, QueryError> {
        let key = request.cache_key();

        if options.cache {
            if let Some(value) = self.store.get(&key) {
                self.stats.record_hit();
                debug!(key = %key, "Query cache hit");
                return Ok(value);
            }
            self.stats.record_miss();
            debug!(key = %key, "Query cache miss");
        }

        let QueryOptions {
            cache,
            ttl,
            dependencies,
            batch,
        } = options;

        if batch {
            let cache_write = cache.then_some(CacheWrite { ttl, dependencies });
            return self
                .coalescer
                .enqueue(key, request, cache_write)
                .await
                .unwrap_or(Err(QueryError::Abandoned));
        }

        let started_at = Instant::now();
        let result = self.transport.execute(&request).await;
        self.stats.record_dispatch(
            DispatchPath::Direct,
            started_at.elapsed().as_secs_f64() * 1000.0,
        );

        match result {
            Ok(value) => {
                let value = Arc::new(value);
                if cache {
                    self.store.set(key, Arc::clone(&value), ttl, dependencies);
                }
                Ok(value)
            }
            Err(error) => {
                let error = QueryError::from(error);
                self.stats.record_failure(&error);
                warn!(key = %key, error = %error, "Query failed");
                Err(error)
            }
        }
    }

    /// Drop every cached result tagged with `tag`.
    ///
    /// Synchronous: once this returns no later lookup can observe a removed
    /// entry.
    pub fn invalidate_by_dependency(&self, tag: &str) -> usize {
        let removed = self.store.invalidate_by_dependency(tag);
        info!(dependency = tag, removed, "Invalidated cache entries by dependency");
        removed
    }

    /// Drop the cached result for exactly this `(query, variables)` pair.
    pub fn invalidate_query<V>(&self, query: &str, variables: &V) -> Result<bool, KeyError>
    where
        V: Serialize + ?Sized,
    {
        let key = QueryRequest::new(query, variables)?.cache_key();
        Ok(self.invalidate_key(&key))
    }

    pub fn invalidate_key(&self, key: &CacheKey) -> bool {
        let removed = self.store.invalidate(key);
        debug!(key = %key, removed, "Invalidated cache entry");
        removed
    }

    pub fn clear(&self) {
        self.store.clear();
        info!("Query cache cleared");
    }

    /// Dispatch the pending batch without waiting for the coalescing window.
    pub async fn flush_now(&self) {
        self.coalescer.flush_now().await;
    }

    pub fn sweep(&self) -> SweepReport {
        self.store.sweep()
    }

    pub fn stats(&self) -> OptimizerStats {
        self.stats
            .snapshot(self.store.len(), self.coalescer.pending())
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    pub fn cached_keys(&self) -> Vec<CacheKey> {
        self.store.keys()
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::cache::error::TransportError;

    /// Answers with the request variables; fails for ids listed in `failing`.
    #[derive(Default)]
    struct ScriptedTransport {
        calls: AtomicUsize,
        failing: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn fail_for(&self, id: &str) {
            self.failing.lock().expect("failing lock").push(id.to_string());
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn execute(&self, request: &QueryRequest) -> Result<Value, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let id = request.variables()["id"].as_str().unwrap_or_default().to_string();
            if self.failing.lock().expect("failing lock").contains(&id) {
                return Err(TransportError::Status {
                    status: 502,
                    body: format!("upstream failed for {id}"),
                });
            }
            Ok(json!({ "id": id }))
        }
    }

    const QUERY: &str = "query Node($id: ID!) { node(id: $id) { id } }";

    fn optimizer() -> (Optimizer, Arc<ScriptedTransport>) {
        let transport = Arc::new(ScriptedTransport::default());
        let optimizer = Optimizer::new(OptimizerConfig::default(), transport.clone());
        (optimizer, transport)
    }

    #[tokio::test]
    async fn hit_does_not_touch_the_transport() {
        let (optimizer, transport) = optimizer();

        let first = optimizer
            .execute_query(QUERY, &json!({ "id": "a" }), QueryOptions::default())
            .await
            .expect("first");
        let second = optimizer
            .execute_query(QUERY, &json!({ "id": "a" }), QueryOptions::default())
            .await
            .expect("second");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(transport.calls(), 1);
        let stats = optimizer.stats();
        assert_eq!((stats.hits, stats.misses, stats.direct_dispatches), (1, 1, 1));
    }

    #[tokio::test]
    async fn uncached_queries_always_dispatch_and_never_store() {
        let (optimizer, transport) = optimizer();

        for _ in 0..2 {
            optimizer
                .execute_query(QUERY, &json!({ "id": "a" }), QueryOptions::new().uncached())
                .await
                .expect("query");
        }

        assert_eq!(transport.calls(), 2);
        assert!(optimizer.cached_keys().is_empty());
    }

    #[tokio::test]
    async fn failures_are_propagated_and_not_cached() {
        let (optimizer, transport) = optimizer();
        transport.fail_for("broken");

        for _ in 0..2 {
            let error = optimizer
                .execute_query(QUERY, &json!({ "id": "broken" }), QueryOptions::default())
                .await
                .expect_err("failure");
            assert!(matches!(
                error,
                QueryError::Transport(TransportError::Status { status: 502, .. })
            ));
        }

        assert_eq!(transport.calls(), 2);
        assert_eq!(optimizer.stats().entries, 0);
        assert_eq!(optimizer.stats().failures, 2);
    }

    #[tokio::test]
    async fn key_errors_surface_before_any_dispatch() {
        let (optimizer, transport) = optimizer();

        let error = optimizer
            .execute_query(QUERY, &json!("not an object"), QueryOptions::default())
            .await
            .expect_err("key error");

        assert!(matches!(error, QueryError::Key(_)));
        assert_eq!(transport.calls(), 0);
        assert!(optimizer.cached_keys().is_empty());
    }

    #[tokio::test]
    async fn invalidate_query_drops_only_that_entry() {
        let (optimizer, transport) = optimizer();
        for id in ["a", "b"] {
            optimizer
                .execute_query(QUERY, &json!({ "id": id }), QueryOptions::default())
                .await
                .expect("query");
        }

        assert!(optimizer.invalidate_query(QUERY, &json!({ "id": "a" })).expect("key"));
        assert_eq!(optimizer.cached_keys().len(), 1);

        optimizer
            .execute_query(QUERY, &json!({ "id": "b" }), QueryOptions::default())
            .await
            .expect("still cached");
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn execute_as_decodes_typed_results() {
        #[derive(Debug, Deserialize)]
        struct Node {
            id: String,
        }

        let (optimizer, _) = optimizer();
        let node: Node = optimizer
            .execute_as(QUERY, &json!({ "id": "typed" }), QueryOptions::default())
            .await
            .expect("typed");
        assert_eq!(node.id, "typed");

        let error = optimizer
            .execute_as::<Vec<u8>, _>(QUERY, &json!({ "id": "typed" }), QueryOptions::default())
            .await
            .expect_err("shape mismatch");
        assert!(matches!(error, QueryError::Decode(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn batched_hits_skip_the_coalescer() {
        let (optimizer, transport) = optimizer();
        let options = QueryOptions::new().batched();

        optimizer
            .execute_query(QUERY, &json!({ "id": "a" }), options.clone())
            .await
            .expect("first");
        optimizer
            .execute_query(QUERY, &json!({ "id": "a" }), options)
            .await
            .expect("second");

        assert_eq!(transport.calls(), 1);
        assert_eq!(optimizer.stats().batches_flushed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_now_settles_pending_batch() {
        let (optimizer, transport) = optimizer();
        let optimizer = Arc::new(optimizer);

        let pending = {
            let optimizer = Arc::clone(&optimizer);
            tokio::spawn(async move {
                optimizer
                    .execute_query(QUERY, &json!({ "id": "a" }), QueryOptions::new().batched())
                    .await
            })
        };
        tokio::task::yield_now().await;
        assert_eq!(optimizer.stats().pending_batch_items, 1);

        optimizer.flush_now().await;
        pending.await.expect("join").expect("settled");
        assert_eq!(transport.calls(), 1);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(optimizer.stats().batches_flushed, 1);
    }
}
