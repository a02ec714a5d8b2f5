//! Request coalescer.
//!
//! Batched cache misses are queued until the coalescing window closes, then
//! the whole queue is swapped out and every item is dispatched concurrently.
//! Each item settles on its own: one failing exchange never affects the
//! others. Items queued while a batch is in flight start the next batch.
//!
//! This is request parallelisation only; every item is still its own
//! exchange with the transport.

use std::collections::BTreeSet;
use std::mem;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::QueryError;
use super::keys::{CacheKey, QueryRequest};
use super::lock::mutex_lock;
use super::stats::{DispatchPath, StatsRecorder};
use super::store::QueryStore;
use super::transport::Transport;

const SOURCE: &str = "cache::batch";

pub(crate) type Settlement = Result<Arc<Value>, QueryError>;

/// Where a successful batched result is stored.
#[derive(Debug, Clone)]
pub(crate) struct CacheWrite {
    pub ttl: Duration,
    pub dependencies: BTreeSet<String>,
}

/// One queued request and the caller waiting on it.
struct BatchItem {
    key: CacheKey,
    request: QueryRequest,
    cache_write: Option<CacheWrite>,
    reply: oneshot::Sender<Settlement>,
}

/// Pending items plus at most one flush timer.
///
/// `timer` is `Some` exactly when `items` is non-empty. `generation` moves
/// forward every time a batch is taken, so a timer that lost a race with
/// [`Coalescer::flush_now`] finds nothing to flush.
#[derive(Default)]
struct BatchQueue {
    items: Vec<BatchItem>,
    timer: Option<JoinHandle<()>>,
    generation: u64,
}

struct Shared {
    queue: Mutex<BatchQueue>,
    window: Duration,
    transport: Arc<dyn Transport>,
    store: Arc<QueryStore>,
    stats: Arc<StatsRecorder>,
}

/// Coalesces batched requests into one concurrent dispatch per window.
pub(crate) struct Coalescer {
    shared: Arc<Shared>,
}

impl Coalescer {
    pub fn new(
        window: Duration,
        transport: Arc<dyn Transport>,
        store: Arc<QueryStore>,
        stats: Arc<StatsRecorder>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(BatchQueue::default()),
                window,
                transport,
                store,
                stats,
            }),
        }
    }

    /// Queue a request and return the channel its settlement arrives on.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn enqueue(
        &self,
        key: CacheKey,
        request: QueryRequest,
        cache_write: Option<CacheWrite>,
    ) -> oneshot::Receiver<Settlement> {
        let (reply, receiver) = oneshot::channel();
        let mut queue = mutex_lock(&self.shared.queue, SOURCE, "enqueue");

        debug!(key = %key, pending = queue.items.len() + 1, "Batched query enqueued");
        queue.items.push(BatchItem {
            key,
            request,
            cache_write,
            reply,
        });

        if queue.timer.is_none() {
            let generation = queue.generation;
            let shared = Arc::clone(&self.shared);
            queue.timer = Some(tokio::spawn(async move {
                tokio::time::sleep(shared.window).await;
                if let Some(batch) = shared.take_batch(Some(generation)) {
                    shared.dispatch(batch).await;
                }
            }));
        }

        receiver
    }

    /// Dispatch whatever is pending without waiting for the window.
    ///
    /// The batch runs on its own task, so dropping the returned future stops
    /// the wait but not the dispatch.
    pub async fn flush_now(&self) {
        let Some(batch) = self.shared.take_batch(None) else {
            return;
        };
        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move { shared.dispatch(batch).await });
        if let Err(error) = handle.await {
            warn!(error = %error, "Batch dispatch task did not complete");
        }
    }

    pub fn pending(&self) -> usize {
        mutex_lock(&self.shared.queue, SOURCE, "pending").items.len()
    }
}

impl Shared {
    /// Swap the live queue for an empty one and cancel its timer.
    fn take_batch(&self, expected_generation: Option<u64>) -> Option<Vec<BatchItem>> {
        let mut queue = mutex_lock(&self.queue, SOURCE, "take_batch");
        if expected_generation.is_some_and(|generation| generation != queue.generation) {
            return None;
        }

        queue.generation += 1;
        let timer = queue.timer.take();
        // The timer task itself calls in with its generation and must not
        // abort itself.
        if expected_generation.is_none() {
            if let Some(timer) = timer {
                timer.abort();
            }
        }

        let batch = mem::take(&mut queue.items);
        (!batch.is_empty()).then_some(batch)
    }

    async fn dispatch(&self, batch: Vec<BatchItem>) {
        let batch_id = Uuid::new_v4();
        let batch_size = batch.len();
        self.stats.record_flush(batch_size);

        if let Err(error) = self.transport.ensure_ready() {
            warn!(
                %batch_id,
                batch_size,
                error = %error,
                "Batch dispatch failed before any request was sent"
            );
            for item in batch {
                let error = QueryError::BatchDispatch(error.clone());
                self.stats.record_failure(&error);
                let _ = item.reply.send(Err(error));
            }
            return;
        }

        info!(%batch_id, batch_size, "Dispatching coalesced batch");
        join_all(batch.into_iter().map(|item| self.dispatch_item(batch_id, item))).await;
    }

    async fn dispatch_item(&self, batch_id: Uuid, item: BatchItem) {
        let BatchItem {
            key,
            request,
            cache_write,
            reply,
        } = item;

        let started_at = Instant::now();
        let result = self.transport.execute(&request).await;
        self.stats.record_dispatch(
            DispatchPath::Batched,
            started_at.elapsed().as_secs_f64() * 1000.0,
        );

        let settlement = match result {
            Ok(value) => {
                let value = Arc::new(value);
                if let Some(write) = cache_write {
                    self.store
                        .set(key.clone(), Arc::clone(&value), write.ttl, write.dependencies);
                }
                Ok(value)
            }
            Err(error) => {
                warn!(%batch_id, key = %key, error = %error, "Batched query failed");
                let error = QueryError::Transport(error);
                self.stats.record_failure(&error);
                Err(error)
            }
        };

        if reply.send(settlement).is_err() {
            debug!(%batch_id, key = %key, "Caller went away before its batched query settled");
        }
    }
}
