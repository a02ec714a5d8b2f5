use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics_util::debugging::DebuggingRecorder;
use serde_json::{Value, json};
use serial_test::serial;
use vitrine::cache::{
    METRIC_BATCH_FLUSH, METRIC_BATCH_SIZE, METRIC_CACHE_ENTRIES, METRIC_CACHE_EVICT,
    METRIC_CACHE_EXPIRE, METRIC_CACHE_HIT, METRIC_CACHE_MISS, METRIC_DISPATCH, METRIC_DISPATCH_MS,
    METRIC_FAILURE, Optimizer, OptimizerConfig, QueryOptions, QueryRequest, Transport,
    TransportError,
};

struct EchoTransport;

#[async_trait]
impl Transport for EchoTransport {
    async fn execute(&self, request: &QueryRequest) -> Result<Value, TransportError> {
        match request.variables()["id"].as_str() {
            Some("broken") => Err(TransportError::network("connection refused")),
            _ => Ok(request.variables().clone()),
        }
    }
}

const QUERY: &str = "query Node($id: ID!) { node(id: $id) { id } }";

#[tokio::test(start_paused = true)]
#[serial]
async fn optimizer_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let optimizer = Optimizer::new(
        OptimizerConfig::default().with_max_entries(1),
        Arc::new(EchoTransport),
    );
    let short = QueryOptions::new().with_ttl(Duration::from_millis(10));

    // miss + direct dispatch, then hit
    for _ in 0..2 {
        optimizer
            .execute_query(QUERY, &json!({ "id": "a" }), short.clone())
            .await
            .expect("direct");
    }

    // expiry on read
    tokio::time::advance(Duration::from_millis(20)).await;
    optimizer
        .execute_query(QUERY, &json!({ "id": "a" }), short.clone())
        .await
        .expect("refetch");

    // eviction over the bound, via the batched path
    optimizer
        .execute_query(QUERY, &json!({ "id": "b" }), QueryOptions::new().batched())
        .await
        .expect("batched");

    // failure
    optimizer
        .execute_query(QUERY, &json!({ "id": "broken" }), QueryOptions::default())
        .await
        .expect_err("failure");

    // variables that are not an object never reach the transport
    optimizer
        .execute_query(QUERY, &json!(["a"]), QueryOptions::default())
        .await
        .expect_err("key");

    let stats = optimizer.stats();
    assert_eq!(stats.expirations, 1);
    assert_eq!(stats.evictions, 1);

    assert_eq!(stats.failures, 2);

    let entries = snapshotter.snapshot().into_vec();
    let names: HashSet<String> = entries
        .iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();
    let failure_kinds: HashSet<String> = entries
        .iter()
        .filter(|(composite_key, _, _, _)| composite_key.key().name() == METRIC_FAILURE)
        .flat_map(|(composite_key, _, _, _)| composite_key.key().labels())
        .filter(|label| label.key() == "kind")
        .map(|label| label.value().to_string())
        .collect();
    assert_eq!(
        failure_kinds,
        HashSet::from(["transport".to_string(), "key".to_string()])
    );

    let expected = [
        METRIC_CACHE_HIT,
        METRIC_CACHE_MISS,
        METRIC_CACHE_EVICT,
        METRIC_CACHE_EXPIRE,
        METRIC_CACHE_ENTRIES,
        METRIC_DISPATCH,
        METRIC_FAILURE,
        METRIC_BATCH_FLUSH,
        METRIC_BATCH_SIZE,
        METRIC_DISPATCH_MS,
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
