use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::cache::{
    METRIC_BATCH_FLUSH, METRIC_BATCH_SIZE, METRIC_CACHE_ENTRIES, METRIC_CACHE_EVICT,
    METRIC_CACHE_EXPIRE, METRIC_CACHE_HIT, METRIC_CACHE_MISS, METRIC_DISPATCH, METRIC_DISPATCH_MS,
    METRIC_FAILURE,
};
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_CACHE_HIT,
            Unit::Count,
            "Total number of query cache hits."
        );
        describe_counter!(
            METRIC_CACHE_MISS,
            Unit::Count,
            "Total number of query cache misses."
        );
        describe_counter!(
            METRIC_CACHE_EVICT,
            Unit::Count,
            "Total number of query cache evictions due to capacity."
        );
        describe_counter!(
            METRIC_CACHE_EXPIRE,
            Unit::Count,
            "Total number of query cache entries removed after their TTL."
        );
        describe_gauge!(
            METRIC_CACHE_ENTRIES,
            Unit::Count,
            "Current number of entries in the query cache."
        );
        describe_counter!(
            METRIC_DISPATCH,
            Unit::Count,
            "Total number of transport dispatches, labelled by path."
        );
        describe_counter!(
            METRIC_FAILURE,
            Unit::Count,
            "Total number of failed queries, labelled by kind."
        );
        describe_counter!(
            METRIC_BATCH_FLUSH,
            Unit::Count,
            "Total number of coalesced batches flushed."
        );
        describe_histogram!(
            METRIC_BATCH_SIZE,
            Unit::Count,
            "Number of requests per flushed batch."
        );
        describe_histogram!(
            METRIC_DISPATCH_MS,
            Unit::Milliseconds,
            "Transport dispatch latency in milliseconds."
        );
    });
}
