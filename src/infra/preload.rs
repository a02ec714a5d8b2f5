//! Best-effort asset prefetching.
//!
//! Preloading never fails from the caller's point of view: every fetch error
//! is logged and counted, never returned.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::future::join_all;
use futures::stream;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use super::error::InfraError;

const LOW_PRIORITY_CONCURRENCY: usize = 2;
const PRELOAD_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PreloadPriority {
    /// Fetched all at once.
    High,
    /// Fetched a few at a time.
    Low,
}

/// Outcome of one preload call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PreloadReport {
    pub requested: usize,
    pub fetched: usize,
    pub failed: usize,
}

#[async_trait]
pub trait AssetPreloader: Send + Sync {
    async fn preload(&self, urls: &[String], priority: PreloadPriority) -> PreloadReport;
}

/// Preloader that does nothing; used when no preloading is wanted.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPreloader;

#[async_trait]
impl AssetPreloader for NoopPreloader {
    async fn preload(&self, urls: &[String], _priority: PreloadPriority) -> PreloadReport {
        PreloadReport {
            requested: urls.len(),
            ..PreloadReport::default()
        }
    }
}

/// Issues GET requests for each asset and drains the body.
#[derive(Debug, Clone)]
pub struct HttpPreloader {
    client: Client,
}

impl HttpPreloader {
    pub fn new() -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(concat!("vitrine-preload/", env!("CARGO_PKG_VERSION")))
            .timeout(PRELOAD_TIMEOUT)
            .build()
            .map_err(|err| InfraError::http(err.to_string()))?;
        Ok(Self { client })
    }

    async fn fetch(&self, url: &str) -> bool {
        let result = async {
            self.client
                .get(url)
                .send()
                .await?
                .error_for_status()?
                .bytes()
                .await
        }
        .await;

        match result {
            Ok(body) => {
                debug!(url, bytes = body.len(), "Asset preloaded");
                true
            }
            Err(error) => {
                warn!(url, error = %error, "Asset preload failed");
                false
            }
        }
    }
}

#[async_trait]
impl AssetPreloader for HttpPreloader {
    async fn preload(&self, urls: &[String], priority: PreloadPriority) -> PreloadReport {
        let outcomes: Vec<bool> = match priority {
            PreloadPriority::High => join_all(urls.iter().map(|url| self.fetch(url))).await,
            PreloadPriority::Low => {
                let fetches: Vec<_> = urls.iter().map(|url| Box::pin(self.fetch(url))).collect();
                stream::iter(fetches)
                    .buffer_unordered(LOW_PRIORITY_CONCURRENCY)
                    .collect()
                    .await
            }
        };

        let fetched = outcomes.iter().filter(|ok| **ok).count();
        PreloadReport {
            requested: urls.len(),
            fetched,
            failed: urls.len() - fetched,
        }
    }
}

#[cfg(test)]
mod tests {
    use httpmock::MockServer;

    use super::*;

    #[tokio::test]
    async fn failures_are_counted_not_returned() {
        let server = MockServer::start_async().await;
        let ok = server
            .mock_async(|when, then| {
                when.method("GET").path("/hero.mp4");
                then.status(200).body("video");
            })
            .await;
        let missing = server
            .mock_async(|when, then| {
                when.method("GET").path("/gone.mp4");
                then.status(404);
            })
            .await;

        let preloader = HttpPreloader::new().expect("preloader");
        let urls = vec![server.url("/hero.mp4"), server.url("/gone.mp4")];

        for priority in [PreloadPriority::High, PreloadPriority::Low] {
            let report = preloader.preload(&urls, priority).await;
            assert_eq!(
                report,
                PreloadReport {
                    requested: 2,
                    fetched: 1,
                    failed: 1,
                }
            );
        }

        ok.assert_calls_async(2).await;
        missing.assert_calls_async(2).await;
    }

    #[tokio::test]
    async fn noop_preloader_fetches_nothing() {
        let report = NoopPreloader
            .preload(&["http://cdn.example/a.mp4".to_string()], PreloadPriority::Low)
            .await;
        assert_eq!(report.requested, 1);
        assert_eq!(report.fetched, 0);
    }
}
