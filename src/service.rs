//! The outward-facing ingestion operations: cached single fetches and warm-up.
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::cache::CacheStore;
use crate::feed::{FeedError, FeedFetcher, UnifiedItem};

/// Serves feed requests from the cache, fetching on a miss or expiry.
///
/// The cache is created by the caller and shared, so several services (or a
/// service and an inspector) can observe the same store.
#[derive(Debug)]
pub struct IngestionService {
    fetcher: FeedFetcher,
    cache: Arc<CacheStore>,
}

impl IngestionService {
    pub fn new(fetcher: FeedFetcher, cache: Arc<CacheStore>) -> Self {
        Self { fetcher, cache }
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// Returns the items for `url`, from cache when fresh.
    ///
    /// On a miss or an expired entry the feed is fetched and, on success,
    /// written through to the cache. Failures are returned as-is; a stale entry
    /// is neither served nor removed.
    ///
    /// # Errors
    ///
    /// [`FeedError::InvalidInput`] for a blank `url`, otherwise whatever
    /// [`FeedFetcher::fetch`] reports.
    pub async fn fetch_one(&self, url: &str) -> Result<Arc<[UnifiedItem]>, FeedError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(FeedError::InvalidInput);
        }

        if let Some(entry) = self.cache.get_fresh(url, Utc::now()) {
            tracing::debug!(url = %url, items = entry.items.len(), "Serving feed from cache");
            return Ok(entry.items);
        }

        let items: Arc<[UnifiedItem]> = self.fetcher.fetch(url).await?.into();
        self.cache.put(url, Arc::clone(&items), Utc::now());
        Ok(items)
    }

    /// Pre-populates the cache for `urls`, one after another.
    ///
    /// Blank entries are skipped, fresh entries are left alone, and a failing
    /// URL is logged and skipped without affecting the rest of the batch.
    pub async fn warm_batch<I, S>(&self, urls: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut warmed = 0usize;
        let mut failed = 0usize;

        for url in urls {
            let url = url.as_ref().trim();
            if url.is_empty() {
                continue;
            }
            if self.cache.get_fresh(url, Utc::now()).is_some() {
                continue;
            }

            match self.fetcher.fetch(url).await {
                Ok(items) => {
                    if self.cache.put(url, items, Utc::now()) {
                        warmed += 1;
                    }
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!(url = %url, error = %e, "Feed warm-up failed");
                }
            }
        }

        tracing::info!(warmed = warmed, failed = failed, "Feed warm-up finished");
    }

    /// Runs [`IngestionService::warm_batch`] over `urls` now and then every `every`.
    ///
    /// The task runs until aborted through the returned handle.
    pub fn spawn_warmup(self: Arc<Self>, urls: Vec<String>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.warm_batch(&urls).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{FetchError, FetchOptions};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALID_RSS: &str = r#"<rss version="2.0"><channel>
        <item><title>Cached</title><link>https://example.com/1</link></item>
    </channel></rss>"#;

    fn service() -> IngestionService {
        let fetcher = FeedFetcher::new(FetchOptions::default(), None).unwrap();
        IngestionService::new(fetcher, Arc::new(CacheStore::default()))
    }

    #[tokio::test]
    async fn test_second_fetch_served_from_cache() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS))
            .expect(1) // The second call must not reach the network
            .mount(&mock_server)
            .await;

        let service = service();
        let url = format!("{}/feed", mock_server.uri());
        let first = service.fetch_one(&url).await.unwrap();
        let second = service.fetch_one(&format!("  {url}  ")).await.unwrap();

        assert_eq!(first[0].title, "Cached");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_failure_not_cached() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let service = service();
        let url = format!("{}/feed", mock_server.uri());
        let result = service.fetch_one(&url).await;
        assert!(matches!(
            result,
            Err(FeedError::Fetch(FetchError::HttpStatus(500)))
        ));
        assert!(service.cache().get(&url).is_none());
    }

    #[tokio::test]
    async fn test_stale_entry_not_served_on_failure() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&mock_server)
            .await;

        let service = service();
        let url = format!("{}/feed", mock_server.uri());
        let stale_item = UnifiedItem {
            title: "old".into(),
            link: String::new(),
            published_at: String::new(),
            snippet: String::new(),
        };
        // Written seven hours ago, so already expired
        service.cache().put(
            &url,
            vec![stale_item],
            Utc::now() - chrono::Duration::hours(7),
        );

        assert!(service.fetch_one(&url).await.is_err());
        // The stale entry is still there, untouched
        assert_eq!(service.cache().get(&url).unwrap().items[0].title, "old");
    }

    #[tokio::test]
    async fn test_blank_url_rejected() {
        assert!(matches!(
            service().fetch_one(" \t ").await,
            Err(FeedError::InvalidInput)
        ));
    }

    #[tokio::test]
    async fn test_warm_batch_skips_blank_and_failing() {
        let service = service();
        service
            .warm_batch(["", "  ", "http://bad.invalid"])
            .await;
        assert!(service.cache().is_empty());
    }

    #[tokio::test]
    async fn test_warm_batch_continues_after_failure() {
        let good = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS))
            .mount(&good)
            .await;
        let bad = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&bad)
            .await;

        let service = service();
        let good_url = format!("{}/feed", good.uri());
        let bad_url = format!("{}/feed", bad.uri());
        service
            .warm_batch(vec![bad_url.clone(), format!(" {good_url} ")])
            .await;

        assert!(service.cache().get(&bad_url).is_none());
        assert!(service.cache().get(&good_url).is_some());
    }

    #[tokio::test]
    async fn test_warm_batch_leaves_fresh_entries() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS))
            .expect(1)
            .mount(&mock_server)
            .await;

        let service = service();
        let url = format!("{}/feed", mock_server.uri());
        service.warm_batch([&url]).await;
        service.warm_batch([&url]).await;
        service.fetch_one(&url).await.unwrap();
    }

    #[tokio::test]
    async fn test_spawned_warmup_populates_cache() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS))
            .mount(&mock_server)
            .await;

        let service = Arc::new(service());
        let url = format!("{}/feed", mock_server.uri());
        let handle =
            Arc::clone(&service).spawn_warmup(vec![url.clone()], Duration::from_secs(3600));

        for _ in 0..50 {
            if service.cache().get(&url).is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        handle.abort();
        assert!(service.cache().get(&url).is_some());
    }
}
