//! Cache-aside, rate-limited access to the remote title search provider.

use std::sync::Arc;

use showbuff_core::types::MediaKind;
use tracing::{debug, warn};

use crate::ProviderTitle;
use crate::cache::{SearchCache, SearchKey};
use crate::provider::TitleSearchProvider;
use crate::rate_limit::SearchRateLimiter;

/// Process-wide handle to the remote provider.
///
/// Built once at startup and shared by reference. Without a provider (no
/// API key configured) every search answers with an empty list.
pub struct RemoteMetadataClient {
    provider: Option<Arc<dyn TitleSearchProvider>>,
    cache: SearchCache,
    limiter: SearchRateLimiter,
}

impl RemoteMetadataClient {
    pub fn new(provider: Option<Arc<dyn TitleSearchProvider>>) -> Self {
        Self::with_parts(provider, SearchCache::default(), SearchRateLimiter::default())
    }

    pub fn with_parts(
        provider: Option<Arc<dyn TitleSearchProvider>>,
        cache: SearchCache,
        limiter: SearchRateLimiter,
    ) -> Self {
        Self {
            provider,
            cache,
            limiter,
        }
    }

    /// A client with no provider behind it.
    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    /// Search one kind. Provider failures are logged and yield no results.
    pub async fn search(
        &self,
        kind: MediaKind,
        title: &str,
        year: Option<i32>,
    ) -> Vec<ProviderTitle> {
        let Some(provider) = &self.provider else {
            debug!(%kind, "remote provider not configured");
            return Vec::new();
        };

        let title = title.trim();
        if title.is_empty() {
            return Vec::new();
        }

        let key = SearchKey::new(kind, title, year);
        if let Some(cached) = self.cache.get(&key).await {
            debug!(key = %key, results = cached.len(), "search cache hit");
            return cached;
        }

        self.limiter.throttle(kind.as_str()).await;

        let result = match kind {
            MediaKind::Movie => provider.search_movie(title, year).await,
            MediaKind::Tv => provider.search_series(title, year).await,
        };

        match result {
            Ok(results) => {
                debug!(provider = provider.name(), key = %key, results = results.len(), "remote search");
                self.cache.put(key, results.clone()).await;
                results
            }
            Err(e) => {
                warn!(provider = provider.name(), key = %key, error = %e, "remote search failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::MetadataError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider stub that answers from fixed lists and counts calls.
    #[derive(Default)]
    pub(crate) struct FakeProvider {
        pub movies: Vec<ProviderTitle>,
        pub shows: Vec<ProviderTitle>,
        pub fail: bool,
        pub calls: AtomicUsize,
    }

    impl FakeProvider {
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn answer(&self, list: &[ProviderTitle]) -> Result<Vec<ProviderTitle>, MetadataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(MetadataError::Provider("TMDB returned 401 Unauthorized".into()));
            }
            Ok(list.to_vec())
        }
    }

    #[async_trait::async_trait]
    impl TitleSearchProvider for FakeProvider {
        fn name(&self) -> &str {
            "fake"
        }

        async fn search_movie(
            &self,
            _title: &str,
            _year: Option<i32>,
        ) -> Result<Vec<ProviderTitle>, MetadataError> {
            self.answer(&self.movies)
        }

        async fn search_series(
            &self,
            _title: &str,
            _year: Option<i32>,
        ) -> Result<Vec<ProviderTitle>, MetadataError> {
            self.answer(&self.shows)
        }
    }

    pub(crate) fn hit(external_id: i64, title: &str, date: Option<&str>) -> ProviderTitle {
        ProviderTitle {
            external_id,
            title: title.to_string(),
            original_title: Some(title.to_string()),
            release_date: date.map(String::from),
            popularity: Some(10.0),
            adult: false,
        }
    }

    #[tokio::test]
    async fn repeated_search_is_served_from_cache() {
        let provider = Arc::new(FakeProvider {
            movies: vec![hit(603, "The Matrix", Some("1999-03-30"))],
            ..Default::default()
        });
        let client = RemoteMetadataClient::new(Some(provider.clone()));

        let first = client.search(MediaKind::Movie, "The Matrix", Some(1999)).await;
        let second = client.search(MediaKind::Movie, "the matrix ", Some(1999)).await;
        assert_eq!(first, second);
        assert_eq!(provider.calls(), 1);

        // Different year is a different key.
        client.search(MediaKind::Movie, "The Matrix", None).await;
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn kinds_are_cached_separately() {
        let provider = Arc::new(FakeProvider::default());
        let client = RemoteMetadataClient::new(Some(provider.clone()));

        client.search(MediaKind::Movie, "Fargo", None).await;
        client.search(MediaKind::Tv, "Fargo", None).await;
        client.search(MediaKind::Tv, "Fargo", None).await;
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn provider_failure_yields_empty_and_is_not_cached() {
        let provider = Arc::new(FakeProvider {
            fail: true,
            ..Default::default()
        });
        let client = RemoteMetadataClient::new(Some(provider.clone()));

        assert!(client.search(MediaKind::Movie, "Heat", None).await.is_empty());
        assert!(client.search(MediaKind::Movie, "Heat", None).await.is_empty());
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn unconfigured_client_returns_nothing() {
        let client = RemoteMetadataClient::disabled();
        assert!(!client.is_configured());
        assert!(client.search(MediaKind::Movie, "Heat", None).await.is_empty());
    }

    #[tokio::test]
    async fn blank_title_skips_provider() {
        let provider = Arc::new(FakeProvider::default());
        let client = RemoteMetadataClient::new(Some(provider.clone()));
        assert!(client.search(MediaKind::Movie, "   ", None).await.is_empty());
        assert_eq!(provider.calls(), 0);
    }
}
