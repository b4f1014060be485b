use std::collections::HashMap;
use std::time::{Duration, Instant};

use showbuff_core::types::MediaKind;
use tokio::sync::Mutex;

use crate::ProviderTitle;

/// How long a provider answer stays fresh.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Cache key: kind, lowercased title and the year (`*` when absent).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchKey {
    pub kind: MediaKind,
    pub title: String,
    pub year: String,
}

impl SearchKey {
    pub fn new(kind: MediaKind, title: &str, year: Option<i32>) -> Self {
        Self {
            kind,
            title: title.trim().to_lowercase(),
            year: year.map(|y| y.to_string()).unwrap_or_else(|| "*".to_string()),
        }
    }
}

impl std::fmt::Display for SearchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:title={},year={}", self.kind, self.title, self.year)
    }
}

/// In-process cache of remote search results with a fixed time-to-live.
pub struct SearchCache {
    ttl: Duration,
    entries: Mutex<HashMap<SearchKey, (Instant, Vec<ProviderTitle>)>>,
}

impl SearchCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, key: &SearchKey) -> Option<Vec<ProviderTitle>> {
        let mut entries = self.entries.lock().await;
        let (stored_at, results) = entries.get(key)?;
        if stored_at.elapsed() < self.ttl {
            return Some(results.clone());
        }
        entries.remove(key);
        None
    }

    pub async fn put(&self, key: SearchKey, results: Vec<ProviderTitle>) {
        let mut entries = self.entries.lock().await;
        let ttl = self.ttl;
        entries.retain(|_, (stored_at, _)| stored_at.elapsed() < ttl);
        entries.insert(key, (Instant::now(), results));
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

impl Default for SearchCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
