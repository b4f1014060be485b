//! TMDB (The Movie Database) search client.
//!
//! Uses TMDB API v3: https://developer.themoviedb.org/docs

use std::time::Duration;

use showbuff_core::types::MediaKind;
use tracing::debug;

use crate::provider::TitleSearchProvider;
use crate::{MetadataError, ProviderTitle};

const BASE_URL: &str = "https://api.themoviedb.org/3";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TmdbClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl TmdbClient {
    pub fn new(api_key: String) -> Result<Self, MetadataError> {
        Self::with_base_url(api_key, BASE_URL.to_string())
    }

    /// Point the client at another host (a proxy or a local stub).
    pub fn with_base_url(api_key: String, base_url: String) -> Result<Self, MetadataError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| MetadataError::Network(e.to_string()))?;

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn get_json(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<serde_json::Value, MetadataError> {
        let mut all_params = vec![("api_key", self.api_key.as_str())];
        all_params.extend_from_slice(params);

        let url = format!("{}{path}", self.base_url);
        debug!(url = %url, "TMDB request");

        let resp = self
            .client
            .get(&url)
            .query(&all_params)
            .send()
            .await
            .map_err(|e| MetadataError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(MetadataError::Provider(format!(
                "TMDB returned {}",
                resp.status()
            )));
        }

        resp.json()
            .await
            .map_err(|e| MetadataError::Provider(format!("parse JSON: {e}")))
    }

    async fn search(
        &self,
        kind: MediaKind,
        title: &str,
        year: Option<i32>,
    ) -> Result<Vec<ProviderTitle>, MetadataError> {
        let (path, year_param) = match kind {
            MediaKind::Movie => ("/search/movie", "year"),
            MediaKind::Tv => ("/search/tv", "first_air_date_year"),
        };

        let mut params = vec![("query", title)];
        let year_str = year.map(|y| y.to_string());
        if let Some(ref y) = year_str {
            params.push((year_param, y.as_str()));
        }

        let data = self.get_json(path, &params).await?;
        Ok(parse_search_results(&data, kind))
    }
}

#[async_trait::async_trait]
impl TitleSearchProvider for TmdbClient {
    fn name(&self) -> &str {
        "tmdb"
    }

    async fn search_movie(
        &self,
        title: &str,
        year: Option<i32>,
    ) -> Result<Vec<ProviderTitle>, MetadataError> {
        self.search(MediaKind::Movie, title, year).await
    }

    async fn search_series(
        &self,
        title: &str,
        year: Option<i32>,
    ) -> Result<Vec<ProviderTitle>, MetadataError> {
        self.search(MediaKind::Tv, title, year).await
    }
}

/// Map a `/search/movie` or `/search/tv` response body, keeping provider order.
/// Results without an id are dropped.
pub fn parse_search_results(data: &serde_json::Value, kind: MediaKind) -> Vec<ProviderTitle> {
    let (title_key, original_key, date_key) = match kind {
        MediaKind::Movie => ("title", "original_title", "release_date"),
        MediaKind::Tv => ("name", "original_name", "first_air_date"),
    };

    let results = data["results"].as_array().cloned().unwrap_or_default();

    results
        .iter()
        .filter_map(|r| {
            Some(ProviderTitle {
                external_id: r["id"].as_i64()?,
                title: r[title_key].as_str().unwrap_or("Unknown").to_string(),
                original_title: r[original_key].as_str().map(|s| s.to_string()),
                release_date: r[date_key]
                    .as_str()
                    .filter(|d| !d.is_empty())
                    .map(|s| s.to_string()),
                popularity: r["popularity"].as_f64(),
                adult: r["adult"].as_bool().unwrap_or(false),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_movie_search_results() {
        let json = serde_json::json!({
            "page": 1,
            "results": [
                {
                    "id": 603,
                    "title": "The Matrix",
                    "original_title": "The Matrix",
                    "release_date": "1999-03-30",
                    "popularity": 83.2,
                    "adult": false
                },
                {
                    "id": 604,
                    "title": "The Matrix Reloaded",
                    "release_date": "",
                    "adult": true
                },
                { "title": "no id" }
            ]
        });

        let results = parse_search_results(&json, MediaKind::Movie);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].external_id, 603);
        assert_eq!(results[0].title, "The Matrix");
        assert_eq!(results[0].year(), Some(1999));
        assert!((results[0].popularity.unwrap() - 83.2).abs() < 0.001);
        assert_eq!(results[1].release_date, None);
        assert_eq!(results[1].popularity, None);
        assert!(results[1].adult);
    }

    #[test]
    fn parse_tv_search_results_uses_name_fields() {
        let json = serde_json::json!({
            "results": [
                {
                    "id": 1396,
                    "name": "Breaking Bad",
                    "original_name": "Breaking Bad",
                    "first_air_date": "2008-01-20",
                    "popularity": 250.0
                }
            ]
        });

        let results = parse_search_results(&json, MediaKind::Tv);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Breaking Bad");
        assert_eq!(results[0].original_title.as_deref(), Some("Breaking Bad"));
        assert_eq!(results[0].year(), Some(2008));
        assert!(!results[0].adult);
    }

    #[test]
    fn missing_results_array_is_empty() {
        let json = serde_json::json!({ "status_message": "Invalid API key" });
        assert!(parse_search_results(&json, MediaKind::Movie).is_empty());
    }
}
