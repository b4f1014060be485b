#![allow(clippy::type_complexity)]
pub mod cache;
pub mod matcher;
pub mod provider;
pub mod rate_limit;
pub mod remote;
pub mod tmdb;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("provider error: {0}")]
    Provider(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("db error: {0}")]
    Db(#[from] sqlx::Error),
}

/// One raw search hit from the remote provider, as returned (not yet in the catalog).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProviderTitle {
    pub external_id: i64,
    pub title: String,
    pub original_title: Option<String>,
    /// Release date (movies) or first air date (shows), `YYYY-MM-DD` when present.
    pub release_date: Option<String>,
    pub popularity: Option<f64>,
    pub adult: bool,
}

impl ProviderTitle {
    /// Year from the first four characters of the date; `None` when malformed.
    pub fn year(&self) -> Option<i32> {
        self.release_date
            .as_deref()
            .and_then(|d| d.get(..4))
            .and_then(|y| y.parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(date: Option<&str>) -> ProviderTitle {
        ProviderTitle {
            external_id: 1,
            title: "x".into(),
            original_title: None,
            release_date: date.map(String::from),
            popularity: None,
            adult: false,
        }
    }

    #[test]
    fn year_comes_from_date_prefix() {
        assert_eq!(hit(Some("1999-03-31")).year(), Some(1999));
        assert_eq!(hit(Some("2010")).year(), Some(2010));
        assert_eq!(hit(Some("")).year(), None);
        assert_eq!(hit(Some("19")).year(), None);
        assert_eq!(hit(Some("n/a-01-01")).year(), None);
        assert_eq!(hit(None).year(), None);
    }
}
