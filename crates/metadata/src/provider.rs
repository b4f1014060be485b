use crate::{MetadataError, ProviderTitle};

/// A remote title search backend.
#[async_trait::async_trait]
pub trait TitleSearchProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Search for a movie by title and optional release year.
    async fn search_movie(
        &self,
        title: &str,
        year: Option<i32>,
    ) -> Result<Vec<ProviderTitle>, MetadataError>;

    /// Search for a TV series by title and optional first-air year.
    async fn search_series(
        &self,
        title: &str,
        year: Option<i32>,
    ) -> Result<Vec<ProviderTitle>, MetadataError>;
}
