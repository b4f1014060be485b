use serde::{Deserialize, Serialize};

/// Catalog entry kind stored in the `catalog_entry.kind` and `title_match.media_type` columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Movie,
    Tv,
}

impl MediaKind {
    pub const ALL: [MediaKind; 2] = [Self::Movie, Self::Tv];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Tv => "tv",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "movie" => Some(Self::Movie),
            "tv" => Some(Self::Tv),
            _ => None,
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Import session lifecycle.
///
/// `pending → processing → completed`, or `failed` once the job gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ImportStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a candidate match was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    LocalExact,
    TmdbSearch,
}

impl MatchMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LocalExact => "local_exact",
            Self::TmdbSearch => "tmdb_search",
        }
    }
}

impl std::fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target user list for a confirmed match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListType {
    Watchlist,
    CurrentlyWatching,
    Watched,
}

impl ListType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Watchlist => "watchlist",
            Self::CurrentlyWatching => "currently_watching",
            Self::Watched => "watched",
        }
    }

    /// Accepts `Watchlist`, `currently-watching`, ` watched ` and so on.
    pub fn normalize(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().replace('-', "_").as_str() {
            "watchlist" => Some(Self::Watchlist),
            "currently_watching" => Some(Self::CurrentlyWatching),
            "watched" => Some(Self::Watched),
            _ => None,
        }
    }
}

impl std::fmt::Display for ListType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_type_normalization() {
        assert_eq!(ListType::normalize("watchlist"), Some(ListType::Watchlist));
        assert_eq!(
            ListType::normalize("Currently-Watching"),
            Some(ListType::CurrentlyWatching)
        );
        assert_eq!(ListType::normalize(" WATCHED "), Some(ListType::Watched));
        assert_eq!(ListType::normalize("favourites"), None);
        assert_eq!(ListType::normalize(""), None);
    }

    #[test]
    fn media_kind_round_trips_through_column_value() {
        for kind in MediaKind::ALL {
            assert_eq!(MediaKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(MediaKind::from_str("series"), None);
    }
}
