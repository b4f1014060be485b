//! Candidate matching for one extracted title.
//!
//! 1. Exact, case-insensitive title lookup in the local catalog (optionally
//!    pinned to a year), most popular first.
//! 2. Only when the catalog has nothing: remote search, with every hit
//!    upserted into the catalog so the next lookup is local.
//! 3. More than one candidate marks all of them ambiguous.

use showbuff_core::types::{MatchMethod, MediaKind};
use showbuff_db::repo::catalog::{self, CatalogUpsert};
use sqlx::SqlitePool;
use tracing::debug;

use crate::MetadataError;
use crate::remote::RemoteMetadataClient;

pub const LOCAL_EXACT_CONFIDENCE: f64 = 0.95;
pub const REMOTE_TOP_CONFIDENCE: f64 = 0.9;
pub const REMOTE_OTHER_CONFIDENCE: f64 = 0.75;

const LOCAL_LIMIT_PER_KIND: i64 = 5;
const REMOTE_LIMIT_PER_KIND: usize = 3;

/// A proposed catalog entry for an extracted title, not yet persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateMatch {
    pub kind: MediaKind,
    pub external_id: i64,
    pub local_id: i64,
    pub confidence: f64,
    pub method: MatchMethod,
    pub is_ambiguous: bool,
}

/// Find candidate matches for a normalized title and optional year.
pub async fn find_matches(
    pool: &SqlitePool,
    remote: &RemoteMetadataClient,
    title: Option<&str>,
    year: Option<i32>,
) -> Result<Vec<CandidateMatch>, MetadataError> {
    let title = title.unwrap_or("").trim();
    if title.is_empty() {
        return Ok(Vec::new());
    }

    let mut matches = match_local(pool, title, year).await?;
    if matches.is_empty() {
        matches = match_remote(pool, remote, title, year).await?;
    }

    if matches.len() > 1 {
        for m in &mut matches {
            m.is_ambiguous = true;
        }
    }

    debug!(title, ?year, matches = matches.len(), "matched title");
    Ok(matches)
}

async fn match_local(
    pool: &SqlitePool,
    title: &str,
    year: Option<i32>,
) -> Result<Vec<CandidateMatch>, MetadataError> {
    let mut matches = Vec::new();
    for kind in MediaKind::ALL {
        let rows = catalog::find_by_title(
            pool,
            kind.as_str(),
            title,
            year.map(i64::from),
            LOCAL_LIMIT_PER_KIND,
        )
        .await?;

        matches.extend(rows.into_iter().map(|row| CandidateMatch {
            kind,
            external_id: row.external_id,
            local_id: row.id,
            confidence: LOCAL_EXACT_CONFIDENCE,
            method: MatchMethod::LocalExact,
            is_ambiguous: false,
        }));
    }
    Ok(matches)
}

async fn match_remote(
    pool: &SqlitePool,
    remote: &RemoteMetadataClient,
    title: &str,
    year: Option<i32>,
) -> Result<Vec<CandidateMatch>, MetadataError> {
    let mut matches = Vec::new();
    for kind in MediaKind::ALL {
        let results = remote.search(kind, title, year).await;

        for (rank, hit) in results.iter().take(REMOTE_LIMIT_PER_KIND).enumerate() {
            let local_id = catalog::upsert(
                pool,
                &CatalogUpsert {
                    kind: kind.as_str(),
                    external_id: hit.external_id,
                    title: &hit.title,
                    original_title: hit.original_title.as_deref(),
                    year: hit.year().map(i64::from),
                    popularity: hit.popularity,
                    adult: hit.adult,
                },
            )
            .await?;

            matches.push(CandidateMatch {
                kind,
                external_id: hit.external_id,
                local_id,
                confidence: if rank == 0 {
                    REMOTE_TOP_CONFIDENCE
                } else {
                    REMOTE_OTHER_CONFIDENCE
                },
                method: MatchMethod::TmdbSearch,
                is_ambiguous: false,
            });
        }
    }
    Ok(matches)
}
