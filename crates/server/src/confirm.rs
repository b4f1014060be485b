//! Validation of user-selected matches for an import.
//!
//! Nothing is written here; the caller gets back which choices point at a
//! real title/match pair of the session and which do not.

use serde::{Deserialize, Serialize};
use showbuff_core::types::ListType;
use showbuff_db::repo::{extracted_titles, title_matches};
use sqlx::SqlitePool;

pub const REASON_MISSING_FIELDS: &str = "missing fields";
pub const REASON_MISMATCHED_IDS: &str = "mismatched ids";
pub const REASON_INVALID_LIST_TYPE: &str = "invalid listType";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    pub import_id: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChoiceInput>,
}

/// One choice as sent by the client; every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceInput {
    pub extracted_title_id: Option<i64>,
    pub match_id: Option<i64>,
    pub list_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedChoice {
    pub extracted_title_id: i64,
    pub match_id: i64,
    pub list_type: ListType,
    pub media_type: String,
    pub tmdb_id: Option<i64>,
    pub local_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvalidChoice {
    pub choice: ChoiceInput,
    pub reason: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmResponse {
    pub import_id: String,
    pub validated: Vec<ValidatedChoice>,
    pub invalid: Vec<InvalidChoice>,
}

/// Split `choices` into validated and invalid ones, preserving input order
/// within each list. `import_id` must already be known to exist.
pub async fn validate_choices(
    pool: &SqlitePool,
    import_id: &str,
    choices: Vec<ChoiceInput>,
) -> Result<ConfirmResponse, sqlx::Error> {
    let mut validated = Vec::new();
    let mut invalid = Vec::new();

    for choice in choices {
        match check_choice(pool, import_id, &choice).await? {
            Ok(v) => validated.push(v),
            Err(reason) => invalid.push(InvalidChoice { choice, reason }),
        }
    }

    Ok(ConfirmResponse {
        import_id: import_id.to_string(),
        validated,
        invalid,
    })
}

async fn check_choice(
    pool: &SqlitePool,
    import_id: &str,
    choice: &ChoiceInput,
) -> Result<Result<ValidatedChoice, &'static str>, sqlx::Error> {
    // Zero ids and blank list types count as not sent.
    let title_id = choice.extracted_title_id.filter(|id| *id != 0);
    let match_id = choice.match_id.filter(|id| *id != 0);
    let raw_list_type = choice.list_type.as_deref().filter(|s| !s.trim().is_empty());

    let (Some(title_id), Some(match_id), Some(raw_list_type)) =
        (title_id, match_id, raw_list_type)
    else {
        return Ok(Err(REASON_MISSING_FIELDS));
    };

    let title = extracted_titles::get_title(pool, title_id).await?;
    if !title.is_some_and(|t| t.import_id == import_id) {
        return Ok(Err(REASON_MISMATCHED_IDS));
    }

    let Some(m) = title_matches::get_match(pool, match_id).await? else {
        return Ok(Err(REASON_MISMATCHED_IDS));
    };
    if m.extracted_title_id != title_id {
        return Ok(Err(REASON_MISMATCHED_IDS));
    }

    let Some(list_type) = ListType::normalize(raw_list_type) else {
        return Ok(Err(REASON_INVALID_LIST_TYPE));
    };

    Ok(Ok(ValidatedChoice {
        extracted_title_id: title_id,
        match_id,
        list_type,
        media_type: m.media_type,
        tmdb_id: m.external_id,
        local_id: m.local_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use showbuff_db::repo::imports;

    struct Fixture {
        pool: SqlitePool,
        import_id: String,
        title_a: i64,
        title_b: i64,
        match_a: i64,
        match_b: i64,
    }

    async fn fixture() -> Fixture {
        let pool = showbuff_db::connect(":memory:").await.unwrap();
        showbuff_db::migrate::run(&pool).await.unwrap();
        let session = imports::create_session(
            &pool,
            &imports::NewImportSession {
                source: "file",
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let a = extracted_titles::insert_title(&pool, &session.id, "Heat", Some("Heat"), None)
            .await
            .unwrap();
        let b = extracted_titles::insert_title(&pool, &session.id, "Fargo", Some("Fargo"), None)
            .await
            .unwrap();

        let new_match = |external_id| title_matches::NewTitleMatch {
            media_type: "movie",
            external_id: Some(external_id),
            local_id: None,
            confidence: 0.95,
            match_method: "local_exact",
            is_ambiguous: false,
        };
        let ma = title_matches::insert_match(&pool, a.id, &new_match(949))
            .await
            .unwrap();
        let mb = title_matches::insert_match(&pool, b.id, &new_match(275))
            .await
            .unwrap();

        Fixture {
            pool,
            import_id: session.id,
            title_a: a.id,
            title_b: b.id,
            match_a: ma.id,
            match_b: mb.id,
        }
    }

    fn choice(title: Option<i64>, m: Option<i64>, list: Option<&str>) -> ChoiceInput {
        ChoiceInput {
            extracted_title_id: title,
            match_id: m,
            list_type: list.map(String::from),
        }
    }

    #[tokio::test]
    async fn valid_choice_is_echoed_with_match_details() {
        let f = fixture().await;
        let resp = validate_choices(
            &f.pool,
            &f.import_id,
            vec![choice(Some(f.title_a), Some(f.match_a), Some("Currently-Watching"))],
        )
        .await
        .unwrap();

        assert!(resp.invalid.is_empty());
        assert_eq!(resp.validated.len(), 1);
        let v = &resp.validated[0];
        assert_eq!(v.list_type, ListType::CurrentlyWatching);
        assert_eq!(v.tmdb_id, Some(949));
        assert_eq!(v.media_type, "movie");
    }

    #[tokio::test]
    async fn match_of_another_title_is_mismatched() {
        let f = fixture().await;
        let resp = validate_choices(
            &f.pool,
            &f.import_id,
            vec![choice(Some(f.title_a), Some(f.match_b), Some("watchlist"))],
        )
        .await
        .unwrap();

        assert!(resp.validated.is_empty());
        assert_eq!(resp.invalid.len(), 1);
        assert_eq!(resp.invalid[0].reason, REASON_MISMATCHED_IDS);
    }

    #[tokio::test]
    async fn title_of_another_import_is_mismatched() {
        let f = fixture().await;
        let other = imports::create_session(
            &f.pool,
            &imports::NewImportSession {
                source: "file",
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let resp = validate_choices(
            &f.pool,
            &other.id,
            vec![choice(Some(f.title_b), Some(f.match_b), Some("watched"))],
        )
        .await
        .unwrap();
        assert_eq!(resp.invalid[0].reason, REASON_MISMATCHED_IDS);
    }

    #[tokio::test]
    async fn missing_and_bad_fields_are_reported_per_choice() {
        let f = fixture().await;
        let resp = validate_choices(
            &f.pool,
            &f.import_id,
            vec![
                choice(None, Some(f.match_a), Some("watchlist")),
                choice(Some(f.title_a), Some(0), Some("watchlist")),
                choice(Some(f.title_a), Some(f.match_a), Some("  ")),
                choice(Some(f.title_a), Some(f.match_a), Some("favourites")),
                choice(Some(f.title_b), Some(f.match_b), Some("watched")),
            ],
        )
        .await
        .unwrap();

        let reasons: Vec<_> = resp.invalid.iter().map(|i| i.reason).collect();
        assert_eq!(
            reasons,
            vec![
                REASON_MISSING_FIELDS,
                REASON_MISSING_FIELDS,
                REASON_MISSING_FIELDS,
                REASON_INVALID_LIST_TYPE,
            ]
        );
        assert_eq!(resp.validated.len(), 1);
        assert_eq!(resp.validated[0].match_id, f.match_b);
    }

    #[tokio::test]
    async fn unknown_ids_are_mismatched() {
        let f = fixture().await;
        let resp = validate_choices(
            &f.pool,
            &f.import_id,
            vec![
                choice(Some(9999), Some(f.match_a), Some("watchlist")),
                choice(Some(f.title_a), Some(9999), Some("watchlist")),
            ],
        )
        .await
        .unwrap();
        assert!(resp.invalid.iter().all(|i| i.reason == REASON_MISMATCHED_IDS));
        assert_eq!(resp.invalid.len(), 2);
    }

    #[test]
    fn request_accepts_camel_case_and_missing_choices() {
        let req: ConfirmRequest = serde_json::from_str(r#"{"importId":"abc"}"#).unwrap();
        assert_eq!(req.import_id.as_deref(), Some("abc"));
        assert!(req.choices.is_empty());

        let req: ConfirmRequest = serde_json::from_str(
            r#"{"importId":"abc","choices":[{"extractedTitleId":1,"listType":"watched"}]}"#,
        )
        .unwrap();
        assert_eq!(req.choices[0].extracted_title_id, Some(1));
        assert_eq!(req.choices[0].match_id, None);
    }
}
