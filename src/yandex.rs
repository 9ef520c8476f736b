//! Yandex suggest for Kinopoisk, used when the Kinopoisk endpoint gives
//! nothing usable.
//!
//! The answer looks like `["дюна", [...], ["{\"entityId\": ...}", ...], ...]`:
//! the third element is a list of JSON documents encoded as strings.

use std::cmp::Reverse;

use serde::Deserialize;
use serde_json::Value;

use crate::Identity;
use crate::fetch::{Request, Transport};
use crate::resolver::{
    Diagnostic, Lookup, SuggestSource, as_rating, as_text, as_votes, as_year, each_has_keys,
};

pub const SUGGEST_URL: &str = "https://suggest-kinopoisk.yandex.net/suggest-kinopoisk";

const SOURCE: &str = "suggest-kinopoisk";
const RESULTS_POS: usize = 2;

fn unexpected(detail: impl Into<String>) -> Diagnostic {
    Diagnostic::UnexpectedFormat {
        source: SOURCE,
        detail: detail.into(),
    }
}

/// Decode the outer answer and every embedded entry.
pub fn decode_entries(body: &str) -> Result<Vec<Value>, Diagnostic> {
    let outer: Value =
        serde_json::from_str(body).map_err(|e| unexpected(format!("undecodable answer: {e}")))?;

    let Some(encoded) = outer.get(RESULTS_POS).and_then(Value::as_array) else {
        let preview: String = body.chars().take(200).collect();
        return Err(unexpected(preview));
    };

    encoded
        .iter()
        .map(|item| {
            let text = item
                .as_str()
                .ok_or_else(|| unexpected(format!("entry is not a string: {item}")))?;
            serde_json::from_str::<Value>(text)
                .map_err(|e| unexpected(format!("undecodable entry: {e}")))
        })
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuggestEntry {
    entity_id: Value,
    original_title: Option<String>,
    title: Option<String>,
    years: Option<Vec<Value>>,
    rating: Option<SuggestRating>,
}

#[derive(Debug, Deserialize)]
struct SuggestRating {
    rate: Option<Value>,
    votes: Option<Value>,
}

impl SuggestEntry {
    /// Latest year the film lists; festival and wide releases may differ.
    fn latest_year(&self) -> i64 {
        self.years
            .iter()
            .flatten()
            .map(|y| as_year(Some(y)))
            .max()
            .unwrap_or(0)
    }

    fn into_identity(self) -> Result<Identity, Diagnostic> {
        let id = as_text(&self.entity_id).ok_or_else(|| unexpected("entityId is not an id"))?;
        let rus_name = self.title.ok_or_else(|| unexpected("movie without title"))?;
        let original_name = self
            .original_title
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| rus_name.clone());
        let rating = self.rating.unwrap_or(SuggestRating {
            rate: None,
            votes: None,
        });

        Ok(Identity {
            id,
            original_name,
            rus_name,
            kp_rank: rating.rate.as_ref().and_then(as_rating),
            kp_votes: rating.votes.as_ref().and_then(as_votes),
        })
    }
}

/// Newest `MOVIE` entry, with its rating when one is attached.
pub fn extract_suggest(entries: Vec<Value>) -> Result<Identity, Diagnostic> {
    if !each_has_keys(&entries, &["entityId"]) {
        return Err(Diagnostic::MissingEntityId { source: SOURCE });
    }

    let mut movies = Vec::new();
    for entry in entries {
        if entry.get("type").and_then(Value::as_str) != Some("MOVIE") {
            continue;
        }
        match serde_json::from_value::<SuggestEntry>(entry) {
            Ok(movie) => movies.push(movie),
            Err(e) => tracing::warn!("Skipping unreadable {SOURCE} movie entry: {e}"),
        }
    }
    movies.sort_by_key(|entry| Reverse(entry.latest_year()));

    movies
        .into_iter()
        .next()
        .ok_or(Diagnostic::NoCandidates { source: SOURCE })?
        .into_identity()
}

/// Secondary suggestion service.
pub struct YandexSuggest {
    url: String,
}

impl YandexSuggest {
    pub fn new(url: String) -> Self {
        Self { url }
    }
}

impl Default for YandexSuggest {
    fn default() -> Self {
        Self::new(SUGGEST_URL.to_string())
    }
}

#[async_trait::async_trait]
impl SuggestSource for YandexSuggest {
    async fn suggest(&self, transport: &dyn Transport, title: &str) -> Result<Lookup, Diagnostic> {
        let request = Request::get(self.url.as_str())
            .query("srv", "kinopoisk")
            .query("part", title);

        let body = transport
            .fetch(&request)
            .await
            .map_err(|e| Diagnostic::FetchFailed {
                source: SOURCE,
                reason: e.to_string(),
            })?;

        let entries = decode_entries(&body)?;
        extract_suggest(entries).map(Lookup::Suggest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::stub::StubTransport;
    use serde_json::json;

    fn encode(entries: &[Value]) -> String {
        let encoded: Vec<String> = entries.iter().map(|e| e.to_string()).collect();
        json!(["х", [], encoded]).to_string()
    }

    #[test]
    fn keeps_only_movies() {
        let entries = vec![
            json!({"type": "MOVIE", "entityId": 5, "originalTitle": "X", "title": "Х", "years": [2019, 2020]}),
            json!({"type": "SERIAL", "entityId": 6, "originalTitle": "Y", "title": "У", "years": [2023]}),
        ];
        let identity = extract_suggest(entries).unwrap();
        assert_eq!(identity.id, "5");
        assert_eq!(identity.original_name, "X");
        assert_eq!(identity.rus_name, "Х");
        assert_eq!(identity.kp_rank, None);
    }

    #[test]
    fn latest_release_year_wins() {
        let entries = vec![
            json!({"type": "MOVIE", "entityId": 1, "originalTitle": "Remake", "title": "Ремейк", "years": [2018]}),
            json!({"type": "MOVIE", "entityId": 2, "originalTitle": "Festival", "title": "Фестиваль", "years": [2017, 2019],
                   "rating": {"rate": 7.4, "votes": 1200}}),
        ];
        let identity = extract_suggest(entries).unwrap();
        assert_eq!(identity.id, "2");
        assert_eq!(identity.kp_rank, Some(7.4));
        assert_eq!(identity.kp_votes, Some(1200));
    }

    #[test]
    fn missing_original_title_falls_back_to_title() {
        let entries = vec![
            json!({"type": "MOVIE", "entityId": "77", "originalTitle": null, "title": "Брат", "years": [1997]}),
        ];
        let identity = extract_suggest(entries).unwrap();
        assert_eq!(identity.id, "77");
        assert_eq!(identity.original_name, "Брат");
    }

    #[test]
    fn odd_non_movie_entries_do_not_hide_the_movie() {
        let entries = vec![
            json!({"type": "MOVIE", "entityId": 5, "originalTitle": "X", "title": "Х", "years": [2020]}),
            json!({"type": "PERSON", "entityId": 6, "title": {"ru": "Кто-то"}, "years": "1970"}),
        ];
        assert_eq!(extract_suggest(entries).unwrap().id, "5");
    }

    #[test]
    fn unreadable_movie_is_skipped() {
        let entries = vec![
            json!({"type": "MOVIE", "entityId": 5, "originalTitle": "X", "title": "Х", "years": "2020"}),
            json!({"type": "MOVIE", "entityId": 7, "originalTitle": "Z", "title": "З", "years": [2001]}),
        ];
        assert_eq!(extract_suggest(entries).unwrap().id, "7");
    }

    #[test]
    fn entry_without_entity_id_is_rejected() {
        let entries = vec![
            json!({"type": "MOVIE", "entityId": 1, "originalTitle": "A", "title": "А"}),
            json!({"type": "PERSON", "title": "Кто-то"}),
        ];
        assert_eq!(
            extract_suggest(entries),
            Err(Diagnostic::MissingEntityId { source: SOURCE })
        );
    }

    #[test]
    fn answer_without_results_is_unexpected() {
        assert!(matches!(
            decode_entries(r#"["х", []]"#),
            Err(Diagnostic::UnexpectedFormat { .. })
        ));
        assert!(matches!(
            decode_entries("not json"),
            Err(Diagnostic::UnexpectedFormat { .. })
        ));
        assert!(matches!(
            decode_entries(r#"["х", [], ["{broken"]]"#),
            Err(Diagnostic::UnexpectedFormat { .. })
        ));
    }

    #[tokio::test]
    async fn suggest_decodes_nested_entries() {
        let body = encode(&[
            json!({"type": "MOVIE", "entityId": 5, "originalTitle": "X", "title": "Х", "years": [2020]}),
        ]);
        let stub = StubTransport::default().with_page(SUGGEST_URL, &body);

        let lookup = YandexSuggest::default().suggest(&stub, "Х").await.unwrap();
        assert!(matches!(lookup, Lookup::Suggest(ref identity) if identity.id == "5"));

        let requests = stub.requests.lock().unwrap();
        assert_eq!(
            requests[0].query,
            vec![("srv", "kinopoisk".to_string()), ("part", "Х".to_string())]
        );
    }
}
