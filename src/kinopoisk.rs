//! Kinopoisk: the search-as-you-type endpoint and the per-movie ratings XML.

use std::cmp::Reverse;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde_json::Value;

use crate::fetch::{Request, Transport};
use crate::resolver::{
    Diagnostic, Lookup, SuggestSource, as_rating, as_year, each_has_keys, is_truthy, required_text,
};
use crate::{Identity, Ranks};

pub const SUGGEST_URL: &str = "https://www.kinopoisk.ru/search/suggest/";
pub const RANKS_URL: &str = "http://www.kinopoisk.ru/rating/";

const SOURCE: &str = "kinopoisk";

/// Layouts the suggest endpoint has been seen answering with.
#[derive(Debug, Clone, PartialEq)]
pub enum SuggestPayload {
    /// Not JSON, or JSON that isn't a list.
    NotAList,
    /// A list whose elements don't all share either key set.
    Unrecognised,
    /// Every element carries `id`, `name`, `year` and `rus`.
    ShapeA(Vec<Value>),
    /// Every element carries `dataType`.
    ShapeB(Vec<Value>),
}

/// Decide the payload layout by checking the key set on every element.
/// `dataType` is checked first.
pub fn classify(body: &str) -> SuggestPayload {
    let Ok(Value::Array(items)) = serde_json::from_str::<Value>(body) else {
        return SuggestPayload::NotAList;
    };

    if each_has_keys(&items, &["dataType"]) {
        SuggestPayload::ShapeB(items)
    } else if each_has_keys(&items, &["id", "name", "year", "rus"]) {
        SuggestPayload::ShapeA(items)
    } else {
        SuggestPayload::Unrecognised
    }
}

/// Newest rated non-serial film.
pub fn extract_shape_a(films: &[Value]) -> Result<Identity, Diagnostic> {
    let mut candidates: Vec<&Value> = films
        .iter()
        .filter(|film| film.get("is_serial").and_then(Value::as_str) != Some("serial"))
        .filter(|film| film.get("ur_rating").is_some_and(is_truthy))
        .collect();
    candidates.sort_by_key(|film| Reverse(as_year(film.get("year"))));

    let best = candidates
        .first()
        .ok_or(Diagnostic::NoCandidates { source: SOURCE })?;

    Ok(Identity {
        id: required_text(best, "id", SOURCE)?,
        original_name: required_text(best, "name", SOURCE)?,
        rus_name: required_text(best, "rus", SOURCE)?,
        kp_rank: best.get("ur_rating").and_then(as_rating),
        kp_votes: None,
    })
}

/// The `dataType` shared by the whole payload, if it is uniform.
fn payload_data_type(films: &[Value]) -> Option<&str> {
    let mut types = films
        .iter()
        .map(|film| film.get("dataType").and_then(Value::as_str));
    let first = types.next()??;
    types.all(|t| t == Some(first)).then_some(first)
}

/// Newest film of a `dataType` payload.
///
/// The film filter looks at the payload as a whole, not at each element:
/// either the payload is film-typed and every element stays, or none does.
pub fn extract_shape_b(films: &[Value]) -> Result<Identity, Diagnostic> {
    let keep_all = payload_data_type(films) == Some("film");
    let mut candidates: Vec<&Value> = films.iter().filter(|_| keep_all).collect();
    candidates.sort_by_key(|film| Reverse(as_year(film.get("year"))));

    let best = candidates
        .first()
        .ok_or(Diagnostic::NoCandidates { source: SOURCE })?;

    Ok(Identity {
        id: required_text(best, "id", SOURCE)?,
        original_name: required_text(best, "name", SOURCE)?,
        rus_name: required_text(best, "rus", SOURCE)?,
        kp_rank: best.pointer("/rating/value").and_then(as_rating),
        kp_votes: None,
    })
}

/// Primary suggestion service.
pub struct KinopoiskSuggest {
    url: String,
}

impl KinopoiskSuggest {
    pub fn new(url: String) -> Self {
        Self { url }
    }
}

impl Default for KinopoiskSuggest {
    fn default() -> Self {
        Self::new(SUGGEST_URL.to_string())
    }
}

#[async_trait::async_trait]
impl SuggestSource for KinopoiskSuggest {
    async fn suggest(&self, transport: &dyn Transport, title: &str) -> Result<Lookup, Diagnostic> {
        let request = Request::get(self.url.as_str())
            .query("q", title)
            .query("topsuggest", "true")
            .query("ajax", "1")
            .header("Content-Type", "application/json")
            .header("Accept", "application/json");

        let body = transport
            .fetch(&request)
            .await
            .map_err(|e| Diagnostic::FetchFailed {
                source: SOURCE,
                reason: e.to_string(),
            })?;

        match classify(&body) {
            SuggestPayload::ShapeA(films) => extract_shape_a(&films).map(Lookup::ShapeA),
            SuggestPayload::ShapeB(films) => extract_shape_b(&films).map(Lookup::ShapeB),
            SuggestPayload::NotAList => Err(Diagnostic::UnexpectedFormat {
                source: SOURCE,
                detail: "answer is not a JSON list".to_string(),
            }),
            SuggestPayload::Unrecognised => Err(Diagnostic::UnexpectedFormat {
                source: SOURCE,
                detail: "elements match neither known layout".to_string(),
            }),
        }
    }
}

/// Per-movie ratings document.
pub struct RanksFeed {
    base_url: String,
}

impl RanksFeed {
    pub fn new(base_url: String) -> Self {
        Self { base_url }
    }

    pub fn url_for(&self, movie_id: &str) -> String {
        format!("{}{}.xml", self.base_url, movie_id)
    }

    /// Ranks for `movie_id`. Failures leave the ranks empty.
    pub async fn fetch(
        &self,
        transport: &dyn Transport,
        movie_id: &str,
    ) -> (Ranks, Option<Diagnostic>) {
        let body = match transport.fetch(&Request::get(self.url_for(movie_id))).await {
            Ok(body) => body,
            Err(e) => {
                let diagnostic = Diagnostic::RanksUnavailable {
                    reason: e.to_string(),
                };
                return (Ranks::default(), Some(diagnostic));
            }
        };

        match parse_ranks(&body) {
            Ok(ranks) => (ranks, None),
            Err(diagnostic) => (Ranks::default(), Some(diagnostic)),
        }
    }
}

impl Default for RanksFeed {
    fn default() -> Self {
        Self::new(RANKS_URL.to_string())
    }
}

#[derive(Clone, Copy, PartialEq)]
enum RatingTag {
    Kinopoisk,
    Imdb,
}

fn rating_tag(e: &BytesStart<'_>) -> Option<RatingTag> {
    match e.local_name().as_ref() {
        b"kp_rating" => Some(RatingTag::Kinopoisk),
        b"imdb_rating" => Some(RatingTag::Imdb),
        _ => None,
    }
}

fn num_vote(e: &BytesStart<'_>) -> Option<u64> {
    let attr = e.try_get_attribute("num_vote").ok()??;
    let value = attr.unescape_value().ok()?;
    value.trim().parse().ok()
}

/// Read `kp_rating` / `imdb_rating` children of the root element.
/// Either may be absent; numbers that don't parse are left out.
pub fn parse_ranks(xml: &str) -> Result<Ranks, Diagnostic> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut ranks = Ranks::default();
    let mut depth = 0usize;
    let mut current: Option<RatingTag> = None;
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                depth += 1;
                if depth == 2 {
                    current = rating_tag(&e);
                    text.clear();
                    match current {
                        Some(RatingTag::Kinopoisk) => ranks.kp_votes = num_vote(&e),
                        Some(RatingTag::Imdb) => ranks.imdb_votes = num_vote(&e),
                        None => {}
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                if depth == 1 {
                    match rating_tag(&e) {
                        Some(RatingTag::Kinopoisk) => ranks.kp_votes = num_vote(&e),
                        Some(RatingTag::Imdb) => ranks.imdb_votes = num_vote(&e),
                        None => {}
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if current.is_some() && depth == 2 {
                    text.push_str(&e.unescape().unwrap_or_default());
                }
            }
            Ok(Event::End(_)) => {
                if depth == 2 {
                    let rating = text.trim().replace(',', ".").parse::<f64>().ok();
                    match current.take() {
                        Some(RatingTag::Kinopoisk) => ranks.kp_rank = rating,
                        Some(RatingTag::Imdb) => ranks.imdb_rank = rating,
                        None => {}
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Diagnostic::RanksMalformed {
                    detail: e.to_string(),
                });
            }
            _ => {}
        }
    }

    Ok(ranks)
}
