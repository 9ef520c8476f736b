//! Identity resolution: turns a free-text Russian title into a canonical
//! movie identity by walking a chain of suggestion services.

use std::fmt;

use serde_json::Value;

use crate::Identity;
use crate::fetch::Transport;
use crate::kinopoisk::KinopoiskSuggest;
use crate::yandex::YandexSuggest;

/// Which adapter produced the identity, if any.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    NoMatch,
    /// Kinopoisk suggest, flat `ur_rating` layout.
    ShapeA(Identity),
    /// Kinopoisk suggest, `dataType` layout with nested `rating.value`.
    ShapeB(Identity),
    /// Yandex suggest fallback.
    Suggest(Identity),
}

impl Lookup {
    pub fn into_identity(self) -> Option<Identity> {
        match self {
            Lookup::NoMatch => None,
            Lookup::ShapeA(identity) | Lookup::ShapeB(identity) | Lookup::Suggest(identity) => {
                Some(identity)
            }
        }
    }
}

/// Something that went wrong while enriching one movie. Never fatal.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    FetchFailed { source: &'static str, reason: String },
    UnexpectedFormat { source: &'static str, detail: String },
    MissingEntityId { source: &'static str },
    NoCandidates { source: &'static str },
    RanksUnavailable { reason: String },
    RanksMalformed { detail: String },
    Unresolved,
}

impl Diagnostic {
    /// Conditions worth an error-level log line.
    pub fn is_severe(&self) -> bool {
        matches!(
            self,
            Diagnostic::FetchFailed { .. }
                | Diagnostic::UnexpectedFormat { .. }
                | Diagnostic::MissingEntityId { .. }
                | Diagnostic::RanksUnavailable { .. }
                | Diagnostic::RanksMalformed { .. }
                | Diagnostic::Unresolved
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::FetchFailed { source, reason } => {
                write!(f, "{source}: fetch failed: {reason}")
            }
            Diagnostic::UnexpectedFormat { source, detail } => {
                write!(f, "{source} has returned a new type of answer: {detail}")
            }
            Diagnostic::MissingEntityId { source } => {
                write!(f, "answer from {source} doesn't contain entityId")
            }
            Diagnostic::NoCandidates { source } => {
                write!(f, "{source}: no suitable movie among suggestions")
            }
            Diagnostic::RanksUnavailable { reason } => write!(f, "ranks unavailable: {reason}"),
            Diagnostic::RanksMalformed { detail } => {
                write!(f, "ranks document malformed: {detail}")
            }
            Diagnostic::Unresolved => write!(f, "totally failed to grab info"),
        }
    }
}

/// Outcome of resolving one title, with everything noticed on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub lookup: Lookup,
    pub diagnostics: Vec<Diagnostic>,
}

/// One upstream suggestion service.
#[async_trait::async_trait]
pub trait SuggestSource: Send + Sync {
    /// Look the title up. `Ok` always carries a match.
    async fn suggest(&self, transport: &dyn Transport, title: &str) -> Result<Lookup, Diagnostic>;
}

/// Tries each source in order, first match wins.
pub struct Resolver {
    sources: Vec<Box<dyn SuggestSource>>,
}

impl Resolver {
    pub fn new(sources: Vec<Box<dyn SuggestSource>>) -> Self {
        Self { sources }
    }

    /// Kinopoisk suggest first, Yandex suggest as the fallback.
    pub fn kinopoisk() -> Self {
        Self::new(vec![
            Box::new(KinopoiskSuggest::default()),
            Box::new(YandexSuggest::default()),
        ])
    }

    pub async fn resolve(&self, transport: &dyn Transport, title: &str) -> Resolution {
        let mut diagnostics = Vec::new();
        for source in &self.sources {
            match source.suggest(transport, title).await {
                Ok(Lookup::NoMatch) => {}
                Ok(lookup) => return Resolution { lookup, diagnostics },
                Err(diagnostic) => diagnostics.push(diagnostic),
            }
        }

        diagnostics.push(Diagnostic::Unresolved);
        Resolution {
            lookup: Lookup::NoMatch,
            diagnostics,
        }
    }
}

// Helpers for the loosely typed suggestion payloads.

/// True when every element is an object carrying all `keys`.
pub(crate) fn each_has_keys(items: &[Value], keys: &[&str]) -> bool {
    items
        .iter()
        .all(|item| keys.iter().all(|key| item.get(key).is_some()))
}

/// Loose truthiness: null, false, 0, "" and empty containers are falsy.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Ids and titles arrive both as strings and as numbers.
pub(crate) fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A rating like `7.5`, `"7.5"` or `"7,5"`.
pub(crate) fn as_rating(value: &Value) -> Option<f64> {
    let rating = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse().ok(),
        _ => None,
    }?;
    rating.is_finite().then_some(rating)
}

pub(crate) fn as_votes(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().replace([' ', '\u{a0}'], "").parse().ok(),
        _ => None,
    }
}

/// Leading digits of a year (`2021`, `"2021"`, `"2019-2021"`); 0 when absent.
pub(crate) fn as_year(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
        Some(Value::String(s)) => {
            let digits: String = s.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().unwrap_or(0)
        }
        _ => 0,
    }
}

/// Fetch `key` as text or report the payload as unexpected.
pub(crate) fn required_text(
    item: &Value,
    key: &str,
    source: &'static str,
) -> Result<String, Diagnostic> {
    item.get(key)
        .and_then(as_text)
        .ok_or_else(|| Diagnostic::UnexpectedFormat {
            source,
            detail: format!("candidate without `{key}`"),
        })
}
