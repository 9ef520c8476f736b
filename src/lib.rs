pub mod afisha;
pub mod config;
pub mod error;
pub mod fetch;
pub mod kinopoisk;
pub mod report;
pub mod resolver;
pub mod yandex;

use error::Error;
use fetch::Transport;
use report::Report;
use resolver::{Diagnostic, Resolver};

/// One movie row of the cinema schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingEntry {
    pub rus_name: String,
    pub cinemas_num: usize,
}

/// Canonical movie identity found by a suggestion service.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub id: String,
    pub original_name: String,
    pub rus_name: String,
    pub kp_rank: Option<f64>,
    pub kp_votes: Option<u64>,
}

/// Ratings from the per-movie ranks document. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ranks {
    pub kp_rank: Option<f64>,
    pub kp_votes: Option<u64>,
    pub imdb_rank: Option<f64>,
    pub imdb_votes: Option<u64>,
}

/// Everything known about one movie after all pipeline stages.
#[derive(Debug, Clone, PartialEq)]
pub struct MovieRecord {
    pub id: String,
    pub rus_name: String,
    pub original_name: String,
    pub cinemas_num: usize,
    pub kp_rank: Option<f64>,
    pub kp_votes: Option<u64>,
    pub imdb_rank: Option<f64>,
    pub imdb_votes: Option<u64>,
}

impl MovieRecord {
    /// Listing, then identity, then ranks; later stages win on collision.
    pub fn merge(listing: ListingEntry, identity: Identity, ranks: Ranks) -> Self {
        let mut record = Self {
            id: identity.id,
            rus_name: listing.rus_name,
            original_name: identity.original_name,
            cinemas_num: listing.cinemas_num,
            kp_rank: identity.kp_rank,
            kp_votes: identity.kp_votes,
            imdb_rank: None,
            imdb_votes: None,
        };
        if !identity.rus_name.is_empty() {
            record.rus_name = identity.rus_name;
        }
        record.kp_rank = ranks.kp_rank.or(record.kp_rank);
        record.kp_votes = ranks.kp_votes.or(record.kp_votes);
        record.imdb_rank = ranks.imdb_rank;
        record.imdb_votes = ranks.imdb_votes;
        record
    }
}

/// Run options that shape the pipeline.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub listing_url: String,
    pub listing_limit: usize,
    pub top: usize,
}

/// The most widely screened movies of the listing. Any failure here is fatal.
pub async fn fetch_listing(
    transport: &dyn Transport,
    options: &RunOptions,
) -> Result<Vec<ListingEntry>, Error> {
    let listing = afisha::AfishaListing::new(options.listing_url.clone());
    let entries = listing.fetch_entries(transport).await?;
    let selected = afisha::select_top(entries, options.listing_limit);
    tracing::info!("Selected {} movies from the listing", selected.len());
    Ok(selected)
}

/// Resolve, fetch ranks and rank the selected movies, one at a time.
///
/// Per-movie problems are reported through `on_diagnostic` and the movie is
/// left out.
pub async fn rank_movies(
    transport: &dyn Transport,
    entries: Vec<ListingEntry>,
    top: usize,
    mut on_diagnostic: impl FnMut(&str, &Diagnostic),
) -> Report {
    let resolver = Resolver::kinopoisk();
    let ranks_feed = kinopoisk::RanksFeed::default();

    let mut records = Vec::with_capacity(entries.len());
    for entry in entries {
        let resolution = resolver.resolve(transport, &entry.rus_name).await;
        for diagnostic in &resolution.diagnostics {
            on_diagnostic(&entry.rus_name, diagnostic);
        }

        let Some(identity) = resolution.lookup.into_identity() else {
            continue;
        };

        let (ranks, diagnostic) = ranks_feed.fetch(transport, &identity.id).await;
        if let Some(diagnostic) = diagnostic {
            on_diagnostic(&entry.rus_name, &diagnostic);
        }
        records.push(MovieRecord::merge(entry, identity, ranks));
    }

    report::build_report(records, top)
}

/// Listing, resolution, ranks and report for one run.
pub async fn run(
    transport: &dyn Transport,
    options: &RunOptions,
    on_diagnostic: impl FnMut(&str, &Diagnostic),
) -> Result<Report, Error> {
    let entries = fetch_listing(transport, options).await?;
    Ok(rank_movies(transport, entries, options.top, on_diagnostic).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::stub::StubTransport;

    fn listing() -> ListingEntry {
        ListingEntry {
            rus_name: "Дюна".to_string(),
            cinemas_num: 42,
        }
    }

    fn identity(kp_rank: Option<f64>) -> Identity {
        Identity {
            id: "409424".to_string(),
            original_name: "Dune".to_string(),
            rus_name: "Дюна: Часть вторая".to_string(),
            kp_rank,
            kp_votes: Some(1000),
        }
    }

    #[test]
    fn ranks_overwrite_suggestion_rating() {
        let ranks = Ranks {
            kp_rank: Some(6.5),
            kp_votes: Some(2000),
            imdb_rank: Some(7.1),
            imdb_votes: Some(300),
        };
        let record = MovieRecord::merge(listing(), identity(Some(6.0)), ranks);
        assert_eq!(record.kp_rank, Some(6.5));
        assert_eq!(record.kp_votes, Some(2000));
        assert_eq!(record.imdb_rank, Some(7.1));
        assert_eq!(record.rus_name, "Дюна: Часть вторая");
        assert_eq!(record.cinemas_num, 42);
    }

    #[test]
    fn suggestion_rating_survives_empty_ranks() {
        let record = MovieRecord::merge(listing(), identity(Some(6.0)), Ranks::default());
        assert_eq!(record.kp_rank, Some(6.0));
        assert_eq!(record.imdb_rank, None);
    }

    fn options() -> RunOptions {
        RunOptions {
            listing_url: afisha::SCHEDULE_URL.to_string(),
            listing_limit: 20,
            top: 10,
        }
    }

    const LISTING: &str = r#"
        <div id="schedule">
          <div class="object"><h3>Дюна</h3>
            <table><tr><td>1</td></tr><tr><td>2</td></tr></table></div>
          <div class="object"><h3>Неизвестный фильм</h3>
            <table><tr><td>1</td></tr></table></div>
        </div>
    "#;

    #[tokio::test]
    async fn unreachable_listing_stops_the_run() {
        let stub = StubTransport::default();
        let result = run(&stub, &options(), |_, _| {}).await;
        assert!(matches!(result, Err(Error::ListingUnavailable(_))));
        assert_eq!(stub.requested_urls(), vec![afisha::SCHEDULE_URL]);
    }

    #[tokio::test]
    async fn listing_keeps_the_widest_screened() {
        let stub = StubTransport::default().with_page(afisha::SCHEDULE_URL, LISTING);
        let options = RunOptions {
            listing_limit: 1,
            ..options()
        };
        let entries = fetch_listing(&stub, &options).await.unwrap();
        assert_eq!(
            entries,
            vec![ListingEntry {
                rus_name: "Дюна".to_string(),
                cinemas_num: 2,
            }]
        );
    }

    #[tokio::test]
    async fn resolves_ranks_and_reports_unresolved_titles() {
        let stub = StubTransport::default()
            .with_page(afisha::SCHEDULE_URL, LISTING)
            .with_page(
                kinopoisk::SUGGEST_URL,
                r#"[{"id": 409424, "name": "Dune", "year": "2021", "rus": "Дюна", "ur_rating": "7.7"}]"#,
            )
            .with_page(
                &kinopoisk::RanksFeed::default().url_for("409424"),
                r#"<rating><kp_rating num_vote="500">7.9</kp_rating></rating>"#,
            );

        let mut unresolved = Vec::new();
        let report = run(&stub, &options(), |title, diagnostic| {
            if matches!(diagnostic, Diagnostic::Unresolved) {
                unresolved.push(title.to_string());
            }
        })
        .await
        .unwrap();

        let Report::Table(rows) = report else {
            panic!("expected a table");
        };
        // The stub answers the suggest URL for every title, so both titles
        // resolve to the same movie; ties keep listing order.
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].original_name, "Dune");
        assert_eq!(rows[0].kp_rank, Some(7.9));
        assert_eq!(rows[0].cinemas_num, 2);
        assert_eq!(rows[1].cinemas_num, 1);
        assert!(unresolved.is_empty());
    }

    #[tokio::test]
    async fn nothing_resolved_means_nothing_to_print() {
        let stub = StubTransport::default().with_page(afisha::SCHEDULE_URL, LISTING);

        let mut unresolved = Vec::new();
        let report = run(&stub, &options(), |title, diagnostic| {
            if matches!(diagnostic, Diagnostic::Unresolved) {
                unresolved.push(title.to_string());
            }
        })
        .await
        .unwrap();

        assert_eq!(report, Report::NothingToPrint);
        assert_eq!(unresolved, vec!["Дюна", "Неизвестный фильм"]);
    }
}
