//! Afisha.ru cinema schedule: fetching, parsing and picking the most
//! widely screened titles.

use scraper::{Html, Selector};

use crate::ListingEntry;
use crate::error::Error;
use crate::fetch::{Request, Transport};

pub const SCHEDULE_URL: &str = "https://www.afisha.ru/msk/schedule_cinema/";

/// Listing page of one metro area.
pub struct AfishaListing {
    url: String,
}

impl AfishaListing {
    pub fn new(url: String) -> Self {
        Self { url }
    }

    /// Fetch the schedule page and extract every listed movie.
    pub async fn fetch_entries(
        &self,
        transport: &dyn Transport,
    ) -> Result<Vec<ListingEntry>, Error> {
        let body = transport
            .fetch(&Request::get(self.url.as_str()))
            .await
            .map_err(Error::ListingUnavailable)?;

        let entries = parse_schedule(&body)?;
        if entries.is_empty() {
            return Err(Error::LayoutChanged(format!(
                "no movies found on {}",
                self.url
            )));
        }
        Ok(entries)
    }
}

/// Parse `div#schedule div.object` blocks: the `h3` is the title, each row of
/// the first table is one cinema.
pub fn parse_schedule(html: &str) -> Result<Vec<ListingEntry>, Error> {
    let doc = Html::parse_document(html);
    let schedule_sel = Selector::parse("div#schedule").map_err(|e| Error::Selector(e.to_string()))?;
    let object_sel = Selector::parse("div.object").map_err(|e| Error::Selector(e.to_string()))?;
    let title_sel = Selector::parse("h3").map_err(|e| Error::Selector(e.to_string()))?;
    let table_sel = Selector::parse("table").map_err(|e| Error::Selector(e.to_string()))?;
    let row_sel = Selector::parse("tr").map_err(|e| Error::Selector(e.to_string()))?;

    let schedule = doc
        .select(&schedule_sel)
        .next()
        .ok_or_else(|| Error::LayoutChanged("div#schedule not found".to_string()))?;

    let mut entries = Vec::new();
    for (idx, object) in schedule.select(&object_sel).enumerate() {
        let Some(title) = object.select(&title_sel).next() else {
            tracing::warn!("Skipping schedule entry #{idx}: no title");
            continue;
        };
        let Some(table) = object.select(&table_sel).next() else {
            tracing::warn!("Skipping schedule entry #{idx}: no cinema table");
            continue;
        };

        let rus_name = title.text().collect::<String>().trim().to_string();
        let cinemas_num = table.select(&row_sel).count();
        entries.push(ListingEntry {
            rus_name,
            cinemas_num,
        });
    }

    Ok(entries)
}

/// The `limit` entries shown in the most cinemas. Ties keep listing order.
pub fn select_top(mut entries: Vec<ListingEntry>, limit: usize) -> Vec<ListingEntry> {
    entries.sort_by(|a, b| b.cinemas_num.cmp(&a.cinemas_num));
    entries.truncate(limit);
    entries
}
