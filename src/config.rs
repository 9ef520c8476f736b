use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::RunOptions;
use crate::afisha::SCHEDULE_URL;

/// Rank the movies currently showing in Moscow cinemas by Kinopoisk rating.
#[derive(Debug, Clone, Parser)]
#[command(version, about)]
pub struct Config {
    /// Afisha schedule page to scrape
    #[arg(long, default_value = SCHEDULE_URL)]
    pub listing_url: String,

    /// How many of the most widely screened movies to look up
    #[arg(long, default_value_t = 20)]
    pub listing_limit: usize,

    /// How many rows to print
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Per-request timeout
    #[arg(long, default_value_t = 20)]
    pub timeout_secs: u64,

    /// Log filter, e.g. `error` or `cinema_rank=debug` (RUST_LOG wins when set)
    #[arg(long, default_value = "error")]
    pub log_level: String,

    /// Where diagnostics are written
    #[arg(long, default_value = "cinemas.log")]
    pub log_file: PathBuf,
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            listing_url: self.listing_url.clone(),
            listing_limit: self.listing_limit,
            top: self.top,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::parse_from(["cinema-rank"]);
        assert_eq!(config.listing_url, SCHEDULE_URL);
        assert_eq!(config.listing_limit, 20);
        assert_eq!(config.top, 10);
        assert_eq!(config.timeout(), Duration::from_secs(20));
        assert_eq!(config.log_file, PathBuf::from("cinemas.log"));
    }

    #[test]
    fn overrides() {
        let config = Config::parse_from([
            "cinema-rank",
            "--top",
            "5",
            "--listing-limit",
            "30",
            "--log-level",
            "debug",
        ]);
        let options = config.run_options();
        assert_eq!(options.top, 5);
        assert_eq!(options.listing_limit, 30);
        assert_eq!(config.log_level, "debug");
    }
}
