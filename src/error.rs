use thiserror::Error;

/// Failure of a single HTTP round-trip.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{0} is unavailable")]
    Unavailable(String),
}

/// Errors that abort the whole run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("listing is unavailable: {0}")]
    ListingUnavailable(#[source] FetchError),

    #[error("listing layout changed: {0}")]
    LayoutChanged(String),

    #[error("selector error: {0}")]
    Selector(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("logging setup failed: {0}")]
    Logging(String),
}
