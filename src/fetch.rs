//! HTTP plumbing shared by every upstream service.

use std::time::Duration;

use reqwest::{Client, header};

use crate::error::FetchError;

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/143.0.0.0 Safari/537.36";
const ACCEPT_LANGUAGE: &str = "ru-RU,ru;q=0.8,en-US;q=0.6,en;q=0.4";

/// A GET request: url, query string pairs and extra headers.
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub url: String,
    pub query: Vec<(&'static str, String)>,
    pub headers: Vec<(&'static str, &'static str)>,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn query(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.query.push((key, value.into()));
        self
    }

    pub fn header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.push((name, value));
        self
    }
}

/// Everything that talks to the network goes through this trait, so the
/// pipeline can be driven by canned pages in tests.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Perform the request and return the response body.
    /// Non-2xx statuses are failures.
    async fn fetch(&self, request: &Request) -> Result<String, FetchError>;
}

/// Transport backed by one reqwest client, reused for every request.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT_LANGUAGE,
            header::HeaderValue::from_static(ACCEPT_LANGUAGE),
        );

        let client = Client::builder()
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, request: &Request) -> Result<String, FetchError> {
        let wrap = |source| FetchError::Request {
            url: request.url.clone(),
            source,
        };

        let mut builder = self.client.get(&request.url).query(&request.query);
        for (name, value) in &request.headers {
            builder = builder.header(*name, *value);
        }

        let resp = builder
            .send()
            .await
            .map_err(wrap)?
            .error_for_status()
            .map_err(wrap)?;
        resp.text().await.map_err(wrap)
    }
}
