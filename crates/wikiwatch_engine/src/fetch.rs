use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use url::Url;

use crate::decode::decode_page;
use crate::feed::{parse_feed, DayGroup};
use crate::hash::content_hash;
use crate::retry::RetryPolicy;
use crate::scan::PageHasher;
use crate::types::{FailureKind, FetchError};

/// Transport settings for all wiki requests.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_bytes: u64,
    pub retry: RetryPolicy,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_bytes: 5 * 1024 * 1024,
            retry: RetryPolicy::fetch_default(),
        }
    }
}

/// Where the wiki lives: the feed endpoint plus the diff page template.
#[derive(Debug, Clone)]
pub struct WikiEndpoints {
    pub feed_endpoint: String,
    /// Opaque plugin identifier the feed endpoint keys its response on.
    pub plugin_key: String,
    /// Row-count filter sent with the feed request.
    pub feed_rows: u32,
    /// Diff page URL with a `{pageid}` placeholder.
    pub diff_url_template: String,
}

/// Read access to the wiki: feed listing, diff pages and content hashes.
/// The trait seam keeps the cycle driver testable without a network.
#[async_trait]
pub trait WikiSource: PageHasher {
    async fn recent_days(&self) -> Result<Vec<DayGroup>, FetchError>;
    async fn diff_document(&self, page_id: u64) -> Result<String, FetchError>;
    fn diff_url(&self, page_id: u64) -> String;
}

pub struct WikiClient {
    client: reqwest::Client,
    settings: FetchSettings,
    endpoints: WikiEndpoints,
}

impl WikiClient {
    pub fn new(settings: FetchSettings, endpoints: WikiEndpoints) -> Result<Self, FetchError> {
        Url::parse(&endpoints.feed_endpoint)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;

        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;

        Ok(Self {
            client,
            settings,
            endpoints,
        })
    }

    /// Diff page URL for a page id.
    pub fn diff_page_url(&self, page_id: u64) -> String {
        self.endpoints
            .diff_url_template
            .replace("{pageid}", &page_id.to_string())
    }

    /// POSTs the plugin form to the feed endpoint and parses the
    /// day-grouped response. Not retried; a failed feed poll simply waits
    /// for the next tick.
    pub async fn fetch_feed(&self) -> Result<Vec<DayGroup>, FetchError> {
        let num_key = format!("recent[{}][num]", self.endpoints.plugin_key);
        let modify_key = format!("recent[{}][modify]", self.endpoints.plugin_key);
        let form = [
            (num_key.as_str(), self.endpoints.feed_rows.to_string()),
            (modify_key.as_str(), "none".to_string()),
        ];

        let response = self
            .client
            .post(&self.endpoints.feed_endpoint)
            .form(&form)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let body = self.read_body(response).await?;
        parse_feed(&body, &self.endpoints.plugin_key)
    }

    /// GETs and decodes a diff page, retrying per the fetch policy.
    pub async fn fetch_diff_document(&self, page_id: u64) -> Result<String, FetchError> {
        let url = self.diff_page_url(page_id);
        self.settings.retry.run(|| self.get_page(&url)).await
    }

    async fn get_page(&self, url: &str) -> Result<String, FetchError> {
        let parsed = Url::parse(url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        self.read_body(response).await
    }

    /// Checks status, streams the body under the size cap and decodes it.
    async fn read_body(&self, response: reqwest::Response) -> Result<String, FetchError> {
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(content_len),
                    },
                    "response too large",
                ));
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(next_len),
                    },
                    "response too large",
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        decode_page(&bytes, content_type.as_deref())
            .map_err(|err| FetchError::new(FailureKind::Decode, err.to_string()))
    }
}

#[async_trait]
impl PageHasher for WikiClient {
    async fn page_hash(&self, page_id: u64) -> Result<String, FetchError> {
        let html = self.fetch_diff_document(page_id).await?;
        Ok(content_hash(&html))
    }
}

#[async_trait]
impl WikiSource for WikiClient {
    async fn recent_days(&self) -> Result<Vec<DayGroup>, FetchError> {
        self.fetch_feed().await
    }

    async fn diff_document(&self, page_id: u64) -> Result<String, FetchError> {
        self.fetch_diff_document(page_id).await
    }

    fn diff_url(&self, page_id: u64) -> String {
        self.diff_page_url(page_id)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
