use crate::normalizer;
use crate::types::{DigestError, FeedSnapshot, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "feed-digest/0.1".to_string(),
            timeout_seconds: 30,
        }
    }
}

/// Source of feed snapshots. The pipeline only ever talks to this seam, so
/// tests can substitute a canned feed for the HTTP stack.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_snapshot(&self, url: &str) -> Result<FeedSnapshot>;
}

pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()?;
        Ok(Self { client })
    }

    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        Url::parse(url)?;
        debug!("Fetching feed: {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DigestError::Fetch(format!(
                "HTTP {}: {}",
                status,
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let body = response.bytes().await?;
        info!("Fetched feed: {} ({} bytes)", url, body.len());
        Ok(body.to_vec())
    }
}

/// Production feed source: HTTP fetch plus feed normalization.
pub struct HttpFeedSource {
    fetcher: FeedFetcher,
}

impl HttpFeedSource {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        Ok(Self {
            fetcher: FeedFetcher::new(config)?,
        })
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch_snapshot(&self, url: &str) -> Result<FeedSnapshot> {
        let body = self.fetcher.fetch(url).await?;
        normalizer::normalize(&body)
    }
}
