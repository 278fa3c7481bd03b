//! Article acquisition from the EOD Stock API news endpoint.
//!
//! The source performs exactly one request per fetch and never retries; a failed
//! fetch is reported to the caller, which degrades to an empty batch.

use crate::config::ContentApiConfig;
use crate::error::{Error, FetchError, Result};
use crate::types::Article;
use async_trait::async_trait;
use serde::Deserialize;
use std::num::NonZeroU32;
use tracing::debug;

/// Something that can hand the scheduler a bounded batch of articles
#[async_trait]
pub trait ArticleSource: Send + Sync {
    /// Fetch at most `limit` articles, in provider order
    async fn fetch(&self, limit: NonZeroU32) -> Result<Vec<Article>>;
}

/// Response envelope of the news API
#[derive(Debug, Deserialize)]
struct ArticlesEnvelope {
    status: bool,
    #[serde(default)]
    payload: Option<Vec<Article>>,
}

/// HTTP client for the news API
pub struct EodNewsClient {
    /// HTTP client for fetching articles
    http_client: reqwest::Client,

    /// Endpoint base, without trailing slash
    base_url: String,

    api_key: String,
}

impl EodNewsClient {
    /// Create a new news client
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: &ContentApiConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("eod-news-bot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn articles_url(&self, limit: NonZeroU32) -> String {
        format!(
            "{}/articles-bounded/{}?api_key={}",
            self.base_url,
            limit,
            urlencoding::encode(&self.api_key)
        )
    }

    /// Decode a response body into its article list
    fn parse_articles(body: &str, limit: NonZeroU32) -> Result<Vec<Article>> {
        let envelope: ArticlesEnvelope =
            serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;

        if !envelope.status {
            return Err(FetchError::Unsuccessful.into());
        }

        let mut articles = envelope.payload.unwrap_or_default();
        articles.truncate(limit.get() as usize);
        Ok(articles)
    }
}

#[async_trait]
impl ArticleSource for EodNewsClient {
    /// Fetch one bounded page of articles
    ///
    /// # Errors
    /// Returns error if:
    /// - the request fails or times out
    /// - the response status is not 2xx
    /// - the response is not JSON
    /// - the envelope reports `status: false`
    async fn fetch(&self, limit: NonZeroU32) -> Result<Vec<Article>> {
        debug!(limit = limit.get(), base_url = %self.base_url, "fetching articles");

        let response = self.http_client.get(self.articles_url(limit)).send().await?;

        // Check HTTP status before trying to parse the response body
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()).into());
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.to_ascii_lowercase().contains("application/json") {
            return Err(FetchError::ContentType(content_type).into());
        }

        let body = response.text().await?;
        let articles = Self::parse_articles(&body, limit)?;

        debug!(count = articles.len(), "fetched articles");
        Ok(articles)
    }
}
