//! Error types for eod-news-bot
//!
//! This module provides the error hierarchy for the pipeline:
//! - Fetch errors from the news API (degraded to an empty batch by the scheduler)
//! - Compose errors for malformed articles (the article is skipped)
//! - Publish errors from Reddit (drive the submission retry loop)
//! - Configuration errors surfaced at startup

use thiserror::Error;

/// Result type alias for eod-news-bot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for eod-news-bot
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "EOD_STOCK_API_KEY")
        key: Option<String>,
    },

    /// Article fetch failed
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Article could not be turned into a post
    #[error("compose error: {0}")]
    Compose(#[from] ComposeError),

    /// Publishing platform rejected or failed a request
    #[error("publish error: {0}")]
    Publish(#[from] PublishError),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// News API fetch errors
#[derive(Debug, Error)]
pub enum FetchError {
    /// Non-2xx HTTP status
    #[error("news API returned HTTP {0}")]
    Status(u16),

    /// Response was not JSON
    #[error("unexpected content type: {0}")]
    ContentType(String),

    /// Response decoded but reported `status: false`
    #[error("news API reported an unsuccessful response")]
    Unsuccessful,

    /// Response body could not be decoded
    #[error("failed to decode news API response: {0}")]
    Decode(String),
}

/// Post composition errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComposeError {
    /// Article has no usable title
    #[error("article has no title")]
    MissingTitle,

    /// Neither self-text nor media link could be produced
    #[error("post has neither self-text nor a media link")]
    EmptyBody,
}

/// Publishing platform errors
#[derive(Debug, Error)]
pub enum PublishError {
    /// OAuth token request failed
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Bearer token was rejected (401/403)
    #[error("request unauthorized")]
    Unauthorized,

    /// Platform rate limit hit (429)
    #[error("rate limited by platform")]
    RateLimited,

    /// Any other non-2xx status
    #[error("platform returned HTTP {0}")]
    Status(u16),

    /// Platform accepted the request but reported errors in the body
    #[error("platform rejected request: {0}")]
    Rejected(String),

    /// Response body did not have the expected shape
    #[error("malformed platform response: {0}")]
    MalformedResponse(String),
}
