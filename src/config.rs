//! Configuration types for eod-news-bot
//!
//! [`Config`] is built once at process start, either from serialized settings or
//! from the environment via [`Config::from_env`], and passed by reference into
//! [`EodNewsClient::new`](crate::source::EodNewsClient::new) and
//! [`RedditClient::new`](crate::publisher::RedditClient::new).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;

/// Env files consulted by [`Config::from_env`], in order
pub const ENV_FILES: &[&str] = &[".env.development", ".env"];

/// News API settings
#[derive(Clone, Serialize, Deserialize)]
pub struct ContentApiConfig {
    /// Base URL of the news endpoints (default: EOD Stock API gateway)
    #[serde(default = "default_content_base_url")]
    pub base_url: String,

    /// API key sent as the `api_key` query parameter
    pub api_key: String,

    /// Articles requested per cycle (default: 50)
    #[serde(default = "default_batch_limit")]
    pub batch_limit: u32,

    /// Request timeout (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

impl ContentApiConfig {
    /// Create a config with defaults for everything but the key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: default_content_base_url(),
            api_key: api_key.into(),
            batch_limit: default_batch_limit(),
            timeout: default_request_timeout(),
        }
    }

    /// Batch limit as a non-zero value
    pub fn limit(&self) -> Result<NonZeroU32> {
        NonZeroU32::new(self.batch_limit)
            .ok_or_else(|| Error::config("batch_limit", "batch_limit must be greater than 0"))
    }
}

impl std::fmt::Debug for ContentApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentApiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("batch_limit", &self.batch_limit)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Reddit API settings
#[derive(Clone, Serialize, Deserialize)]
pub struct RedditConfig {
    /// OAuth application client id
    pub client_id: String,

    /// OAuth application client secret
    pub client_secret: String,

    /// Account username
    pub username: String,

    /// Account password
    pub password: String,

    /// Subreddit posts are submitted to (without the `r/` prefix)
    pub subreddit: String,

    /// User agent override (default: derived from client id and username)
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Token endpoint (default: https://www.reddit.com/api/v1/access_token)
    #[serde(default = "default_reddit_auth_url")]
    pub auth_url: String,

    /// OAuth API base (default: https://oauth.reddit.com)
    #[serde(default = "default_reddit_api_url")]
    pub api_url: String,

    /// Request timeout (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

impl RedditConfig {
    /// User agent sent with every request
    pub fn user_agent(&self) -> String {
        self.user_agent.clone().unwrap_or_else(|| {
            format!(
                "rust:{}:{} (by /u/{})",
                self.client_id,
                env!("CARGO_PKG_VERSION"),
                self.username
            )
        })
    }
}

impl std::fmt::Debug for RedditConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedditConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("subreddit", &self.subreddit)
            .field("user_agent", &self.user_agent)
            .field("auth_url", &self.auth_url)
            .field("api_url", &self.api_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Submission retry policy
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Wait between failed submission attempts (default: 300 seconds)
    #[serde(default = "default_error_delay", with = "duration_serde")]
    pub error_delay: Duration,

    /// Give up on a post after this many attempts (default: None = retry forever)
    ///
    /// Setting this enables dead-lettering: a post that exhausts its attempts is
    /// dropped from the queue and reported instead of blocking the posts behind it.
    #[serde(default)]
    pub max_attempts: Option<u32>,

    /// Add random jitter to the delay (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            error_delay: default_error_delay(),
            max_attempts: None,
            jitter: false,
        }
    }
}

/// Periodic trigger settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Time between cycle starts (default: 1 hour)
    #[serde(default = "default_cycle_interval", with = "duration_serde")]
    pub cycle_interval: Duration,

    /// Run a cycle immediately on start (default: true)
    #[serde(default = "default_true")]
    pub run_on_start: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cycle_interval: default_cycle_interval(),
            run_on_start: true,
        }
    }
}

/// Main configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// News API
    pub content: ContentApiConfig,

    /// Reddit API
    pub reddit: RedditConfig,

    /// Submission retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Periodic trigger
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// `.env.development` and `.env` are loaded first if present; variables
    /// already set in the process environment take precedence.
    ///
    /// Required: `EOD_STOCK_API_KEY`, `REDDIT_CLIENT_ID`, `REDDIT_CLIENT_SECRET`,
    /// `REDDIT_USERNAME`, `REDDIT_PASSWORD`, `SUB_REDDIT`.
    ///
    /// Optional: `REDDIT_USER_AGENT`, `EOD_NEWS_BASE_URL`, `EOD_NEWS_BATCH_LIMIT`,
    /// `SUBMIT_ERROR_DELAY_SECS`, `SUBMIT_MAX_ATTEMPTS`, `CYCLE_INTERVAL_SECS`.
    pub fn from_env() -> Result<Self> {
        for file in ENV_FILES {
            if dotenvy::from_filename(file).is_ok() {
                tracing::debug!(file, "loaded env file");
            }
        }
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| Error::config(key, format!("{key} not set in environment")))
        };

        let mut content = ContentApiConfig::new(required("EOD_STOCK_API_KEY")?);
        if let Some(base_url) = lookup("EOD_NEWS_BASE_URL") {
            content.base_url = base_url;
        }
        if let Some(limit) = parse_var(&lookup, "EOD_NEWS_BATCH_LIMIT")? {
            content.batch_limit = limit;
        }

        let reddit = RedditConfig {
            client_id: required("REDDIT_CLIENT_ID")?,
            client_secret: required("REDDIT_CLIENT_SECRET")?,
            username: required("REDDIT_USERNAME")?,
            password: required("REDDIT_PASSWORD")?,
            subreddit: required("SUB_REDDIT")?,
            user_agent: lookup("REDDIT_USER_AGENT").filter(|v| !v.trim().is_empty()),
            auth_url: default_reddit_auth_url(),
            api_url: default_reddit_api_url(),
            timeout: default_request_timeout(),
        };

        let mut retry = RetryConfig::default();
        if let Some(secs) = parse_var(&lookup, "SUBMIT_ERROR_DELAY_SECS")? {
            retry.error_delay = Duration::from_secs(secs);
        }
        retry.max_attempts = parse_var(&lookup, "SUBMIT_MAX_ATTEMPTS")?;

        let mut scheduler = SchedulerConfig::default();
        if let Some(secs) = parse_var(&lookup, "CYCLE_INTERVAL_SECS")? {
            scheduler.cycle_interval = Duration::from_secs(secs);
        }

        let config = Self {
            content,
            reddit,
            retry,
            scheduler,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that serde defaults cannot express
    pub fn validate(&self) -> Result<()> {
        self.content.limit()?;

        url::Url::parse(&self.content.base_url)
            .map_err(|e| Error::config("base_url", format!("invalid news API URL: {e}")))?;
        url::Url::parse(&self.reddit.api_url)
            .map_err(|e| Error::config("api_url", format!("invalid Reddit API URL: {e}")))?;
        url::Url::parse(&self.reddit.auth_url)
            .map_err(|e| Error::config("auth_url", format!("invalid Reddit auth URL: {e}")))?;

        let credentials = [
            ("api_key", &self.content.api_key),
            ("client_id", &self.reddit.client_id),
            ("client_secret", &self.reddit.client_secret),
            ("username", &self.reddit.username),
            ("password", &self.reddit.password),
            ("subreddit", &self.reddit.subreddit),
        ];
        for (key, value) in credentials {
            if value.trim().is_empty() {
                return Err(Error::config(key, format!("{key} must not be empty")));
            }
        }

        if self.retry.max_attempts == Some(0) {
            return Err(Error::config(
                "max_attempts",
                "max_attempts must be at least 1 when set",
            ));
        }
        if self.retry.error_delay.is_zero() {
            return Err(Error::config(
                "error_delay",
                "error_delay must be greater than 0",
            ));
        }
        if self.scheduler.cycle_interval.is_zero() {
            return Err(Error::config(
                "cycle_interval",
                "cycle_interval must be greater than 0",
            ));
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::config(key, format!("{key} is invalid: {e}"))),
        _ => Ok(None),
    }
}

fn default_content_base_url() -> String {
    "https://gateway.eod-stock-api.site/api/v1/news".to_string()
}

fn default_batch_limit() -> u32 {
    50
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_reddit_auth_url() -> String {
    "https://www.reddit.com/api/v1/access_token".to_string()
}

fn default_reddit_api_url() -> String {
    "https://oauth.reddit.com".to_string()
}

fn default_error_delay() -> Duration {
    Duration::from_secs(300)
}

fn default_cycle_interval() -> Duration {
    Duration::from_secs(3600)
}

fn default_true() -> bool {
    true
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
