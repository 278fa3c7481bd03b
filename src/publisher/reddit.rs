//! Reddit API client.
//!
//! Uses the OAuth2 password grant (script apps) to obtain a bearer token, caches
//! it until shortly before expiry, and talks to `oauth.reddit.com` with it.

use super::{PostContent, Publisher};
use crate::config::RedditConfig;
use crate::error::{Error, PublishError, Result};
use crate::types::SubmissionId;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

/// Refresh the token this long before Reddit says it expires
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Used when the token response omits `expires_in`
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + TOKEN_REFRESH_MARGIN < self.expires_at
    }
}

/// `{"json": {"errors": [...], "data": {...}}}` as returned with `api_type=json`
#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    json: ApiBody,
}

#[derive(Debug, Deserialize)]
struct ApiBody {
    #[serde(default)]
    errors: Vec<Value>,
    #[serde(default)]
    data: Option<Value>,
}

/// Reddit client implementing [`Publisher`]
pub struct RedditClient {
    http_client: reqwest::Client,
    auth_url: String,
    api_url: String,
    client_id: String,
    client_secret: String,
    username: String,
    password: String,
    token: Mutex<Option<AccessToken>>,
}

impl RedditClient {
    /// Create a new Reddit client
    ///
    /// No request is made until the first post; the token is fetched lazily.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: &RedditConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent())
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            auth_url: config.auth_url.clone(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            token: Mutex::new(None),
        })
    }

    /// Return a cached token or fetch a new one
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.value.clone());
        }

        let token = self.request_token().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    async fn request_token(&self) -> Result<AccessToken> {
        debug!(username = %self.username, "requesting Reddit access token");

        let response = self
            .http_client
            .post(&self.auth_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "password"),
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PublishError::Auth(format!("token endpoint returned HTTP {}", status)).into());
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| PublishError::Auth(format!("unreadable token response: {}", e)))?;

        match body.access_token {
            Some(value) if !value.is_empty() => {
                let lifetime = body
                    .expires_in
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_TOKEN_LIFETIME);
                let now = Instant::now();
                let expires_at = now
                    .checked_add(lifetime)
                    .unwrap_or(now + DEFAULT_TOKEN_LIFETIME);
                info!(expires_in_secs = lifetime.as_secs(), "Reddit authentication successful");
                Ok(AccessToken { value, expires_at })
            }
            _ => Err(PublishError::Auth(
                body.error.unwrap_or_else(|| "no access_token in response".to_string()),
            )
            .into()),
        }
    }

    /// POST a form to an OAuth API endpoint and return the `json.data` object
    async fn post_api(&self, endpoint: &str, form: &[(&str, &str)]) -> Result<Value> {
        let token = self.access_token().await?;
        let url = format!("{}{}", self.api_url, endpoint);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token)
            .form(form)
            .send()
            .await?;

        let status = response.status();
        match status.as_u16() {
            200..=299 => {}
            401 | 403 => {
                self.invalidate_token().await;
                return Err(PublishError::Unauthorized.into());
            }
            429 => return Err(PublishError::RateLimited.into()),
            code => return Err(PublishError::Status(code).into()),
        }

        let envelope: ApiEnvelope = response
            .json()
            .await
            .map_err(|e| PublishError::MalformedResponse(e.to_string()))?;

        if !envelope.json.errors.is_empty() {
            return Err(PublishError::Rejected(describe_errors(&envelope.json.errors)).into());
        }

        envelope
            .json
            .data
            .ok_or_else(|| PublishError::MalformedResponse("missing json.data".to_string()).into())
    }
}

/// Render Reddit's `[[code, message, field], ...]` error list
fn describe_errors(errors: &[Value]) -> String {
    errors
        .iter()
        .map(|e| match e.as_array() {
            Some(parts) => parts
                .iter()
                .filter_map(Value::as_str)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(": "),
            None => e.to_string(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Post id from a submit response, without the `t3_` kind prefix
fn submission_id_from(data: &Value) -> Option<SubmissionId> {
    data.get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| {
            data.get("name")
                .and_then(Value::as_str)
                .map(|name| name.trim_start_matches("t3_").to_string())
        })
        .filter(|id| !id.is_empty())
        .map(SubmissionId)
}

/// Comment id from a comment response (`data.things[0].data.id`)
fn comment_id_from(data: &Value) -> Option<SubmissionId> {
    data.pointer("/things/0/data/id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(SubmissionId::new)
}

#[async_trait]
impl Publisher for RedditClient {
    async fn create_post(
        &self,
        channel: &str,
        title: &str,
        content: PostContent<'_>,
    ) -> Result<SubmissionId> {
        let (kind, field, value) = match content {
            PostContent::Text(text) => ("self", "text", text),
            PostContent::Link(url) => ("link", "url", url),
        };

        let data = self
            .post_api(
                "/api/submit",
                &[
                    ("sr", channel),
                    ("kind", kind),
                    ("title", title),
                    (field, value),
                    ("resubmit", "true"),
                    ("api_type", "json"),
                ],
            )
            .await?;

        submission_id_from(&data).ok_or_else(|| {
            PublishError::MalformedResponse("submit response has no post id".to_string()).into()
        })
    }

    async fn reply(&self, parent: &SubmissionId, text: &str) -> Result<SubmissionId> {
        let thing_id = format!("t3_{}", parent);
        let data = self
            .post_api(
                "/api/comment",
                &[
                    ("thing_id", thing_id.as_str()),
                    ("text", text),
                    ("api_type", "json"),
                ],
            )
            .await?;

        comment_id_from(&data).ok_or_else(|| {
            PublishError::MalformedResponse("comment response has no comment id".to_string())
                .into()
        })
    }
}
