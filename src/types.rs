//! Core types for eod-news-bot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ComposeError;

/// Article as returned by the news API
///
/// Every field is lenient on the wire: the API omits or nulls fields freely,
/// and validation happens at composition time rather than at decode time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// Provider-assigned identifier
    #[serde(default)]
    pub uuid: Option<String>,

    /// Headline
    #[serde(default)]
    pub title: Option<String>,

    /// Canonical link to the article
    #[serde(default)]
    pub link: String,

    /// Publisher name
    #[serde(default)]
    pub publisher: Option<String>,

    /// Publication date as formatted by the provider
    #[serde(default)]
    pub datetime_published: Option<String>,

    /// Publication time in seconds since epoch
    #[serde(default, rename = "providerPublishTime")]
    pub provider_publish_time: Option<i64>,

    /// Article type ("STORY", "VIDEO", ...)
    #[serde(default, rename = "type")]
    pub kind: Option<String>,

    /// Sentiment analysis and summaries
    #[serde(default)]
    pub sentiment: Option<Sentiment>,

    /// Thumbnail images at several resolutions
    #[serde(default)]
    pub thumbnail: Option<Thumbnail>,

    /// Associated ticker symbols
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tickers: Vec<String>,
}

/// Sentiment block attached to an article
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    /// Full article text
    #[serde(default)]
    pub article: Option<String>,

    /// Short summary
    #[serde(default)]
    pub article_tldr: Option<String>,

    /// Link the sentiment was computed from
    #[serde(default)]
    pub link: Option<String>,

    /// Sentiment of the article body
    #[serde(default)]
    pub sentiment_article: Option<String>,

    /// Sentiment of the headline
    #[serde(default)]
    pub sentiment_title: Option<String>,

    /// Stock codes mentioned in the article
    #[serde(default, deserialize_with = "null_as_empty")]
    pub stock_codes: Vec<String>,
}

/// Thumbnail image set
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Thumbnail {
    /// Available resolutions, provider order
    #[serde(default, deserialize_with = "null_as_empty")]
    pub resolutions: Vec<Resolution>,
}

/// One thumbnail resolution
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Image URL
    pub url: String,
    /// Width in pixels
    #[serde(default)]
    pub width: u32,
    /// Height in pixels
    #[serde(default)]
    pub height: u32,
    /// Provider tag ("original", "140x140", ...)
    #[serde(default)]
    pub tag: String,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Identifier assigned by the publishing platform to a created post or comment
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(pub String);

impl SubmissionId {
    /// Create a new SubmissionId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a post carries: self-text or a single media link, never both
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostBody {
    /// Text post
    SelfText(String),
    /// Link post, with the composed text posted afterwards as a comment
    Media {
        /// Media URL used as the post's primary content
        url: String,
        /// Text to attach as a follow-up reply
        reply: String,
    },
}

/// A post queued for submission
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    title: String,
    body: PostBody,
    /// Creation time in seconds since epoch (UTC)
    pub created_utc: i64,
    /// Platform id, set once the post has been submitted
    pub submission_id: Option<SubmissionId>,
}

impl Post {
    /// Build a post, rejecting a blank title or an empty body
    pub fn new(
        title: impl Into<String>,
        body: PostBody,
        created_at: DateTime<Utc>,
    ) -> std::result::Result<Self, ComposeError> {
        let title = title.into().trim().to_string();
        if title.is_empty() {
            return Err(ComposeError::MissingTitle);
        }
        let empty = match &body {
            PostBody::SelfText(text) => text.trim().is_empty(),
            PostBody::Media { url, .. } => url.trim().is_empty(),
        };
        if empty {
            return Err(ComposeError::EmptyBody);
        }
        Ok(Self {
            title,
            body,
            created_utc: created_at.timestamp(),
            submission_id: None,
        })
    }

    /// Post title
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Post body
    pub fn body(&self) -> &PostBody {
        &self.body
    }

    /// Self-text, when this is a text post
    pub fn self_text(&self) -> Option<&str> {
        match &self.body {
            PostBody::SelfText(text) => Some(text),
            PostBody::Media { .. } => None,
        }
    }

    /// Media URL, when this is a link post
    pub fn media_link(&self) -> Option<&str> {
        match &self.body {
            PostBody::Media { url, .. } => Some(url),
            PostBody::SelfText(_) => None,
        }
    }

    /// Text planned as a follow-up comment (link posts only)
    pub fn follow_up_reply(&self) -> Option<&str> {
        match &self.body {
            PostBody::Media { reply, .. } if !reply.trim().is_empty() => Some(reply),
            _ => None,
        }
    }

    /// Whether the post has been submitted
    pub fn is_submitted(&self) -> bool {
        self.submission_id.is_some()
    }
}

/// Scheduler cycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleState {
    /// No cycle running
    Idle,
    /// Pulling articles from the news API
    Fetching,
    /// Turning articles into posts
    Composing,
    /// Draining the pending-posts queue
    Submitting,
}

impl std::fmt::Display for CycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CycleState::Idle => "idle",
            CycleState::Fetching => "fetching",
            CycleState::Composing => "composing",
            CycleState::Submitting => "submitting",
        };
        f.write_str(s)
    }
}
