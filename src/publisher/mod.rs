//! Post submission to the publishing platform.
//!
//! [`Publisher`] is the remote-platform seam (create a post, reply to a post);
//! [`Submitter`] wraps a publisher with the pipeline's submission rules and
//! reports a plain success flag. Retrying is the scheduler's job.

mod reddit;

pub use reddit::RedditClient;

use crate::error::Result;
use crate::retry::IsRetryable;
use crate::types::{Post, PostBody, SubmissionId};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Primary content of a post being created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostContent<'a> {
    /// Self-text body
    Text(&'a str),
    /// Media/link URL
    Link(&'a str),
}

/// Remote publishing platform
///
/// Implementations perform exactly one remote operation per call and never retry.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Create a post in `channel`, returning the platform-assigned id
    async fn create_post(
        &self,
        channel: &str,
        title: &str,
        content: PostContent<'_>,
    ) -> Result<SubmissionId>;

    /// Reply to an existing post, returning the id of the reply
    async fn reply(&self, parent: &SubmissionId, text: &str) -> Result<SubmissionId>;
}

/// Outcome of one submission attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Post created; `reply_failed` is set when the follow-up comment failed
    Submitted {
        /// Platform id of the created post
        id: SubmissionId,
        /// Whether the follow-up reply of a media post failed
        reply_failed: bool,
    },
    /// Post creation failed
    Failed {
        /// Whether the failure looks transient
        retryable: bool,
    },
}

/// Submits posts to one channel of a [`Publisher`]
#[derive(Clone)]
pub struct Submitter {
    publisher: Arc<dyn Publisher>,
    channel: String,
}

impl Submitter {
    /// Create a submitter targeting `channel`
    pub fn new(publisher: Arc<dyn Publisher>, channel: impl Into<String>) -> Self {
        Self {
            publisher,
            channel: channel.into(),
        }
    }

    /// Target channel
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Submit `post`, recording its submission id on success
    pub async fn submit(&self, post: &mut Post) -> bool {
        matches!(self.submit_detailed(post).await, SubmitOutcome::Submitted { .. })
    }

    /// Submit `post` and report what happened
    ///
    /// Only the post creation decides success. For media posts the composed text
    /// is then attached as a reply; a failed reply is logged and reported but the
    /// post still counts as submitted.
    pub async fn submit_detailed(&self, post: &mut Post) -> SubmitOutcome {
        let content = match post.body() {
            PostBody::SelfText(text) => PostContent::Text(text),
            PostBody::Media { url, .. } => PostContent::Link(url),
        };

        let id = match self
            .publisher
            .create_post(&self.channel, post.title(), content)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                let retryable = e.is_retryable();
                error!(
                    channel = %self.channel,
                    title = post.title(),
                    error = %e,
                    transient = retryable,
                    "failed to submit post"
                );
                return SubmitOutcome::Failed { retryable };
            }
        };

        info!(channel = %self.channel, id = %id, title = post.title(), "post submitted");

        let mut reply_failed = false;
        if let Some(reply) = post.follow_up_reply() {
            match self.publisher.reply(&id, reply).await {
                Ok(reply_id) => debug!(parent = %id, id = %reply_id, "follow-up reply posted"),
                Err(e) => {
                    reply_failed = true;
                    warn!(parent = %id, error = %e, "failed to post follow-up reply");
                }
            }
        }

        post.submission_id = Some(id.clone());
        SubmitOutcome::Submitted { id, reply_failed }
    }
}
