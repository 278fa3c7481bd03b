//! Article to post composition.
//!
//! Composition is pure apart from the creation timestamp:
//!
//! 1. Self-text is the first non-blank of the article summary, the full
//!    sentiment text, and the title, followed by the article link.
//! 2. If the article has a thumbnail, the first resolution becomes the post's
//!    media link and the self-text moves to a follow-up reply.
//! 3. A missing title fails composition for that article only.

use chrono::{DateTime, Utc};

use crate::error::ComposeError;
use crate::types::{Article, Post, PostBody};

/// Compose a post stamped with the current UTC time
pub fn compose(article: &Article) -> Result<Post, ComposeError> {
    compose_at(article, Utc::now())
}

/// Compose a post stamped with `now`
pub fn compose_at(article: &Article, now: DateTime<Utc>) -> Result<Post, ComposeError> {
    let title = non_blank(article.title.as_deref()).ok_or(ComposeError::MissingTitle)?;
    let text = self_text(article, title);

    let body = match media_link(article) {
        Some(url) => PostBody::Media {
            url: url.to_string(),
            reply: text,
        },
        None => PostBody::SelfText(text),
    };

    Post::new(title, body, now)
}

fn self_text(article: &Article, title: &str) -> String {
    let sentiment = article.sentiment.as_ref();
    let chosen = sentiment
        .and_then(|s| non_blank(s.article_tldr.as_deref()))
        .or_else(|| sentiment.and_then(|s| non_blank(s.sentiment_article.as_deref())))
        .unwrap_or(title);

    match non_blank(Some(&article.link)) {
        Some(link) => format!("{chosen}\n {link}"),
        None => chosen.to_string(),
    }
}

fn media_link(article: &Article) -> Option<&str> {
    article
        .thumbnail
        .as_ref()
        .and_then(|t| t.resolutions.first())
        .and_then(|r| non_blank(Some(&r.url)))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}
