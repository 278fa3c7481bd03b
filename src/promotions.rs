//! Evergreen promotional posts submitted ahead of fetched news every cycle.

use chrono::{DateTime, Utc};

use crate::types::{Post, PostBody};

/// Compile-time promotional post template
#[derive(Debug, Clone, Copy)]
pub struct PromotionalTemplate {
    /// Post title
    pub title: &'static str,
    /// Self-text body
    pub body: &'static str,
}

/// Promotional posts, in submission order
pub const PROMOTIONAL_POSTS: &[PromotionalTemplate] = &[
    PromotionalTemplate {
        title: "EOD Stock API - End-of-day market data for developers",
        body: "Looking for reliable end-of-day stock prices, fundamentals and financial \
               news in a single JSON API? EOD Stock API covers global exchanges with a \
               free tier to get you started.\n https://eod-stock-api.site",
    },
    PromotionalTemplate {
        title: "Financial news with sentiment analysis, straight from an API",
        body: "Every article in the EOD Stock API news feed ships with a short summary, \
               sentiment scores and the tickers it mentions. Build dashboards, alerts or \
               bots without scraping.\n https://eod-stock-api.site/plans",
    },
];

/// Materialize the promotional templates as posts stamped with `now`
pub fn promotional_posts(now: DateTime<Utc>) -> Vec<Post> {
    PROMOTIONAL_POSTS
        .iter()
        .filter_map(|template| {
            match Post::new(template.title, PostBody::SelfText(template.body.into()), now) {
                Ok(post) => Some(post),
                Err(e) => {
                    tracing::error!(title = template.title, error = %e, "invalid promotional template");
                    None
                }
            }
        })
        .collect()
}
