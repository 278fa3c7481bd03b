//! Common test utilities for eod-news-bot integration tests


#[allow(unused_imports)]
pub use fixtures::*;
