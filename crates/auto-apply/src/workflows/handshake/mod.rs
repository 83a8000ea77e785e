//! Recruiting platform adapter: HTTP session, feed mapping and token scraping.

mod client;
mod cookies;
mod csrf;
pub mod feed;

pub use client::HandshakeClient;
pub use feed::{page_url, parse_page, platform_origin, sanitize_feed_url, FeedEntryError};
