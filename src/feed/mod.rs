//! Podcast feed pipeline: fetch, extract, normalize, merge.
//!
//! - **Extraction**: two interchangeable XML extractors behind
//!   [`FeedExtractor`], chosen explicitly with [`ExtractionStrategy`]
//! - **Parsing**: raw items become normalized [`Episode`] records
//! - **Aggregation**: the show feed and the crossover feed are fetched
//!   concurrently, merged, de-duplicated and sorted by [`FeedAggregator`]
//! - **Passthrough**: the upstream RSS is re-served with item links pointing
//!   at local episode pages
//!
//! # Architecture
//!
//! - [`extract`] - element-tree and pattern-based extractors
//! - `parser` - per-item normalization
//! - `fetcher` - HTTP download with timeout and size cap
//! - `aggregator` - the stage machine and merge/sort rules
//! - `query` - lookups over a freshly fetched feed
//! - `passthrough` - link rewriting for the RSS endpoint
//!
//! # Example
//!
//! ```ignore
//! use spooky_feed::config::Config;
//! use spooky_feed::feed::{build_client, FeedAggregator};
//!
//! let aggregator = FeedAggregator::new(build_client()?, &Config::default());
//! let feed = aggregator.fetch_podcast_feed().await;
//! let newest = aggregator.latest_episodes(3).await;
//! ```

mod aggregator;
mod category;
pub mod extract;
mod fetcher;
mod parser;
mod passthrough;
mod query;
mod types;

pub use aggregator::{merge_episodes, sort_episodes, AggregateError, FeedAggregator, Stage};
pub use category::categorize;
pub use extract::{ExtractError, ExtractionStrategy, FeedExtractor, RawFeed, RawItem};
pub use fetcher::{build_client, fetch_feed, FetchError};
pub use parser::{parse_feed, parse_item, ParsedFeed, UNTITLED_EPISODE};
pub use passthrough::{error_document, rewrite_item_links, RssResponse, SlugIndex, RSS_CONTENT_TYPE};
pub use query::DEFAULT_LATEST_COUNT;
pub use types::{Category, Episode, EpisodeSource, PodcastFeed, DEFAULT_DESCRIPTION, DEFAULT_TITLE};
