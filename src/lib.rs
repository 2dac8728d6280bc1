//! Feed ingestion for the Spooky Bitch Show site.
//!
//! Fetches the show's podcast RSS (plus crossover episodes from a shared
//! feed), normalizes every item into an [`feed::Episode`], and re-serves the
//! upstream RSS with links pointing at local episode pages.

pub mod config;
pub mod feed;
pub mod util;
