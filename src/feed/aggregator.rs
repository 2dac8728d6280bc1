use futures::FutureExt;
use std::cmp::Reverse;
use std::collections::HashSet;
use std::fmt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use thiserror::Error;

use super::extract::{ExtractError, ExtractionStrategy};
use super::fetcher::{fetch_feed, FetchError};
use super::parser::parse_feed;
use super::types::{Episode, PodcastFeed, DEFAULT_DESCRIPTION, DEFAULT_TITLE};
use crate::config::Config;

/// Pipeline stages, logged as the aggregator advances.
///
/// `Degraded` is terminal and reachable from every other stage; it means the
/// caller receives [`PodcastFeed::fallback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetching,
    Parsing,
    Merging,
    Ready,
    Degraded,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Fetching => "fetching",
            Stage::Parsing => "parsing",
            Stage::Merging => "merging",
            Stage::Ready => "ready",
            Stage::Degraded => "degraded",
        })
    }
}

/// Failures that degrade the whole pipeline. Secondary feed problems never
/// show up here.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("Primary feed fetch failed: {0}")]
    PrimaryFetch(#[source] FetchError),

    #[error("Primary feed parse failed: {0}")]
    PrimaryParse(#[source] ExtractError),
}

impl AggregateError {
    /// Stage the pipeline was in when it failed.
    pub fn stage(&self) -> Stage {
        match self {
            AggregateError::PrimaryFetch(_) => Stage::Fetching,
            AggregateError::PrimaryParse(_) => Stage::Parsing,
        }
    }
}

/// Fetches the show feed (and optionally the crossover feed) and assembles
/// one [`PodcastFeed`].
///
/// Nothing is cached: every call performs fresh requests.
#[derive(Debug, Clone)]
pub struct FeedAggregator {
    client: reqwest::Client,
    primary_url: String,
    secondary_url: Option<String>,
    /// Lowercased show name a crossover item's title must contain.
    crossover_marker: String,
    strategy: ExtractionStrategy,
    timeout: Duration,
}

impl FeedAggregator {
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            primary_url: config.primary_feed_url.clone(),
            secondary_url: config.secondary_feed_url.clone(),
            crossover_marker: config.crossover_marker.to_lowercase(),
            strategy: config.extraction,
            timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    /// Overrides the extraction strategy chosen by the config.
    pub fn with_strategy(mut self, strategy: ExtractionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn strategy(&self) -> ExtractionStrategy {
        self.strategy
    }

    pub(crate) fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub(crate) fn primary_url(&self) -> &str {
        &self.primary_url
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs the full pipeline and never fails.
    ///
    /// Any error, and any panic inside the pipeline, is logged and replaced
    /// by [`PodcastFeed::fallback`].
    pub async fn fetch_podcast_feed(&self) -> PodcastFeed {
        match AssertUnwindSafe(self.try_fetch_podcast_feed())
            .catch_unwind()
            .await
        {
            Ok(Ok(feed)) => feed,
            Ok(Err(e)) => {
                tracing::error!(
                    stage = %e.stage(),
                    url = %self.primary_url,
                    error = %e,
                    "Feed pipeline degraded, serving fallback feed"
                );
                PodcastFeed::fallback()
            }
            Err(panic) => {
                tracing::error!(
                    stage = %Stage::Degraded,
                    url = %self.primary_url,
                    panic = %panic_message(panic.as_ref()),
                    "Feed pipeline panicked, serving fallback feed"
                );
                PodcastFeed::fallback()
            }
        }
    }

    /// Runs the pipeline, surfacing primary feed failures.
    ///
    /// # Errors
    ///
    /// - [`AggregateError::PrimaryFetch`] - the show feed could not be downloaded
    /// - [`AggregateError::PrimaryParse`] - the show feed is not well-formed XML
    ///   (document strategy only)
    pub async fn try_fetch_podcast_feed(&self) -> Result<PodcastFeed, AggregateError> {
        tracing::debug!(stage = %Stage::Fetching, primary = %self.primary_url, secondary = ?self.secondary_url);

        let secondary = async {
            match &self.secondary_url {
                Some(url) => Some(fetch_feed(&self.client, url, self.timeout).await),
                None => None,
            }
        };
        let (primary, secondary) = tokio::join!(
            fetch_feed(&self.client, &self.primary_url, self.timeout),
            secondary
        );
        let primary_xml = primary.map_err(AggregateError::PrimaryFetch)?;

        tracing::debug!(stage = %Stage::Parsing, strategy = %self.strategy, bytes = primary_xml.len());
        let primary = parse_feed(&primary_xml, self.strategy).map_err(AggregateError::PrimaryParse)?;

        let external = match secondary {
            Some(Ok(xml)) => self.crossover_episodes(&xml),
            Some(Err(e)) => {
                tracing::warn!(
                    url = ?self.secondary_url,
                    error = %e,
                    "Secondary feed unavailable, continuing without crossover episodes"
                );
                Vec::new()
            }
            None => Vec::new(),
        };

        tracing::debug!(stage = %Stage::Merging, primary = primary.episodes.len(), external = external.len());
        let mut episodes = merge_episodes(primary.episodes, external);
        sort_episodes(&mut episodes);

        tracing::info!(stage = %Stage::Ready, episodes = episodes.len(), "Podcast feed assembled");

        Ok(PodcastFeed {
            title: non_empty_or(primary.title, DEFAULT_TITLE),
            description: non_empty_or(primary.description, DEFAULT_DESCRIPTION),
            episodes,
        })
    }

    /// Parses the shared crossover feed and keeps only items about this show.
    fn crossover_episodes(&self, xml: &str) -> Vec<Episode> {
        let parsed = match parse_feed(xml, self.strategy) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(
                    url = ?self.secondary_url,
                    error = %e,
                    "Secondary feed unparseable, continuing without crossover episodes"
                );
                return Vec::new();
            }
        };

        let total = parsed.episodes.len();
        let accepted: Vec<Episode> = parsed
            .episodes
            .into_iter()
            .filter(|e| is_crossover(&e.title, &self.crossover_marker))
            .map(Episode::into_external)
            .collect();

        tracing::debug!(total = total, accepted = accepted.len(), "Filtered crossover feed");
        accepted
    }
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn non_empty_or(value: String, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value
    }
}

/// Whether a crossover item belongs to this show. `marker` must be lowercase.
fn is_crossover(title: &str, marker: &str) -> bool {
    title.to_lowercase().contains(marker)
}

/// Concatenates primary then external episodes and drops duplicates by
/// [`Episode::dedup_key`]. The first occurrence wins, so primary episodes
/// take precedence.
pub fn merge_episodes(primary: Vec<Episode>, external: Vec<Episode>) -> Vec<Episode> {
    let mut seen = HashSet::new();
    primary
        .into_iter()
        .chain(external)
        .filter(|episode| seen.insert(episode.dedup_key()))
        .collect()
}

fn episode_number(episode: &Episode) -> Option<u64> {
    episode.id.parse().ok()
}

/// Orders episodes newest first.
///
/// When every id is an integer the order is by id, descending. Otherwise
/// the whole list is ordered by publication timestamp, descending, with
/// unparseable dates counted as 0. The sort is stable.
pub fn sort_episodes(episodes: &mut [Episode]) {
    if episodes.iter().all(|e| episode_number(e).is_some()) {
        episodes.sort_by_key(|e| Reverse(episode_number(e)));
    } else {
        episodes.sort_by_key(|e| Reverse(e.published_at.unwrap_or(0)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::types::{Category, EpisodeSource};
    use pretty_assertions::assert_eq;

    fn episode(id: &str, guid: &str, published_at: Option<i64>) -> Episode {
        Episode {
            id: id.to_string(),
            title: format!("Folge {}", id),
            slug: format!("folge-{}", id),
            description: String::new(),
            pub_date: String::new(),
            duration: "0:00".to_string(),
            audio_url: String::new(),
            category: Category::TrueStory,
            image_url: String::new(),
            guid: guid.to_string(),
            is_podfluencer: false,
            source: EpisodeSource::Primary,
            published_at,
        }
    }

    fn ids(episodes: &[Episode]) -> Vec<&str> {
        episodes.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn test_sort_numeric_descending() {
        let mut episodes = vec![
            episode("3", "a", None),
            episode("1", "b", None),
            episode("2", "c", None),
        ];
        sort_episodes(&mut episodes);
        assert_eq!(ids(&episodes), vec!["3", "2", "1"]);
    }

    #[test]
    fn test_sort_numeric_not_lexicographic() {
        let mut episodes = vec![episode("9", "a", None), episode("10", "b", None)];
        sort_episodes(&mut episodes);
        assert_eq!(ids(&episodes), vec!["10", "9"]);
    }

    #[test]
    fn test_sort_falls_back_to_timestamp() {
        let mut episodes = vec![
            episode("bonus", "a", Some(100)),
            episode("x", "b", Some(300)),
            episode("y", "c", None),
            episode("z", "d", Some(200)),
        ];
        sort_episodes(&mut episodes);
        assert_eq!(ids(&episodes), vec!["x", "z", "bonus", "y"]);
    }

    #[test]
    fn test_sort_is_stable_for_equal_ids() {
        let mut episodes = vec![episode("5", "first", None), episode("5", "second", None)];
        sort_episodes(&mut episodes);
        assert_eq!(episodes[0].guid, "first");
    }

    #[test]
    fn test_merge_drops_duplicate_guid_keeping_first() {
        let merged = merge_episodes(
            vec![episode("1", "same", None), episode("2", "same", None)],
            Vec::new(),
        );
        assert_eq!(ids(&merged), vec!["1"]);
    }

    #[test]
    fn test_merge_primary_wins_over_external() {
        let external = episode("1", "shared", None).into_external();
        let merged = merge_episodes(vec![episode("1", "shared", None)], vec![external]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].source, EpisodeSource::Primary);
    }

    #[test]
    fn test_merge_keeps_distinct_episodes_in_order() {
        let merged = merge_episodes(
            vec![episode("2", "a", None)],
            vec![episode("7", "b", None).into_external()],
        );
        assert_eq!(ids(&merged), vec!["2", "7"]);
    }

    #[test]
    fn test_crossover_marker_case_insensitive() {
        assert!(is_crossover("Spooky Bitch Show Crossover", "spooky bitch show"));
        assert!(is_crossover("Zu Gast: SPOOKY BITCH SHOW", "spooky bitch show"));
        assert!(!is_crossover("Die Podfluencer Show", "spooky bitch show"));
    }

    #[test]
    fn test_panic_message() {
        let payload = std::panic::catch_unwind(|| panic!("boom {}", 1)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom 1");
        let payload = std::panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "static");
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Degraded.to_string(), "degraded");
        let err = AggregateError::PrimaryFetch(FetchError::HttpStatus(503));
        assert_eq!(err.stage(), Stage::Fetching);
        assert!(err.to_string().contains("503"));
    }
}
