use super::aggregator::FeedAggregator;
use super::types::Episode;

/// How many episodes a "latest episodes" teaser shows by default.
pub const DEFAULT_LATEST_COUNT: usize = 2;

/// Convenience lookups over a freshly fetched feed.
///
/// Each call runs the full pipeline once. None of them fail: when the
/// pipeline degrades they simply see the empty fallback feed.
impl FeedAggregator {
    /// The first `count` episodes in feed order (newest first).
    pub async fn latest_episodes(&self, count: usize) -> Vec<Episode> {
        self.fetch_podcast_feed().await.latest_episodes(count).to_vec()
    }

    pub async fn all_episodes(&self) -> Vec<Episode> {
        self.fetch_podcast_feed().await.episodes
    }

    /// Episodes whose category display name equals `category` exactly.
    pub async fn episodes_by_category(&self, category: &str) -> Vec<Episode> {
        self.fetch_podcast_feed()
            .await
            .episodes_by_category(category)
            .cloned()
            .collect()
    }

    /// First episode with this id, if any.
    pub async fn episode_by_id(&self, id: &str) -> Option<Episode> {
        self.fetch_podcast_feed().await.episode_by_id(id).cloned()
    }

    /// First episode with this slug, if any.
    pub async fn episode_by_slug(&self, slug: &str) -> Option<Episode> {
        self.fetch_podcast_feed().await.episode_by_slug(slug).cloned()
    }
}
