use serde::Serialize;
use std::fmt;

/// Show title used whenever the feed itself cannot provide one.
pub const DEFAULT_TITLE: &str = "Spooky Bitch Show";

/// Channel description used for the fallback feed.
pub const DEFAULT_DESCRIPTION: &str = "Der Grusel und Mystery Podcast";

// ============================================================================
// Category
// ============================================================================

/// Episode category, decided from keywords in the item's artwork URL.
///
/// Serializes to the display strings the site's category pages use
/// (`"true crime"`, `"podfluencer-folgen"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Category {
    #[serde(rename = "halloween")]
    Halloween,
    #[serde(rename = "true crime")]
    TrueCrime,
    #[serde(rename = "paranormal")]
    Paranormal,
    #[serde(rename = "mystic")]
    Mystic,
    #[serde(rename = "creature")]
    Creature,
    #[serde(rename = "filmreview")]
    FilmReview,
    #[serde(rename = "creepypasta")]
    Creepypasta,
    #[serde(rename = "news")]
    News,
    #[default]
    #[serde(rename = "true story")]
    TrueStory,
    #[serde(rename = "spookylivereport")]
    SpookyLiveReport,
    #[serde(rename = "projecteverest")]
    ProjectEverest,
    /// Only assigned to crossover episodes from the external feed.
    #[serde(rename = "podfluencer-folgen")]
    PodfluencerFolgen,
}

impl Category {
    pub const ALL: [Category; 12] = [
        Category::Halloween,
        Category::TrueCrime,
        Category::Paranormal,
        Category::Mystic,
        Category::Creature,
        Category::FilmReview,
        Category::Creepypasta,
        Category::News,
        Category::TrueStory,
        Category::SpookyLiveReport,
        Category::ProjectEverest,
        Category::PodfluencerFolgen,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Halloween => "halloween",
            Category::TrueCrime => "true crime",
            Category::Paranormal => "paranormal",
            Category::Mystic => "mystic",
            Category::Creature => "creature",
            Category::FilmReview => "filmreview",
            Category::Creepypasta => "creepypasta",
            Category::News => "news",
            Category::TrueStory => "true story",
            Category::SpookyLiveReport => "spookylivereport",
            Category::ProjectEverest => "projecteverest",
            Category::PodfluencerFolgen => "podfluencer-folgen",
        }
    }

    /// Looks up a category by its display string.
    pub fn from_name(name: &str) -> Option<Category> {
        Category::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Episode
// ============================================================================

/// Which upstream feed an episode came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EpisodeSource {
    #[default]
    Primary,
    External,
}

/// One normalized podcast episode, ready for rendering.
///
/// Field names serialize in camelCase (`pubDate`, `audioUrl`, ...) for the
/// page templates. Records are never mutated after parsing; transformations
/// such as [`Episode::into_external`] build new values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    /// Episode number from `#<digits>` in the title, or a positional ordinal.
    pub id: String,
    pub title: String,
    pub slug: String,
    /// Feed HTML with marker phrases wrapped in presentation markup.
    pub description: String,
    /// German display date, or the raw feed value if it did not parse.
    pub pub_date: String,
    pub duration: String,
    pub audio_url: String,
    pub category: Category,
    pub image_url: String,
    pub guid: String,
    pub is_podfluencer: bool,
    pub source: EpisodeSource,
    /// Unix timestamp of the raw pubDate, used for ordering.
    #[serde(skip)]
    pub published_at: Option<i64>,
}

impl Episode {
    /// Converts an episode from the shared crossover feed into a
    /// podfluencer episode: no artwork, dedicated category, external source.
    pub fn into_external(self) -> Episode {
        Episode {
            image_url: String::new(),
            category: Category::PodfluencerFolgen,
            is_podfluencer: true,
            source: EpisodeSource::External,
            ..self
        }
    }

    /// Key used to drop duplicates when merging sources.
    ///
    /// guid first, then slug, then title + pubDate.
    pub fn dedup_key(&self) -> String {
        if !self.guid.is_empty() {
            self.guid.clone()
        } else if !self.slug.is_empty() {
            self.slug.clone()
        } else {
            format!("{}|{}", self.title, self.pub_date)
        }
    }
}

// ============================================================================
// PodcastFeed
// ============================================================================

/// The assembled show feed returned by every pipeline entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PodcastFeed {
    pub title: String,
    pub description: String,
    pub episodes: Vec<Episode>,
}

impl PodcastFeed {
    /// The feed served when the upstream cannot be fetched or parsed.
    pub fn fallback() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            description: DEFAULT_DESCRIPTION.to_string(),
            episodes: Vec::new(),
        }
    }

    /// First `count` episodes in feed order.
    pub fn latest_episodes(&self, count: usize) -> &[Episode] {
        &self.episodes[..count.min(self.episodes.len())]
    }

    /// Episodes whose category display string equals `category` exactly.
    pub fn episodes_by_category<'a>(
        &'a self,
        category: &'a str,
    ) -> impl Iterator<Item = &'a Episode> + 'a {
        self.episodes
            .iter()
            .filter(move |e| e.category.as_str() == category)
    }

    pub fn episode_by_id(&self, id: &str) -> Option<&Episode> {
        self.episodes.iter().find(|e| e.id == id)
    }

    pub fn episode_by_slug(&self, slug: &str) -> Option<&Episode> {
        self.episodes.iter().find(|e| e.slug == slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episode(id: &str, slug: &str, category: Category) -> Episode {
        Episode {
            id: id.to_string(),
            title: format!("#{} Folge", id),
            slug: slug.to_string(),
            description: String::new(),
            pub_date: String::new(),
            duration: "0:00".to_string(),
            audio_url: String::new(),
            category,
            image_url: String::new(),
            guid: format!("guid-{}", id),
            is_podfluencer: false,
            source: EpisodeSource::Primary,
            published_at: None,
        }
    }

    fn sample_feed() -> PodcastFeed {
        PodcastFeed {
            title: DEFAULT_TITLE.to_string(),
            description: String::new(),
            episodes: vec![
                episode("3", "drei", Category::Halloween),
                episode("2", "zwei", Category::TrueCrime),
                episode("1", "eins", Category::Halloween),
            ],
        }
    }

    #[test]
    fn test_fallback_feed() {
        let feed = PodcastFeed::fallback();
        assert_eq!(feed.title, "Spooky Bitch Show");
        assert_eq!(feed.description, "Der Grusel und Mystery Podcast");
        assert!(feed.episodes.is_empty());
    }

    #[test]
    fn test_latest_clamps_to_length() {
        let feed = sample_feed();
        assert_eq!(feed.latest_episodes(2).len(), 2);
        assert_eq!(feed.latest_episodes(10).len(), 3);
        assert!(feed.latest_episodes(0).is_empty());
    }

    #[test]
    fn test_by_category_exact_match() {
        let feed = sample_feed();
        let ids: Vec<&str> = feed
            .episodes_by_category("halloween")
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(ids, vec!["3", "1"]);
        assert_eq!(feed.episodes_by_category("Halloween").count(), 0);
    }

    #[test]
    fn test_lookup_by_id_and_slug() {
        let feed = sample_feed();
        assert_eq!(feed.episode_by_id("2").map(|e| e.slug.as_str()), Some("zwei"));
        assert_eq!(feed.episode_by_slug("eins").map(|e| e.id.as_str()), Some("1"));
        assert!(feed.episode_by_id("99").is_none());
        assert!(feed.episode_by_slug("vier").is_none());
    }

    #[test]
    fn test_into_external() {
        let mut e = episode("7", "sieben", Category::Mystic);
        e.image_url = "https://x/cover.jpg".to_string();
        let external = e.into_external();
        assert_eq!(external.image_url, "");
        assert_eq!(external.category, Category::PodfluencerFolgen);
        assert!(external.is_podfluencer);
        assert_eq!(external.source, EpisodeSource::External);
        assert_eq!(external.id, "7");
    }

    #[test]
    fn test_dedup_key_fallbacks() {
        let mut e = episode("1", "eins", Category::News);
        assert_eq!(e.dedup_key(), "guid-1");
        e.guid.clear();
        assert_eq!(e.dedup_key(), "eins");
        e.slug.clear();
        e.pub_date = "01. Jan. 2024".to_string();
        assert_eq!(e.dedup_key(), "#1 Folge|01. Jan. 2024");
    }

    #[test]
    fn test_category_serializes_to_display_name() {
        let json = serde_json::to_string(&Category::TrueCrime).unwrap();
        assert_eq!(json, "\"true crime\"");
        for category in Category::ALL {
            assert_eq!(Category::from_name(category.as_str()), Some(category));
        }
    }

    #[test]
    fn test_episode_serializes_camel_case() {
        let json = serde_json::to_value(episode("5", "fuenf", Category::News)).unwrap();
        assert_eq!(json["pubDate"], "");
        assert_eq!(json["audioUrl"], "");
        assert_eq!(json["isPodfluencer"], false);
        assert_eq!(json["source"], "primary");
        assert_eq!(json["category"], "news");
        assert!(json.get("publishedAt").is_none());
    }
}
