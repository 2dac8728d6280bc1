use regex::Regex;
use std::sync::LazyLock;

use super::category::categorize;
use super::extract::{ExtractError, ExtractionStrategy, RawItem};
use super::types::{Episode, EpisodeSource};
use crate::util::{enrich_description, format_date, generate_slug, normalize_duration, parse_timestamp};

/// Title used for items that carry none.
pub const UNTITLED_EPISODE: &str = "Untitled Episode";

static EPISODE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#(\d+)").expect("episode number pattern is valid"));

/// Channel metadata and normalized episodes of one source feed, in feed order.
#[derive(Debug, Clone)]
pub struct ParsedFeed {
    pub title: String,
    pub description: String,
    pub episodes: Vec<Episode>,
}

/// Extracts and normalizes every item of a feed document.
///
/// Each item is parsed with its position within *this* feed, so positional
/// fallbacks (ids, guids) are per source.
///
/// # Errors
///
/// Only the document strategy can fail, on malformed XML.
pub fn parse_feed(xml: &str, strategy: ExtractionStrategy) -> Result<ParsedFeed, ExtractError> {
    let raw = strategy.extractor().extract(xml)?;
    let total = raw.items.len();

    let episodes = raw
        .items
        .iter()
        .enumerate()
        .map(|(index, item)| parse_item(item, index, total))
        .collect();

    Ok(ParsedFeed {
        title: raw.title,
        description: raw.description,
        episodes,
    })
}

/// Builds one [`Episode`] from an extracted item.
///
/// - `id`: the first `#<digits>` in the title, otherwise `total - index`.
///   The fallback assumes the feed lists newest episodes first.
/// - empty title → [`UNTITLED_EPISODE`]; empty guid → `episode-<index + 1>`
/// - the artwork URL only decides the category; `image_url` stays empty
pub fn parse_item(raw: &RawItem, index: usize, total: usize) -> Episode {
    let title = if raw.title.is_empty() {
        UNTITLED_EPISODE.to_string()
    } else {
        raw.title.clone()
    };

    let id = EPISODE_NUMBER
        .captures(&title)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| total.saturating_sub(index).to_string());

    let guid = if raw.guid.is_empty() {
        format!("episode-{}", index + 1)
    } else {
        raw.guid.clone()
    };

    Episode {
        id,
        slug: generate_slug(&title),
        description: enrich_description(&raw.description),
        pub_date: format_date(&raw.pub_date),
        duration: normalize_duration(&raw.duration).into_owned(),
        audio_url: raw.enclosure_url.clone(),
        category: categorize(&raw.image_url),
        image_url: String::new(),
        guid,
        is_podfluencer: false,
        source: EpisodeSource::Primary,
        published_at: parse_timestamp(&raw.pub_date),
        title,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::types::Category;
    use pretty_assertions::assert_eq;

    fn raw(title: &str) -> RawItem {
        RawItem {
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_id_from_title() {
        let episode = parse_item(&raw("Folge #42: Der Nebel (#7 Bonus)"), 0, 10);
        assert_eq!(episode.id, "42");
    }

    #[test]
    fn test_id_positional_fallback() {
        assert_eq!(parse_item(&raw("Ohne Nummer"), 0, 10).id, "10");
        assert_eq!(parse_item(&raw("Ohne Nummer"), 9, 10).id, "1");
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let episode = parse_item(&RawItem::default(), 2, 5);
        assert_eq!(episode.title, "Untitled Episode");
        assert_eq!(episode.slug, "untitled-episode");
        assert_eq!(episode.guid, "episode-3");
        assert_eq!(episode.duration, "0:00");
        assert_eq!(episode.pub_date, "");
        assert_eq!(episode.published_at, None);
        assert_eq!(episode.category, Category::TrueStory);
        assert_eq!(episode.audio_url, "");
    }

    #[test]
    fn test_full_item() {
        let item = RawItem {
            title: "#13 Der Fluch von Öhringen".to_string(),
            description: "Triggerwarnung: Tod".to_string(),
            pub_date: "Fri, 13 Oct 2023 06:00:00 +0200".to_string(),
            guid: "podcaster-13".to_string(),
            duration: "00:58:31".to_string(),
            enclosure_url: "https://x/13.mp3".to_string(),
            image_url: "https://x/paranormal_13.jpg".to_string(),
        };
        let episode = parse_item(&item, 0, 1);

        assert_eq!(episode.id, "13");
        assert_eq!(episode.slug, "13-der-fluch-von-oehringen");
        assert_eq!(
            episode.description,
            r#"<span class="episode-trigger-warning">Triggerwarnung:</span> Tod"#
        );
        assert_eq!(episode.pub_date, "13. Okt. 2023");
        assert_eq!(episode.duration, "0:58:00");
        assert_eq!(episode.audio_url, "https://x/13.mp3");
        assert_eq!(episode.category, Category::Paranormal);
        assert_eq!(episode.image_url, "");
        assert_eq!(episode.guid, "podcaster-13");
        assert!(!episode.is_podfluencer);
        assert_eq!(episode.source, EpisodeSource::Primary);
        assert!(episode.published_at.is_some());
    }

    #[test]
    fn test_parse_feed_uses_per_source_positions() {
        let xml = r#"<rss><channel><title>Show</title>
<item><title>Erste</title></item>
<item><title>Zweite</title></item>
<item><title>#1 Pilot</title></item>
</channel></rss>"#;

        for strategy in [ExtractionStrategy::Document, ExtractionStrategy::Pattern] {
            let feed = parse_feed(xml, strategy).unwrap();
            assert_eq!(feed.title, "Show");
            let ids: Vec<&str> = feed.episodes.iter().map(|e| e.id.as_str()).collect();
            assert_eq!(ids, vec!["3", "2", "1"], "strategy {}", strategy);
            let guids: Vec<&str> = feed.episodes.iter().map(|e| e.guid.as_str()).collect();
            assert_eq!(guids, vec!["episode-1", "episode-2", "episode-3"]);
        }
    }
}
