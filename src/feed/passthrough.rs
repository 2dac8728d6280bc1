use futures::FutureExt;
use quick_xml::escape::escape;
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::LazyLock;

use super::aggregator::{panic_message, FeedAggregator};
use super::extract::PatternExtractor;
use super::fetcher::{fetch_feed, FetchError};
use super::types::{PodcastFeed, DEFAULT_TITLE};
use crate::util::generate_slug;

/// Content type of every passthrough response, success or not.
pub const RSS_CONTENT_TYPE: &str = "application/rss+xml; charset=utf-8";

const ERROR_DESCRIPTION: &str = "Error loading RSS feed";

static ITEM_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)(<item(?:\s[^>]*[^/>]|\s)?>)(.*?)(</item\s*>)").expect("item pattern is valid")
});

static LINK_ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<link(?:\s[^>]*[^/>]|\s)?>.*?</link\s*>").expect("link pattern is valid")
});

static TITLE_ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<title(?:\s[^>]*[^/>]|\s)?>.*?</title\s*>").expect("title pattern is valid")
});

/// HTTP-shaped result of the passthrough endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RssResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl RssResponse {
    fn ok(body: String) -> Self {
        Self {
            status: 200,
            content_type: RSS_CONTENT_TYPE,
            body,
        }
    }

    /// The 500 response: a minimal, valid, empty RSS document.
    pub fn error(base_url: &str) -> Self {
        Self {
            status: 500,
            content_type: RSS_CONTENT_TYPE,
            body: error_document(base_url),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Channel with no items, served whenever the passthrough fails.
pub fn error_document(base_url: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>{}</title>
    <description>{}</description>
    <link>{}</link>
  </channel>
</rss>
"#,
        DEFAULT_TITLE,
        ERROR_DESCRIPTION,
        escape(trim_base(base_url))
    )
}

fn trim_base(base_url: &str) -> &str {
    base_url.strip_suffix('/').unwrap_or(base_url)
}

/// Maps upstream guids and titles to the slugs of the assembled feed.
#[derive(Debug, Clone, Default)]
pub struct SlugIndex {
    by_guid: HashMap<String, String>,
    by_title: HashMap<String, String>,
}

impl SlugIndex {
    /// Later episodes overwrite earlier ones on key collisions.
    pub fn from_feed(feed: &PodcastFeed) -> Self {
        let mut index = Self::default();
        for episode in &feed.episodes {
            if !episode.guid.is_empty() {
                index.by_guid.insert(episode.guid.clone(), episode.slug.clone());
            }
            if !episode.title.is_empty() {
                index.by_title.insert(episode.title.clone(), episode.slug.clone());
            }
        }
        index
    }

    /// guid lookup, then title lookup, then a slug derived from the title.
    pub fn resolve(&self, guid: &str, title: &str) -> Cow<'_, str> {
        self.by_guid
            .get(guid)
            .or_else(|| self.by_title.get(title))
            .map(|slug| Cow::Borrowed(slug.as_str()))
            .unwrap_or_else(|| Cow::Owned(generate_slug(title)))
    }
}

/// Points every item's `<link>` at its page on the local site.
///
/// The link is `<base>/episode/<slug>` with one trailing `/` removed from
/// `base_url`. An existing `<link>` element is replaced; otherwise a new one
/// is inserted right after the item's `<title>`. Items whose slug resolves
/// to nothing are left untouched, as is everything outside `<item>` blocks.
pub fn rewrite_item_links(xml: &str, index: &SlugIndex, base_url: &str) -> String {
    let base = trim_base(base_url);
    ITEM_BLOCK
        .replace_all(xml, |caps: &Captures| {
            format!(
                "{}{}{}",
                &caps[1],
                rewrite_item(&caps[2], index, base),
                &caps[3]
            )
        })
        .into_owned()
}

fn rewrite_item<'a>(content: &'a str, index: &SlugIndex, base: &str) -> Cow<'a, str> {
    let guid = PatternExtractor::value(content, "guid").unwrap_or_default();
    let title = PatternExtractor::value(content, "title").unwrap_or_default();

    let slug = index.resolve(&guid, &title);
    if slug.is_empty() {
        return Cow::Borrowed(content);
    }

    let url = format!("{}/episode/{}", base, slug);
    let link = format!("<link>{}</link>", escape(&url));

    if let Some(existing) = LINK_ELEMENT.find(content) {
        Cow::Owned(format!(
            "{}{}{}",
            &content[..existing.start()],
            link,
            &content[existing.end()..]
        ))
    } else if let Some(title) = TITLE_ELEMENT.find(content) {
        Cow::Owned(format!(
            "{}\n    {}{}",
            &content[..title.end()],
            link,
            &content[title.end()..]
        ))
    } else {
        Cow::Borrowed(content)
    }
}

impl FeedAggregator {
    /// Serves the upstream show feed with item links rewritten to local
    /// episode pages.
    ///
    /// Never fails: any error or panic yields [`RssResponse::error`].
    pub async fn rss_passthrough(&self, base_url: &str) -> RssResponse {
        match AssertUnwindSafe(self.try_rss_passthrough(base_url))
            .catch_unwind()
            .await
        {
            Ok(Ok(body)) => RssResponse::ok(body),
            Ok(Err(e)) => {
                tracing::error!(url = %self.primary_url(), error = %e, "RSS passthrough failed");
                RssResponse::error(base_url)
            }
            Err(panic) => {
                tracing::error!(
                    url = %self.primary_url(),
                    panic = %panic_message(panic.as_ref()),
                    "RSS passthrough panicked"
                );
                RssResponse::error(base_url)
            }
        }
    }

    async fn try_rss_passthrough(&self, base_url: &str) -> Result<String, FetchError> {
        let (upstream, feed) = tokio::join!(
            fetch_feed(self.client(), self.primary_url(), self.timeout()),
            self.fetch_podcast_feed()
        );
        let xml = upstream?;

        tracing::debug!(episodes = feed.episodes.len(), base = %base_url, "Rewriting item links");
        let index = SlugIndex::from_feed(&feed);

        Ok(rewrite_item_links(&xml, &index, base_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::types::{Category, Episode, EpisodeSource};
    use pretty_assertions::assert_eq;

    fn episode(guid: &str, title: &str, slug: &str) -> Episode {
        Episode {
            id: "1".to_string(),
            title: title.to_string(),
            slug: slug.to_string(),
            description: String::new(),
            pub_date: String::new(),
            duration: "0:00".to_string(),
            audio_url: String::new(),
            category: Category::TrueStory,
            image_url: String::new(),
            guid: guid.to_string(),
            is_podfluencer: false,
            source: EpisodeSource::Primary,
            published_at: None,
        }
    }

    fn index(episodes: Vec<Episode>) -> SlugIndex {
        SlugIndex::from_feed(&PodcastFeed {
            title: String::new(),
            description: String::new(),
            episodes,
        })
    }

    #[test]
    fn test_replaces_existing_link_by_guid() {
        let xml = "<rss><channel><link>https://show</link><item><title>Anders</title><guid>g1</guid><link>https://old/1</link></item></channel></rss>";
        let index = index(vec![episode("g1", "#1 Pilot", "1-pilot")]);

        let out = rewrite_item_links(xml, &index, "https://site.de/");
        assert_eq!(
            out,
            "<rss><channel><link>https://show</link><item><title>Anders</title><guid>g1</guid><link>https://site.de/episode/1-pilot</link></item></channel></rss>"
        );
    }

    #[test]
    fn test_inserts_link_after_title() {
        let xml = "<item><title>Hallo Welt</title><guid>x</guid></item>";
        let out = rewrite_item_links(xml, &SlugIndex::default(), "https://site.de");
        assert_eq!(
            out,
            "<item><title>Hallo Welt</title>\n    <link>https://site.de/episode/hallo-welt</link><guid>x</guid></item>"
        );
    }

    #[test]
    fn test_title_lookup_when_guid_unknown() {
        let xml = "<item><title><![CDATA[Die Hütte]]></title><guid>neu</guid><link>a</link></item>";
        let index = index(vec![episode("alt", "Die Hütte", "die-huette-2")]);
        let out = rewrite_item_links(xml, &index, "https://site.de");
        assert!(out.contains("<link>https://site.de/episode/die-huette-2</link>"));
    }

    #[test]
    fn test_empty_slug_leaves_item_untouched() {
        let xml = "<item><title>?!</title><link>https://old</link></item>";
        let out = rewrite_item_links(xml, &SlugIndex::default(), "https://site.de");
        assert_eq!(out, xml);
    }

    #[test]
    fn test_link_is_escaped() {
        let xml = "<item><title>Folge</title></item>";
        let out = rewrite_item_links(xml, &SlugIndex::default(), "https://site.de/?a=1&b=2");
        assert!(out.contains("<link>https://site.de/?a=1&amp;b=2/episode/folge</link>"));
    }

    #[test]
    fn test_later_episode_overwrites_mapping() {
        let index = index(vec![
            episode("g", "Titel", "erste"),
            episode("g", "Titel", "zweite"),
        ]);
        assert_eq!(index.resolve("g", ""), "zweite");
        assert_eq!(index.resolve("unbekannt", "Titel"), "zweite");
        assert_eq!(index.resolve("", "Ganz Neu"), "ganz-neu");
    }

    #[test]
    fn test_error_response() {
        let response = RssResponse::error("https://site.de/");
        assert_eq!(response.status, 500);
        assert!(!response.is_success());
        assert_eq!(response.content_type, "application/rss+xml; charset=utf-8");
        assert!(response.body.contains("<title>Spooky Bitch Show</title>"));
        assert!(response.body.contains("<description>Error loading RSS feed</description>"));
        assert!(response.body.contains("<link>https://site.de</link>"));
        assert!(!response.body.contains("<item"));
    }
}
