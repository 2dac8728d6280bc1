use regex::Regex;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::LazyLock;

use super::{decode_text, unescape_lossy, ExtractError, FeedExtractor, ItemQuery, RawFeed};
use super::{FieldSource, ITEM_FIELDS};

/// Pattern-based strategy: tolerant regex extraction over the raw text.
///
/// Matching rules, which callers may rely on:
///
/// - tag names match case-insensitively and opening tags may carry attributes
/// - items are the non-greedy content of each `<item …>…</item>`
/// - a field's value is taken from `<tag><![CDATA[…]]></tag>` when present,
///   otherwise from the first `<tag …>…</tag>` with CDATA unwrapped,
///   comments dropped and entities resolved
/// - channel title and description come from the first `<channel>` with its
///   `<item>`, `<image>` and `<textInput>` blocks removed
/// - attributes come from the first `<tag … name="…">` (single or double
///   quotes)
///
/// Never fails: a document without items yields an empty [`RawFeed`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternExtractor;

impl FeedExtractor for PatternExtractor {
    fn extract(&self, xml: &str) -> Result<RawFeed, ExtractError> {
        let header = channel_header(xml);
        let header = ItemText(&header);

        let items = Self::items(xml)
            .map(|item| ItemText(item).to_raw_item())
            .collect();

        Ok(RawFeed {
            title: header.text("title").unwrap_or_default(),
            description: header.text("description").unwrap_or_default(),
            items,
        })
    }
}

/// Channel content with the nested blocks that carry their own `<title>` or
/// `<description>` cut out, leaving only the channel's direct fields.
fn channel_header(xml: &str) -> String {
    let channel = match CHANNEL_PATTERNS.plain.captures(xml).and_then(|caps| caps.get(1)) {
        Some(m) => m.as_str(),
        // Truncated document: everything after the opening tag
        None => match CHANNEL_OPEN.find(xml) {
            Some(m) => &xml[m.end()..],
            None => return String::new(),
        },
    };

    NESTED_CHANNEL_BLOCKS
        .iter()
        .fold(channel.to_string(), |header, block| {
            block.plain.replace_all(&header, "").into_owned()
        })
}

impl PatternExtractor {
    /// Text value of the first `tag` element in `xml`, CDATA preferred.
    pub fn value(xml: &str, tag: &str) -> Option<String> {
        ItemText(xml).text(tag)
    }

    /// Iterates the raw content of every `<item>` block.
    pub fn items(xml: &str) -> impl Iterator<Item = &str> {
        ITEM_PATTERNS
            .plain
            .captures_iter(xml)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
    }
}

/// Raw text of one item (or of the channel header).
struct ItemText<'a>(&'a str);

impl ItemQuery for ItemText<'_> {
    fn text(&self, tag: &str) -> Option<String> {
        let patterns = tag_patterns(tag);

        if let Some(caps) = patterns.cdata.captures(self.0) {
            let inner = caps.get(1).map_or("", |m| m.as_str());
            // Two adjacent sections: leave them to the plain pattern
            if !inner.contains("]]>") {
                return Some(inner.to_string());
            }
        }

        patterns
            .plain
            .captures(self.0)
            .and_then(|caps| caps.get(1))
            .map(|m| decode_text(m.as_str()))
    }

    fn attr(&self, tag: &str, attr: &str) -> Option<String> {
        let pattern = attribute_pattern(tag, attr);
        let caps = pattern.captures(self.0)?;
        caps.get(1)
            .or_else(|| caps.get(2))
            .map(|m| unescape_lossy(m.as_str()).into_owned())
    }
}

// ============================================================================
// Pattern construction
// ============================================================================

#[derive(Clone)]
struct TagPatterns {
    /// `<tag …><![CDATA[(…)]]></tag>`
    cdata: Regex,
    /// `<tag …>(…)</tag>`
    plain: Regex,
}

impl TagPatterns {
    fn new(tag: &str) -> Self {
        let tag = regex::escape(tag);
        // Attributes are allowed, self-closing tags are not
        let open = format!(r"<{tag}(?:\s[^>]*[^/>]|\s)?>");
        let close = format!(r"</{tag}\s*>");

        Self {
            cdata: Regex::new(&format!(r"(?is){open}<!\[CDATA\[(.*?)\]\]>{close}"))
                .expect("escaped tag pattern is valid"),
            plain: Regex::new(&format!(r"(?is){open}(.*?){close}"))
                .expect("escaped tag pattern is valid"),
        }
    }
}

fn build_attribute_pattern(tag: &str, attr: &str) -> Regex {
    let tag = regex::escape(tag);
    let attr = regex::escape(attr);
    Regex::new(&format!(
        r#"(?is)<{tag}\s(?:[^>]*?\s)?{attr}\s*=\s*(?:"([^"]*)"|'([^']*)')"#
    ))
    .expect("escaped attribute pattern is valid")
}

static ITEM_PATTERNS: LazyLock<TagPatterns> = LazyLock::new(|| TagPatterns::new("item"));

static CHANNEL_PATTERNS: LazyLock<TagPatterns> = LazyLock::new(|| TagPatterns::new("channel"));

static CHANNEL_OPEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<channel(?:\s[^>]*[^/>]|\s)?>").expect("channel pattern is valid")
});

/// RSS 2.0 channel children with nested `<title>`/`<description>` elements.
static NESTED_CHANNEL_BLOCKS: LazyLock<Vec<TagPatterns>> = LazyLock::new(|| {
    ["item", "image", "textInput"]
        .into_iter()
        .map(TagPatterns::new)
        .collect()
});

/// Patterns for every tag the field table reads, compiled once.
static TAG_PATTERNS: LazyLock<HashMap<String, TagPatterns>> = LazyLock::new(|| {
    let mut tags: Vec<&str> = vec!["title", "description"];
    tags.extend(field_sources().filter_map(|source| match source {
        FieldSource::Text(tag) => Some(tag),
        FieldSource::Attr(..) => None,
    }));

    tags.into_iter()
        .map(|tag| (tag.to_ascii_lowercase(), TagPatterns::new(tag)))
        .collect()
});

static ATTRIBUTE_PATTERNS: LazyLock<HashMap<(String, String), Regex>> = LazyLock::new(|| {
    field_sources()
        .filter_map(|source| match source {
            FieldSource::Attr(tag, attr) => Some((
                (tag.to_ascii_lowercase(), attr.to_ascii_lowercase()),
                build_attribute_pattern(tag, attr),
            )),
            FieldSource::Text(_) => None,
        })
        .collect()
});

fn field_sources() -> impl Iterator<Item = FieldSource> {
    [
        ITEM_FIELDS.title,
        ITEM_FIELDS.description,
        ITEM_FIELDS.pub_date,
        ITEM_FIELDS.guid,
        ITEM_FIELDS.duration,
        ITEM_FIELDS.enclosure_url,
        ITEM_FIELDS.image_url,
    ]
    .into_iter()
    .flatten()
    .copied()
}

fn tag_patterns(tag: &str) -> Cow<'static, TagPatterns> {
    match TAG_PATTERNS.get(&tag.to_ascii_lowercase()) {
        Some(patterns) => Cow::Borrowed(patterns),
        None => Cow::Owned(TagPatterns::new(tag)),
    }
}

fn attribute_pattern(tag: &str, attr: &str) -> Cow<'static, Regex> {
    let key = (tag.to_ascii_lowercase(), attr.to_ascii_lowercase());
    match ATTRIBUTE_PATTERNS.get(&key) {
        Some(pattern) => Cow::Borrowed(pattern),
        None => Cow::Owned(build_attribute_pattern(tag, attr)),
    }
}
