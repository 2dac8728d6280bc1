use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{decode_text, unescape_lossy, ExtractError, FeedExtractor, ItemQuery, RawFeed};

/// SEC-003: Maximum element nesting accepted while building the tree.
/// RSS is shallow; anything deeper is hostile or broken.
const MAX_DEPTH: usize = 64;

/// Structured-query strategy: builds an element tree and selects fields by
/// tag name, the way a DOM `querySelector` would.
///
/// Tag and attribute names match ASCII case-insensitively. Fails with
/// [`ExtractError`] on malformed XML.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentExtractor;

impl FeedExtractor for DocumentExtractor {
    fn extract(&self, xml: &str) -> Result<RawFeed, ExtractError> {
        let root = parse_document(xml)?;

        let (title, description) = match root.find_first("channel") {
            Some(channel) => (
                channel.child_text("title").unwrap_or_default(),
                channel.child_text("description").unwrap_or_default(),
            ),
            None => (String::new(), String::new()),
        };

        let mut items = Vec::new();
        root.collect_named("item", &mut items);

        Ok(RawFeed {
            title,
            description,
            items: items.into_iter().map(|item| item.to_raw_item()).collect(),
        })
    }
}

/// One element of the parsed document.
///
/// `inner` is the source text between the start and end tag, empty for
/// self-closing elements.
#[derive(Debug, Default)]
struct Element<'a> {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element<'a>>,
    inner: &'a str,
    inner_start: usize,
}

impl<'a> Element<'a> {
    fn from_start(start: &BytesStart<'_>, inner_start: usize) -> Result<Self, ExtractError> {
        let name = utf8(start.name().as_ref())?.to_string();

        let mut attributes = Vec::new();
        for attr_result in start.attributes() {
            let attr = match attr_result {
                Ok(attr) => attr,
                Err(e) => {
                    tracing::debug!(element = %name, error = %e, "Skipping malformed attribute");
                    continue;
                }
            };
            let key = utf8(attr.key.as_ref())?.to_string();
            let value = unescape_lossy(utf8(&attr.value)?).into_owned();
            attributes.push((key, value));
        }

        Ok(Self {
            name,
            attributes,
            children: Vec::new(),
            inner: "",
            inner_start,
        })
    }

    fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// First descendant with this name, in document order.
    fn find_first(&self, name: &str) -> Option<&Element<'a>> {
        for child in &self.children {
            if child.is_named(name) {
                return Some(child);
            }
            if let Some(found) = child.find_first(name) {
                return Some(found);
            }
        }
        None
    }

    /// Every descendant with this name in document order, without
    /// descending into matches.
    fn collect_named<'e>(&'e self, name: &str, out: &mut Vec<&'e Element<'a>>) {
        for child in &self.children {
            if child.is_named(name) {
                out.push(child);
            } else {
                child.collect_named(name, out);
            }
        }
    }

    /// First descendant with this name that carries `attr`.
    fn find_with_attribute(&self, name: &str, attr: &str) -> Option<&str> {
        for child in &self.children {
            if child.is_named(name) {
                if let Some(value) = child.attribute(attr) {
                    return Some(value);
                }
            }
            if let Some(found) = child.find_with_attribute(name, attr) {
                return Some(found);
            }
        }
        None
    }

    fn child_text(&self, name: &str) -> Option<String> {
        self.children
            .iter()
            .find(|el| el.is_named(name))
            .map(Element::text_content)
    }

    /// Decoded inner source, child markup included.
    fn text_content(&self) -> String {
        decode_text(self.inner)
    }
}

impl ItemQuery for &Element<'_> {
    fn text(&self, tag: &str) -> Option<String> {
        self.find_first(tag).map(Element::text_content)
    }

    fn attr(&self, tag: &str, attr: &str) -> Option<String> {
        self.find_with_attribute(tag, attr).map(str::to_string)
    }
}

fn utf8(bytes: &[u8]) -> Result<&str, ExtractError> {
    std::str::from_utf8(bytes).map_err(|e| ExtractError::Xml(e.to_string()))
}

fn offset(position: u64) -> Result<usize, ExtractError> {
    usize::try_from(position).map_err(|e| ExtractError::Xml(e.to_string()))
}

/// Parses the whole document into a synthetic root element.
///
/// The reader only validates structure and locates each element's inner
/// source; text is decoded from that span later.
/// SEC-002: quick-xml never expands `<!ENTITY>` declarations; text is
/// unescaped with the predefined XML entities only.
fn parse_document(xml: &str) -> Result<Element<'_>, ExtractError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<Element<'_>> = vec![Element::default()];

    loop {
        // Start of the next piece of markup, i.e. the `<` of an end tag
        let before = offset(reader.buffer_position())?;
        let event = reader
            .read_event()
            .map_err(|e| ExtractError::Xml(e.to_string()))?;

        match event {
            Event::Start(start) => {
                if stack.len() > MAX_DEPTH {
                    return Err(ExtractError::MaxDepthExceeded(MAX_DEPTH));
                }
                let inner_start = offset(reader.buffer_position())?;
                stack.push(Element::from_start(&start, inner_start)?);
            }
            Event::Empty(start) => {
                let element = Element::from_start(&start, before)?;
                push_child(&mut stack, element);
            }
            Event::End(end) => {
                if stack.len() < 2 {
                    return Err(ExtractError::Xml(format!(
                        "unexpected closing tag </{}>",
                        String::from_utf8_lossy(end.name().as_ref())
                    )));
                }
                if let Some(mut element) = stack.pop() {
                    element.inner = xml.get(element.inner_start..before).ok_or_else(|| {
                        ExtractError::Xml(format!("invalid source span for <{}>", element.name))
                    })?;
                    push_child(&mut stack, element);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if stack.len() > 1 {
        let open = stack.pop().map(|el| el.name).unwrap_or_default();
        return Err(ExtractError::Unclosed(open));
    }

    stack
        .pop()
        .ok_or_else(|| ExtractError::Xml("empty document".to_string()))
}

fn push_child<'a>(stack: &mut [Element<'a>], element: Element<'a>) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd">
  <channel>
    <title>Spooky Bitch Show</title>
    <description><![CDATA[Der <b>Grusel</b> Podcast]]></description>
    <image><title>Logo</title><url>https://x/logo.png</url></image>
    <item>
      <title>#12 Die Hütte</title>
      <guid isPermaLink="false">abc-12</guid>
      <itunes:duration>01:02:03</itunes:duration>
      <enclosure url="https://x/12.mp3" length="1" type="audio/mpeg"/>
      <itunes:image href="https://x/halloween.jpg"/>
    </item>
    <item>
      <title>Tom &amp; Jerry</title>
      <duration>12:34</duration>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_extracts_channel_and_items() {
        let feed = DocumentExtractor.extract(FEED).unwrap();
        assert_eq!(feed.title, "Spooky Bitch Show");
        assert_eq!(feed.description, "Der <b>Grusel</b> Podcast");
        assert_eq!(feed.items.len(), 2);

        let first = &feed.items[0];
        assert_eq!(first.title, "#12 Die Hütte");
        assert_eq!(first.guid, "abc-12");
        assert_eq!(first.duration, "01:02:03");
        assert_eq!(first.enclosure_url, "https://x/12.mp3");
        assert_eq!(first.image_url, "https://x/halloween.jpg");
    }

    #[test]
    fn test_non_namespaced_fallback_and_entities() {
        let feed = DocumentExtractor.extract(FEED).unwrap();
        let second = &feed.items[1];
        assert_eq!(second.title, "Tom & Jerry");
        assert_eq!(second.duration, "12:34");
        assert_eq!(second.guid, "");
        assert_eq!(second.image_url, "");
    }

    #[test]
    fn test_inline_markup_kept_and_comments_dropped() {
        let xml = "<rss><channel><item>\
            <title><!-- alt -->#5 Folge</title>\
            <description>Teil 1<br/>Teil <b>2</b> &amp; mehr</description>\
            </item></channel></rss>";
        let item = &DocumentExtractor.extract(xml).unwrap().items[0];
        assert_eq!(item.title, "#5 Folge");
        assert_eq!(item.description, "Teil 1<br/>Teil <b>2</b> & mehr");
    }

    #[test]
    fn test_channel_title_ignores_image_title() {
        let xml = "<rss><channel><image><title>Logo</title></image><title>Show</title></channel></rss>";
        let feed = DocumentExtractor.extract(xml).unwrap();
        assert_eq!(feed.title, "Show");
    }

    #[test]
    fn test_malformed_xml_is_error() {
        let result = DocumentExtractor.extract("<rss><channel><item></channel></rss>");
        assert!(result.is_err());
    }

    #[test]
    fn test_unclosed_element_is_error() {
        let result = DocumentExtractor.extract("<rss><channel>");
        assert!(result.is_err());
    }

    #[test]
    fn test_depth_limit() {
        let xml = format!("{}{}", "<a>".repeat(MAX_DEPTH + 2), "</a>".repeat(MAX_DEPTH + 2));
        let result = DocumentExtractor.extract(&xml);
        assert!(matches!(result, Err(ExtractError::MaxDepthExceeded(_))));
    }

    #[test]
    fn test_empty_document_has_no_items() {
        let feed = DocumentExtractor.extract("").unwrap();
        assert!(feed.items.is_empty());
        assert_eq!(feed.title, "");
    }
}
