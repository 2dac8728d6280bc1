use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Derives a URL-safe slug from an episode title.
///
/// The title is lowercased and German umlauts are transliterated
/// (`ä`→`ae`, `ö`→`oe`, `ü`→`ue`, `ß`→`ss`) before anything is stripped.
/// Only ASCII letters, digits, `_`, whitespace and `-` survive; runs of
/// whitespace and hyphens collapse into a single `-`, and hyphens are
/// trimmed from both ends.
///
/// A title made only of stripped characters yields an empty slug.
///
/// # Examples
///
/// ```
/// use spooky_feed::util::generate_slug;
///
/// assert_eq!(generate_slug("Die Hütte im Wald"), "die-huette-im-wald");
/// assert_eq!(generate_slug("#12 - Größer als gedacht?!"), "12-groesser-als-gedacht");
/// assert_eq!(generate_slug("?!"), "");
/// ```
pub fn generate_slug(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for c in title.chars().flat_map(char::to_lowercase) {
        let replacement: &str = match c {
            'ä' => "ae",
            'ö' => "oe",
            'ü' => "ue",
            'ß' => "ss",
            c if c.is_whitespace() || c == '-' => {
                pending_hyphen = true;
                continue;
            }
            c if c.is_ascii_alphanumeric() || c == '_' => {
                if pending_hyphen && !slug.is_empty() {
                    slug.push('-');
                }
                pending_hyphen = false;
                slug.push(c);
                continue;
            }
            // Everything else is dropped without acting as a separator
            _ => continue,
        };

        if pending_hyphen && !slug.is_empty() {
            slug.push('-');
        }
        pending_hyphen = false;
        slug.push_str(replacement);
    }

    slug
}

/// Placeholder used when a feed item carries no duration at all.
const EMPTY_DURATION: &str = "0:00";

/// Normalizes an `itunes:duration` value for display.
///
/// - `""` → `"0:00"`
/// - `H:MM:SS` (any padding) → `H:MM:00`. The seconds are dropped so every
///   long episode renders with the same precision.
/// - `M:SS` → `M:SS` with zero-padded seconds
/// - anything else (plain seconds, non-numeric parts) is returned unchanged
///
/// # Examples
///
/// ```
/// use spooky_feed::util::normalize_duration;
///
/// assert_eq!(normalize_duration("01:23:45"), "1:23:00");
/// assert_eq!(normalize_duration("23:5"), "23:05");
/// assert_eq!(normalize_duration(""), "0:00");
/// assert_eq!(normalize_duration("3600"), "3600");
/// ```
pub fn normalize_duration(raw: &str) -> Cow<'_, str> {
    if raw.is_empty() {
        return Cow::Borrowed(EMPTY_DURATION);
    }

    let parts: Vec<&str> = raw.trim().split(':').collect();
    let numbers: Option<Vec<u64>> = parts.iter().map(|p| p.trim().parse().ok()).collect();

    match (parts.len(), numbers) {
        (3, Some(n)) => Cow::Owned(format!("{}:{:02}:00", n[0], n[1])),
        (2, Some(n)) => Cow::Owned(format!("{}:{:02}", n[0], n[1])),
        _ => Cow::Borrowed(raw),
    }
}

/// Inline marker phrases and the CSS class their wrapper gets.
const INLINE_MARKERS: [(&str, &str); 4] = [
    ("Triggerwarnung:", "episode-trigger-warning"),
    ("Enthält Werbung", "episode-ad-notice"),
    ("Quellen:", "episode-sources"),
    ("Hört rein und gruselt euch mit uns!", "episode-tagline"),
];

const STORY_CTA_CLASS: &str = "episode-story-cta";

static INLINE_MARKER_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    INLINE_MARKERS
        .iter()
        .map(|(phrase, class)| {
            let pattern = Regex::new(&regex::escape(phrase)).expect("escaped literal is valid");
            (pattern, *class)
        })
        .collect()
});

// The call-to-action is two sentences that the feed often splits with a
// newline or a <br>.
static STORY_CTA_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"Du hast selbst etwas Unheimliches erlebt\?(?:\s|<br\s*/?>)*Dann schreib uns deine Geschichte!",
    )
    .expect("story call-to-action pattern is valid")
});

/// Wraps the show's recurring German marker phrases in presentation markup.
///
/// Four phrases get an inline `<span class="…">`; the "share your own story"
/// call-to-action gets a block `<div class="episode-story-cta">`. Every
/// occurrence is wrapped and the matched text is kept verbatim.
pub fn enrich_description(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }

    let mut enriched = html.to_string();
    for (pattern, class) in INLINE_MARKER_PATTERNS.iter() {
        enriched = pattern
            .replace_all(&enriched, |caps: &Captures<'_>| {
                format!(r#"<span class="{}">{}</span>"#, class, &caps[0])
            })
            .into_owned();
    }

    STORY_CTA_PATTERN
        .replace_all(&enriched, |caps: &Captures<'_>| {
            format!(r#"<div class="{}">{}</div>"#, STORY_CTA_CLASS, &caps[0])
        })
        .into_owned()
}
