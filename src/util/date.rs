use chrono::{DateTime, Datelike, FixedOffset, NaiveDate};

/// German month abbreviations as used by `de-DE` short month formatting.
const GERMAN_MONTHS: [&str; 12] = [
    "Jan.", "Feb.", "März", "Apr.", "Mai", "Juni", "Juli", "Aug.", "Sept.", "Okt.", "Nov.", "Dez.",
];

/// Parses a feed date. RSS uses RFC 2822; RFC 3339 and bare `YYYY-MM-DD`
/// show up in hand-edited feeds.
fn parse_feed_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    DateTime::parse_from_rfc2822(trimmed)
        .or_else(|_| DateTime::parse_from_rfc3339(trimmed))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc().fixed_offset())
        })
}

/// Formats a feed date for German display (`05. März 2024`).
///
/// The date is rendered in the offset it was published with. Input that
/// cannot be parsed is returned unchanged.
pub fn format_date(raw: &str) -> String {
    match parse_feed_date(raw) {
        Some(dt) => format!(
            "{:02}. {} {}",
            dt.day(),
            GERMAN_MONTHS[dt.month0() as usize],
            dt.year()
        ),
        None => raw.to_string(),
    }
}

/// Unix timestamp of a feed date, `None` if it cannot be parsed.
pub fn parse_timestamp(raw: &str) -> Option<i64> {
    parse_feed_date(raw).map(|dt| dt.timestamp())
}
