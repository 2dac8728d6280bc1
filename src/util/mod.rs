//! Text normalizers shared by the feed pipeline.
//!
//! - **Slugs**: URL-safe episode slugs with German transliteration
//! - **Durations**: `itunes:duration` display normalization
//! - **Dates**: German display dates and sort timestamps
//! - **Descriptions**: presentation markup around recurring marker phrases
//! - **URL validation**: scheme/host checks for configured endpoints
//!
//! # Examples
//!
//! ```
//! use spooky_feed::util::{format_date, generate_slug, normalize_duration};
//!
//! assert_eq!(generate_slug("Der Wendigo im Schnee"), "der-wendigo-im-schnee");
//! assert_eq!(normalize_duration("45:7"), "45:07");
//! assert_eq!(format_date("Fri, 31 Oct 2025 18:00:00 +0100"), "31. Okt. 2025");
//! ```

mod date;
mod text;
mod url_validator;

pub use date::{format_date, parse_timestamp};
pub use text::{enrich_description, generate_slug, normalize_duration};
pub use url_validator::{validate_url, UrlValidationError};
