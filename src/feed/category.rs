use super::types::Category;

/// Keyword rules checked in order against the lowercased artwork URL.
/// Order matters: the first rule with a matching keyword wins.
const CATEGORY_RULES: &[(&[&str], Category)] = &[
    (&["halloween"], Category::Halloween),
    (&["true_crime", "truecrime"], Category::TrueCrime),
    (&["paranormal"], Category::Paranormal),
    (&["mystic"], Category::Mystic),
    (&["creature"], Category::Creature),
    (&["filmreview", "film_review"], Category::FilmReview),
    (&["creepypasta"], Category::Creepypasta),
    (&["news"], Category::News),
    (&["true_story", "truestory"], Category::TrueStory),
    (&["spookylivereport", "livereport"], Category::SpookyLiveReport),
    (&["project_everest", "everest"], Category::ProjectEverest),
];

/// Classifies an episode from its `itunes:image` URL.
///
/// The show encodes the category in the artwork file name. An empty URL or
/// one without a known keyword is a "true story".
pub fn categorize(image_url: &str) -> Category {
    if image_url.is_empty() {
        return Category::TrueStory;
    }

    let url = image_url.to_lowercase();
    CATEGORY_RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| url.contains(k)))
        .map(|(_, category)| *category)
        .unwrap_or_default()
}
