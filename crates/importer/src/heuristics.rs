//! Heuristics for fields the source API leaves unstructured.
//!
//! Producer countries, voice actor nationalities, and establishment dates
//! only exist as free text upstream, so these functions extract a best
//! guess from names and bio paragraphs.

use chrono::{DateTime, NaiveDate};
use once_cell::sync::Lazy;

/// Substring markers mapping bio text to a country
static COUNTRY_MARKERS: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
    vec![
        ("japan", "Japan"),
        ("tokyo", "Japan"),
        ("osaka", "Japan"),
        ("kyoto", "Japan"),
        ("united states", "United States"),
        ("america", "United States"),
        ("california", "United States"),
        ("new york", "United States"),
        ("south korea", "South Korea"),
        ("seoul", "South Korea"),
        ("china", "China"),
        ("shanghai", "China"),
        ("france", "France"),
        ("paris", "France"),
    ]
});

/// Name fragments that strongly suggest a Japanese studio
static JAPANESE_NAME_MARKERS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "studio",
        "animation",
        "toei",
        "sunrise",
        "madhouse",
        "bones",
        "pierrot",
        "gainax",
        "trigger",
        "shaft",
        "kyoto",
        "ufotable",
        "a-1",
        "wit",
        "mappa",
    ]
});

/// Name fragments that suggest an American company
static AMERICAN_NAME_MARKERS: Lazy<Vec<&'static str>> =
    Lazy::new(|| vec!["disney", "warner", "fox", "universal", "netflix", "cartoon network"]);

/// Demonym markers mapping bio text to a nationality
static NATIONALITY_MARKERS: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
    vec![
        ("japanese", "Japanese"),
        ("american", "American"),
        ("korean", "Korean"),
        ("chinese", "Chinese"),
    ]
});

/// Guess a company's country from its bio text
pub fn infer_country_from_about(about: &str) -> Option<&'static str> {
    let lowered = about.to_lowercase();
    COUNTRY_MARKERS
        .iter()
        .find(|(marker, _)| lowered.contains(marker))
        .map(|&(_, country)| country)
}

/// Guess a company's country from its name alone
pub fn infer_country_from_name(name: &str) -> Option<&'static str> {
    let lowered = name.to_lowercase();
    if JAPANESE_NAME_MARKERS.iter().any(|m| lowered.contains(m)) {
        return Some("Japan");
    }
    if AMERICAN_NAME_MARKERS.iter().any(|m| lowered.contains(m)) {
        return Some("United States");
    }
    None
}

/// Guess a person's nationality from their bio text
pub fn infer_nationality(about: &str) -> Option<&'static str> {
    let lowered = about.to_lowercase();
    NATIONALITY_MARKERS
        .iter()
        .find(|(marker, _)| lowered.contains(marker))
        .map(|&(_, nationality)| nationality)
}

/// Parse a birthday, which arrives as an ISO timestamp or a bare date
pub fn parse_birth_date(raw: &str) -> Option<NaiveDate> {
    let date_part = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Parse an establishment date, which comes in several layouts
pub fn parse_established(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y/%m/%d") {
        return Some(date);
    }
    // Year-month only: anchor to the first of the month.
    if trimmed.len() == 7 {
        if let Ok(date) = NaiveDate::parse_from_str(&format!("{}-01", trimmed), "%Y-%m-%d") {
            return Some(date);
        }
    }
    // Year only: anchor to January 1st.
    if let Ok(year) = trimmed.parse::<i32>() {
        return NaiveDate::from_ymd_opt(year, 1, 1);
    }
    None
}

/// Parse an aired timestamp (RFC 3339, or a bare date prefix)
pub fn parse_air_date(raw: &str) -> Option<NaiveDate> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(raw) {
        return Some(datetime.date_naive());
    }
    let date_part = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Uppercase the first letter of a word
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_country_from_about() {
        assert_eq!(
            infer_country_from_about("An animation studio based in Tokyo."),
            Some("Japan")
        );
        assert_eq!(
            infer_country_from_about("Founded in California in 1923."),
            Some("United States")
        );
        assert_eq!(infer_country_from_about("No location hints here."), None);
    }

    #[test]
    fn test_country_from_name() {
        assert_eq!(infer_country_from_name("Kyoto Animation"), Some("Japan"));
        assert_eq!(infer_country_from_name("Toei Animation"), Some("Japan"));
        assert_eq!(
            infer_country_from_name("Walt Disney Pictures"),
            Some("United States")
        );
        assert_eq!(infer_country_from_name("Aniplex"), None);
    }

    #[test]
    fn test_nationality() {
        assert_eq!(
            infer_nationality("A Japanese voice actress from Tokyo."),
            Some("Japanese")
        );
        assert_eq!(infer_nationality("An American actor."), Some("American"));
        assert_eq!(infer_nationality("A prolific performer."), None);
    }

    #[test]
    fn test_birth_date() {
        assert_eq!(
            parse_birth_date("1990-02-04T00:00:00+00:00"),
            NaiveDate::from_ymd_opt(1990, 2, 4)
        );
        assert_eq!(
            parse_birth_date("1990-02-04"),
            NaiveDate::from_ymd_opt(1990, 2, 4)
        );
        assert_eq!(parse_birth_date("unknown"), None);
    }

    #[test]
    fn test_established() {
        assert_eq!(
            parse_established("1985-06-15"),
            NaiveDate::from_ymd_opt(1985, 6, 15)
        );
        assert_eq!(
            parse_established("1985/06/15"),
            NaiveDate::from_ymd_opt(1985, 6, 15)
        );
        assert_eq!(
            parse_established("1985-06"),
            NaiveDate::from_ymd_opt(1985, 6, 1)
        );
        assert_eq!(parse_established("1985"), NaiveDate::from_ymd_opt(1985, 1, 1));
        assert_eq!(parse_established("sometime"), None);
    }

    #[test]
    fn test_air_date() {
        assert_eq!(
            parse_air_date("1998-04-03T00:00:00+00:00"),
            NaiveDate::from_ymd_opt(1998, 4, 3)
        );
        assert_eq!(
            parse_air_date("1998-04-03"),
            NaiveDate::from_ymd_opt(1998, 4, 3)
        );
        assert_eq!(parse_air_date(""), None);
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("spring"), "Spring");
        assert_eq!(capitalize("WINTER"), "WINTER");
        assert_eq!(capitalize(""), "");
    }
}
