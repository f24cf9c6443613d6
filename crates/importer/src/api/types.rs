//! Jikan API v4 response types.
//!
//! Only the fields the pipelines actually consume are modeled; everything
//! else in the payload is ignored during deserialization.

use serde::{Deserialize, Serialize};

/// Generic pagination wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

/// Wrapper for detail endpoints (`{"data": {...}}`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}

/// Wrapper for unpaginated list endpoints (`{"data": [...]}`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataList<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub has_next_page: bool,
    #[serde(default)]
    pub current_page: u32,
}

/// Image URL sets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Images {
    #[serde(default)]
    pub jpg: Option<ImageSet>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSet {
    pub image_url: Option<String>,
}

impl Images {
    /// The main JPG image URL, if any
    pub fn main_url(&self) -> Option<&str> {
        self.jpg.as_ref().and_then(|set| set.image_url.as_deref())
    }
}

/// Entry in an anime list page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimeListItem {
    pub mal_id: u32,
    #[serde(default)]
    pub title: Option<String>,
}

/// Full anime details (`/anime/{id}/full`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimeFull {
    pub mal_id: u32,
    #[serde(default)]
    pub approved: bool,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub title_english: Option<String>,
    #[serde(default)]
    pub title_japanese: Option<String>,
    #[serde(default)]
    pub aired: Option<Aired>,
    #[serde(default)]
    pub season: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub episodes: Option<u32>,
    #[serde(default)]
    pub synopsis: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub rank: Option<u32>,
    #[serde(default)]
    pub images: Option<Images>,
    #[serde(default)]
    pub trailer: Option<Trailer>,
    #[serde(default)]
    pub studios: Vec<NamedRef>,
    #[serde(default)]
    pub genres: Vec<NamedRef>,
    #[serde(default)]
    pub explicit_genres: Vec<NamedRef>,
    #[serde(default)]
    pub themes: Vec<NamedRef>,
    #[serde(default)]
    pub demographics: Vec<NamedRef>,
}

/// Aired date range
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aired {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
}

/// Trailer reference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trailer {
    #[serde(default)]
    pub youtube_id: Option<String>,
}

/// Named entity reference (studio, genre, theme, demographic)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedRef {
    pub mal_id: u32,
    pub name: String,
}

/// Entry in a character list page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterListItem {
    pub mal_id: u32,
    #[serde(default)]
    pub name: Option<String>,
}

/// Full character details (`/characters/{id}/full`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterFull {
    pub mal_id: u32,
    pub name: String,
    #[serde(default)]
    pub about: Option<String>,
    #[serde(default)]
    pub images: Option<Images>,
    #[serde(default)]
    pub voices: Vec<VoiceCast>,
    #[serde(default)]
    pub anime: Vec<AnimeographyEntry>,
}

/// One anime a character appears in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimeographyEntry {
    #[serde(default)]
    pub role: Option<String>,
    pub anime: AnimeRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimeRef {
    pub mal_id: u32,
}

/// Voice credit on a character
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceCast {
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub person: Option<Person>,
}

/// Person reference (voice actor)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub mal_id: u32,
    pub name: String,
    #[serde(default)]
    pub birthday: Option<String>,
    #[serde(default)]
    pub about: Option<String>,
}

/// Full person details (`/people/{id}/full`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonFull {
    pub mal_id: u32,
    #[serde(default)]
    pub images: Option<Images>,
}

/// Cast entry from `/anime/{id}/characters`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastEntry {
    pub character: CharacterRef,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub voice_actors: Vec<VoiceCast>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterRef {
    pub mal_id: u32,
    pub name: String,
}

/// Entry in a producer list page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerListItem {
    pub mal_id: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub titles: Vec<ProducerTitle>,
    #[serde(default)]
    pub count: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerTitle {
    #[serde(rename = "type")]
    pub title_type: String,
    pub title: String,
}

impl ProducerListItem {
    /// The default title, falling back to the flat `name` field or the
    /// first available title
    pub fn display_name(&self) -> Option<&str> {
        self.titles
            .iter()
            .find(|t| t.title_type == "Default")
            .or_else(|| self.titles.first())
            .map(|t| t.title.as_str())
            .or(self.name.as_deref())
    }
}

/// Full producer details (`/producers/{id}/full`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerFull {
    pub mal_id: u32,
    #[serde(default)]
    pub about: Option<String>,
    #[serde(default)]
    pub established: Option<String>,
}

/// Genre/theme/demographic entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenreItem {
    pub mal_id: u32,
    pub name: String,
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Minimal search hit carrying only the source ID
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub mal_id: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_producer_display_name_prefers_default_title() {
        let item: ProducerListItem = serde_json::from_str(
            r#"{
                "mal_id": 21,
                "titles": [
                    {"type": "Japanese", "title": "スタジオジブリ"},
                    {"type": "Default", "title": "Studio Ghibli"}
                ],
                "count": 53
            }"#,
        )
        .unwrap();
        assert_eq!(item.display_name(), Some("Studio Ghibli"));
    }

    #[test]
    fn test_producer_display_name_falls_back_to_name() {
        let item: ProducerListItem =
            serde_json::from_str(r#"{"mal_id": 21, "name": "Studio Ghibli"}"#).unwrap();
        assert_eq!(item.display_name(), Some("Studio Ghibli"));
    }

    #[test]
    fn test_anime_full_tolerates_missing_fields() {
        let full: DataEnvelope<AnimeFull> =
            serde_json::from_str(r#"{"data": {"mal_id": 1, "title": "Cowboy Bebop"}}"#).unwrap();
        assert_eq!(full.data.mal_id, 1);
        assert!(!full.data.approved);
        assert!(full.data.genres.is_empty());
    }

    #[test]
    fn test_images_main_url() {
        let images: Images = serde_json::from_str(
            r#"{"jpg": {"image_url": "https://cdn.example/x.jpg"}, "webp": {}}"#,
        )
        .unwrap();
        assert_eq!(images.main_url(), Some("https://cdn.example/x.jpg"));
    }
}
