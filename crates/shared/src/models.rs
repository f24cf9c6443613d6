//! Data models for the catalog.
//!
//! These structs describe rows as the importer writes them; database IDs
//! are assigned by SQLite on insert.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A new anime row, mapped from the remote payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAnime {
    pub mal_id: u32,
    pub title: String,
    pub alternative_title: Option<String>,
    pub release_date: Option<NaiveDate>,
    /// Season string like "Spring 2020"
    pub season: Option<String>,
    pub episodes: Option<u32>,
    pub synopsis: Option<String>,
    /// Score converted from the remote 10-point scale to 5 points
    pub rating: Option<f64>,
    pub rank: Option<u32>,
    pub company_id: Option<i64>,
}

/// A new character row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCharacter {
    pub mal_id: u32,
    pub name: String,
    pub description: Option<String>,
    pub voice_actor_id: Option<i64>,
}

/// Insert-only fields for a company, derived on first resolution
#[derive(Debug, Clone, Default)]
pub struct CompanyFields {
    pub country: Option<String>,
    pub founded: Option<NaiveDate>,
}

/// Insert-only fields for a genre
#[derive(Debug, Clone, Default)]
pub struct GenreFields {
    pub description: Option<String>,
}

/// Insert-only fields for a voice actor, derived on first resolution
#[derive(Debug, Clone, Default)]
pub struct VoiceActorFields {
    pub birth_date: Option<NaiveDate>,
    pub nationality: Option<String>,
}

/// Entity kind for the polymorphic media table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaEntity {
    Anime,
    Character,
    VoiceActor,
}

impl MediaEntity {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaEntity::Anime => "anime",
            MediaEntity::Character => "character",
            MediaEntity::VoiceActor => "voice_actor",
        }
    }
}

/// A row still missing an associated media entry, picked up by the
/// image enrichment passes
#[derive(Debug, Clone)]
pub struct PendingEnrichment {
    pub id: i64,
    pub name: String,
}

/// An anime row still missing its trailer
#[derive(Debug, Clone)]
pub struct PendingTrailer {
    pub anime_id: i64,
    pub mal_id: u32,
    pub title: String,
}
