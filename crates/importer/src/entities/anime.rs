//! Anime ingestion pipeline.
//!
//! List pages come from the popularity-ordered completed-TV listing; each
//! item then costs two detail calls (full record and cast). Everything the
//! full record references (studio, genres, characters, voice actors) is
//! resolved into the catalog along the way.

use super::{truncate_chars, MAX_TEXT_CHARS};
use crate::api::types::{AnimeFull, AnimeListItem, VoiceCast};
use crate::api::{FetchOutcome, JikanClient};
use crate::heuristics;
use crate::pipeline::{EntityPipeline, ItemOutcome};
use anyhow::Result;
use shared::{CatalogStore, CompanyFields, MediaEntity, NewAnime, NewCharacter, VoiceActorFields};
use tracing::{debug, warn};

pub struct AnimePipeline<'a> {
    client: &'a JikanClient,
    store: &'a CatalogStore,
    page_size: u32,
}

impl<'a> AnimePipeline<'a> {
    pub fn new(client: &'a JikanClient, store: &'a CatalogStore, page_size: u32) -> Self {
        Self {
            client,
            store,
            page_size,
        }
    }

    /// Resolve the first listed studio into a company row
    fn resolve_studio(&self, full: &AnimeFull) -> Result<Option<i64>> {
        let Some(studio) = full.studios.first() else {
            return Ok(None);
        };
        let fields = CompanyFields {
            country: Some(
                heuristics::infer_country_from_name(&studio.name)
                    .unwrap_or("Japan")
                    .to_string(),
            ),
            founded: None,
        };
        self.store.resolve_company(&studio.name, &fields)
    }

    /// Compose the display season, e.g. "Spring 1998"
    fn season_label(full: &AnimeFull) -> Option<String> {
        match (&full.season, full.year) {
            (Some(season), Some(year)) => {
                Some(format!("{} {}", heuristics::capitalize(season), year))
            }
            _ => None,
        }
    }

    /// Pick the Japanese voice credit from a cast list
    fn japanese_voice(voices: &[VoiceCast]) -> Option<&VoiceCast> {
        voices
            .iter()
            .find(|v| v.language.as_deref() == Some("Japanese"))
    }

    /// Ingest the cast of an anime: characters, their Japanese voice
    /// actors, and the role links
    async fn ingest_cast(&self, anime_id: i64, mal_id: u32) -> Result<()> {
        let cast = match self.client.get_anime_characters(mal_id).await {
            FetchOutcome::Success(list) => list.data,
            FetchOutcome::NotFound => {
                debug!(mal_id, "No cast listing for anime");
                return Ok(());
            }
            FetchOutcome::ExhaustedRetries(failure) => {
                warn!(mal_id, error = %failure, "Cast fetch failed, continuing without cast");
                return Ok(());
            }
        };

        for entry in cast {
            let voice_actor_id = match Self::japanese_voice(&entry.voice_actors)
                .and_then(|v| v.person.as_ref())
            {
                Some(person) => {
                    let fields = VoiceActorFields {
                        birth_date: person
                            .birthday
                            .as_deref()
                            .and_then(heuristics::parse_birth_date),
                        nationality: person
                            .about
                            .as_deref()
                            .and_then(heuristics::infer_nationality)
                            .map(str::to_string),
                    };
                    self.store.resolve_voice_actor(&person.name, &fields)?
                }
                None => None,
            };

            let (character_id, _) = self.store.get_or_create_character(&NewCharacter {
                mal_id: entry.character.mal_id,
                name: entry.character.name.clone(),
                description: None,
                voice_actor_id,
            })?;

            let role = entry.role.as_deref().unwrap_or("Supporting");
            self.store.link_anime_character(anime_id, character_id, role)?;
        }

        Ok(())
    }
}

impl EntityPipeline for AnimePipeline<'_> {
    type Item = AnimeListItem;

    fn name(&self) -> &'static str {
        "anime"
    }

    fn item_id(&self, item: &AnimeListItem) -> u32 {
        item.mal_id
    }

    async fn fetch_page(&mut self, page: u32) -> FetchOutcome<Vec<AnimeListItem>> {
        self.client
            .get_anime_page(page, self.page_size)
            .await
            .map(|response| response.data)
    }

    async fn process_item(&mut self, item: &AnimeListItem) -> Result<ItemOutcome> {
        let full = match self.client.get_anime_full(item.mal_id).await {
            FetchOutcome::Success(envelope) => envelope.data,
            FetchOutcome::NotFound => {
                debug!(mal_id = item.mal_id, "Anime details not found");
                return Ok(ItemOutcome::Skipped);
            }
            FetchOutcome::ExhaustedRetries(failure) => return Err(failure.into()),
        };

        if !full.approved {
            debug!(mal_id = full.mal_id, "Skipping unapproved anime");
            return Ok(ItemOutcome::Skipped);
        }
        let Some(title) = full.title.as_deref().filter(|t| !t.trim().is_empty()) else {
            debug!(mal_id = full.mal_id, "Skipping untitled anime");
            return Ok(ItemOutcome::Skipped);
        };

        let company_id = self.resolve_studio(&full)?;

        let (anime_id, created) = self.store.get_or_create_anime(&NewAnime {
            mal_id: full.mal_id,
            title: title.to_string(),
            alternative_title: full
                .title_english
                .clone()
                .or_else(|| full.title_japanese.clone()),
            release_date: full
                .aired
                .as_ref()
                .and_then(|a| a.from.as_deref())
                .and_then(heuristics::parse_air_date),
            season: Self::season_label(&full),
            episodes: full.episodes,
            synopsis: full
                .synopsis
                .as_deref()
                .map(|s| truncate_chars(s, MAX_TEXT_CHARS)),
            // Scores come in on a 10-point scale; the catalog uses 5.
            rating: full.score.map(|s| s / 2.0),
            rank: full.rank,
            company_id,
        })?;

        for genre in full
            .genres
            .iter()
            .chain(&full.explicit_genres)
            .chain(&full.themes)
            .chain(&full.demographics)
        {
            if let Some(genre_id) = self.store.resolve_genre(&genre.name, &Default::default())? {
                self.store.link_anime_genre(anime_id, genre_id)?;
            }
        }

        if let Some(url) = full.images.as_ref().and_then(|i| i.main_url()) {
            self.store
                .insert_media_if_absent(MediaEntity::Anime, anime_id, url, "image")?;
        }

        if created {
            self.ingest_cast(anime_id, full.mal_id).await?;
        }

        Ok(ItemOutcome::Ingested)
    }
}
