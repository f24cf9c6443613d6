//! Character ingestion pipeline.
//!
//! List pages come from the favorites-ordered character listing. Each item
//! costs one detail call, which also carries voice credits and the
//! animeography used to link the character to anime already in the catalog.

use super::{truncate_chars, MAX_TEXT_CHARS};
use crate::api::types::{CharacterFull, CharacterListItem};
use crate::api::{FetchOutcome, JikanClient};
use crate::heuristics;
use crate::pipeline::{EntityPipeline, ItemOutcome};
use anyhow::Result;
use shared::{CatalogStore, MediaEntity, NewCharacter, VoiceActorFields};
use tracing::debug;

pub struct CharacterPipeline<'a> {
    client: &'a JikanClient,
    store: &'a CatalogStore,
    page_size: u32,
}

impl<'a> CharacterPipeline<'a> {
    pub fn new(client: &'a JikanClient, store: &'a CatalogStore, page_size: u32) -> Self {
        Self {
            client,
            store,
            page_size,
        }
    }

    /// Resolve the character's Japanese voice actor, if credited
    fn resolve_voice_actor(&self, full: &CharacterFull) -> Result<Option<i64>> {
        let person = full
            .voices
            .iter()
            .find(|v| v.language.as_deref() == Some("Japanese"))
            .and_then(|v| v.person.as_ref());

        let Some(person) = person else {
            return Ok(None);
        };

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
        self.store.resolve_voice_actor(&person.name, &fields)
    }

    /// Link the character to every catalogued anime it appears in
    fn link_animeography(&self, character_id: i64, full: &CharacterFull) -> Result<()> {
        for appearance in &full.anime {
            if let Some(anime_id) = self.store.find_anime_by_mal_id(appearance.anime.mal_id)? {
                let role = appearance.role.as_deref().unwrap_or("Supporting");
                self.store
                    .link_anime_character(anime_id, character_id, role)?;
            }
        }
        Ok(())
    }
}

impl EntityPipeline for CharacterPipeline<'_> {
    type Item = CharacterListItem;

    fn name(&self) -> &'static str {
        "characters"
    }

    fn item_id(&self, item: &CharacterListItem) -> u32 {
        item.mal_id
    }

    async fn fetch_page(&mut self, page: u32) -> FetchOutcome<Vec<CharacterListItem>> {
        self.client
            .get_character_page(page, self.page_size)
            .await
            .map(|response| response.data)
    }

    async fn process_item(&mut self, item: &CharacterListItem) -> Result<ItemOutcome> {
        let full = match self.client.get_character_full(item.mal_id).await {
            FetchOutcome::Success(envelope) => envelope.data,
            FetchOutcome::NotFound => {
                debug!(mal_id = item.mal_id, "Character details not found");
                return Ok(ItemOutcome::Skipped);
            }
            FetchOutcome::ExhaustedRetries(failure) => return Err(failure.into()),
        };

        let voice_actor_id = self.resolve_voice_actor(&full)?;

        let (character_id, _) = self.store.get_or_create_character(&NewCharacter {
            mal_id: full.mal_id,
            name: full.name.clone(),
            description: full
                .about
                .as_deref()
                .map(|s| truncate_chars(s, MAX_TEXT_CHARS)),
            voice_actor_id,
        })?;

        if let Some(url) = full.images.as_ref().and_then(|i| i.main_url()) {
            self.store
                .insert_media_if_absent(MediaEntity::Character, character_id, url, "image")?;
        }

        self.link_animeography(character_id, &full)?;

        Ok(ItemOutcome::Ingested)
    }
}
