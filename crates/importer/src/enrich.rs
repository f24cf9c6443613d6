//! Enrichment passes filling gaps left by the ingestion pipelines.
//!
//! Each pass queries the catalog for rows missing an attachment, fetches
//! the missing piece, and writes it back if nothing got there first. A
//! semaphore bounds how many lookups run at once; the rate limiter inside
//! the client keeps the combined request rate legal either way.

use crate::api::{FetchOutcome, JikanClient};
use anyhow::Result;
use shared::{CatalogStore, MediaEntity, PendingEnrichment, PendingTrailer};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Counters for one enrichment pass
#[derive(Debug, Clone, Default)]
pub struct EnrichStats {
    /// Rows the pass looked at
    pub candidates: usize,
    /// Rows that received their missing attachment
    pub enriched: usize,
    /// Rows the source had nothing for
    pub missing: usize,
    /// Rows whose lookup failed
    pub failed: usize,
}

/// Runs the post-ingestion enrichment passes
pub struct Enricher {
    client: Arc<JikanClient>,
    store: Arc<Mutex<CatalogStore>>,
    concurrency: usize,
}

impl Enricher {
    pub fn new(client: Arc<JikanClient>, store: Arc<Mutex<CatalogStore>>, concurrency: usize) -> Self {
        Self {
            client,
            store,
            concurrency: concurrency.max(1),
        }
    }

    /// Attach images to characters that have none
    pub async fn character_images(&self, batch_limit: usize) -> Result<EnrichStats> {
        let pending = self
            .store
            .lock()
            .await
            .characters_missing_images(batch_limit)?;
        info!(candidates = pending.len(), "Starting character image pass");
        self.image_pass(pending, MediaEntity::Character).await
    }

    /// Attach images to voice actors that have none
    pub async fn voice_actor_images(&self, batch_limit: usize) -> Result<EnrichStats> {
        let pending = self
            .store
            .lock()
            .await
            .voice_actors_missing_images(batch_limit)?;
        info!(candidates = pending.len(), "Starting voice actor image pass");
        self.image_pass(pending, MediaEntity::VoiceActor).await
    }

    async fn image_pass(
        &self,
        pending: Vec<PendingEnrichment>,
        entity: MediaEntity,
    ) -> Result<EnrichStats> {
        let mut stats = EnrichStats {
            candidates: pending.len(),
            ..Default::default()
        };
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for row in pending {
            let permit = semaphore.clone().acquire_owned().await?;
            let client = self.client.clone();
            let store = self.store.clone();

            tasks.spawn(async move {
                let _permit = permit;
                let result = lookup_and_attach_image(&client, &store, entity, &row).await;
                (row, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (row, result) = joined?;
            match result {
                Ok(true) => stats.enriched += 1,
                Ok(false) => stats.missing += 1,
                Err(e) => {
                    warn!(entity = entity.as_str(), name = %row.name, error = %e, "Image lookup failed");
                    stats.failed += 1;
                }
            }
        }

        info!(
            entity = entity.as_str(),
            enriched = stats.enriched,
            missing = stats.missing,
            failed = stats.failed,
            "Image pass complete"
        );
        Ok(stats)
    }

    /// Attach trailers to anime that have none
    pub async fn trailers(&self, batch_limit: usize) -> Result<EnrichStats> {
        let pending = self.store.lock().await.anime_missing_trailers(batch_limit)?;
        info!(candidates = pending.len(), "Starting trailer pass");

        let mut stats = EnrichStats {
            candidates: pending.len(),
            ..Default::default()
        };
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for row in pending {
            let permit = semaphore.clone().acquire_owned().await?;
            let client = self.client.clone();
            let store = self.store.clone();

            tasks.spawn(async move {
                let _permit = permit;
                let result = lookup_and_attach_trailer(&client, &store, &row).await;
                (row, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (row, result) = joined?;
            match result {
                Ok(true) => stats.enriched += 1,
                Ok(false) => stats.missing += 1,
                Err(e) => {
                    warn!(title = %row.title, error = %e, "Trailer lookup failed");
                    stats.failed += 1;
                }
            }
        }

        info!(
            enriched = stats.enriched,
            missing = stats.missing,
            failed = stats.failed,
            "Trailer pass complete"
        );
        Ok(stats)
    }
}

/// Find an image for one row by searching the source by name, then write
/// it if the row is still uncovered. Returns whether a row was written.
async fn lookup_and_attach_image(
    client: &JikanClient,
    store: &Mutex<CatalogStore>,
    entity: MediaEntity,
    row: &PendingEnrichment,
) -> Result<bool> {
    let hit = match search_by_name(client, entity, &row.name).await {
        SearchResult::Hit(mal_id) => mal_id,
        SearchResult::Nothing => return Ok(false),
        SearchResult::Failed(e) => return Err(e),
    };

    let url = match entity {
        MediaEntity::Character => match client.get_character_full(hit).await {
            FetchOutcome::Success(envelope) => envelope
                .data
                .images
                .as_ref()
                .and_then(|i| i.main_url())
                .map(str::to_string),
            FetchOutcome::NotFound => None,
            FetchOutcome::ExhaustedRetries(failure) => return Err(failure.into()),
        },
        MediaEntity::VoiceActor => match client.get_person_full(hit).await {
            FetchOutcome::Success(envelope) => envelope
                .data
                .images
                .as_ref()
                .and_then(|i| i.main_url())
                .map(str::to_string),
            FetchOutcome::NotFound => None,
            FetchOutcome::ExhaustedRetries(failure) => return Err(failure.into()),
        },
        MediaEntity::Anime => None,
    };

    let Some(url) = url else {
        return Ok(false);
    };

    let store = store.lock().await;
    if store.has_media(entity, row.id, "image")? {
        return Ok(false);
    }
    store.insert_media_if_absent(entity, row.id, &url, "image")
}

enum SearchResult {
    Hit(u32),
    Nothing,
    Failed(anyhow::Error),
}

async fn search_by_name(client: &JikanClient, entity: MediaEntity, name: &str) -> SearchResult {
    let outcome = match entity {
        MediaEntity::Character => client.search_characters(name).await,
        MediaEntity::VoiceActor => client.search_people(name).await,
        MediaEntity::Anime => return SearchResult::Nothing,
    };
    match outcome {
        FetchOutcome::Success(list) => match list.data.into_iter().next() {
            Some(hit) => SearchResult::Hit(hit.mal_id),
            None => SearchResult::Nothing,
        },
        FetchOutcome::NotFound => SearchResult::Nothing,
        FetchOutcome::ExhaustedRetries(failure) => SearchResult::Failed(failure.into()),
    }
}

/// Fetch one anime's trailer by its stored source ID and write it back.
/// Returns whether a trailer was written.
async fn lookup_and_attach_trailer(
    client: &JikanClient,
    store: &Mutex<CatalogStore>,
    row: &PendingTrailer,
) -> Result<bool> {
    let detail = match client.get_anime_details(row.mal_id).await {
        FetchOutcome::Success(envelope) => envelope.data,
        FetchOutcome::NotFound => return Ok(false),
        FetchOutcome::ExhaustedRetries(failure) => return Err(failure.into()),
    };

    let Some(youtube_id) = detail.trailer.as_ref().and_then(|t| t.youtube_id.as_deref()) else {
        return Ok(false);
    };

    store.lock().await.set_anime_trailer(row.anime_id, youtube_id)?;
    Ok(true)
}
