//! Genre ingestion pipeline.
//!
//! The source exposes genres as two flat listings rather than pages, so
//! this pipeline maps page 1 to the anime genre list and page 2 to the
//! manga list; every later page is empty and lets the exhaustion policy
//! finish the run.

use crate::api::types::GenreItem;
use crate::api::{FetchOutcome, JikanClient};
use crate::pipeline::{EntityPipeline, ItemOutcome};
use anyhow::Result;
use shared::{CatalogStore, GenreFields};
use tracing::debug;

pub struct GenrePipeline<'a> {
    client: &'a JikanClient,
    store: &'a CatalogStore,
}

impl<'a> GenrePipeline<'a> {
    pub fn new(client: &'a JikanClient, store: &'a CatalogStore) -> Self {
        Self { client, store }
    }

    fn describe(item: &GenreItem) -> Option<String> {
        let count = item.count?;
        let mut description = format!("Genre with {} anime entries.", count);
        if let Some(url) = &item.url {
            description.push_str(&format!(" MAL URL: {}", url));
        }
        Some(description)
    }
}

impl EntityPipeline for GenrePipeline<'_> {
    type Item = GenreItem;

    fn name(&self) -> &'static str {
        "genres"
    }

    fn item_id(&self, item: &GenreItem) -> u32 {
        item.mal_id
    }

    async fn fetch_page(&mut self, page: u32) -> FetchOutcome<Vec<GenreItem>> {
        match page {
            1 => self.client.get_anime_genres().await.map(|list| list.data),
            2 => self.client.get_manga_genres().await.map(|list| list.data),
            _ => FetchOutcome::Success(Vec::new()),
        }
    }

    async fn process_item(&mut self, item: &GenreItem) -> Result<ItemOutcome> {
        let fields = GenreFields {
            description: Self::describe(item),
        };
        match self.store.resolve_genre(&item.name, &fields)? {
            Some(_) => Ok(ItemOutcome::Ingested),
            None => {
                debug!(mal_id = item.mal_id, "Skipping unnamed genre");
                Ok(ItemOutcome::Skipped)
            }
        }
    }
}
