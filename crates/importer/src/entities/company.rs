//! Company ingestion pipeline.
//!
//! List pages come from the producer listing ordered by anime count. A
//! company already in the catalog skips its detail fetch entirely; a
//! failed detail fetch degrades to name-based heuristics instead of
//! losing the row.

use crate::api::types::ProducerListItem;
use crate::api::{FetchOutcome, JikanClient};
use crate::heuristics;
use crate::pipeline::{EntityPipeline, ItemOutcome};
use anyhow::Result;
use shared::{CatalogStore, CompanyFields};
use tracing::{debug, warn};

pub struct CompanyPipeline<'a> {
    client: &'a JikanClient,
    store: &'a CatalogStore,
    page_size: u32,
}

impl<'a> CompanyPipeline<'a> {
    pub fn new(client: &'a JikanClient, store: &'a CatalogStore, page_size: u32) -> Self {
        Self {
            client,
            store,
            page_size,
        }
    }

    /// Derive insert fields from the detail record, or from the name alone
    /// when the detail fetch yields nothing
    async fn company_fields(&self, mal_id: u32, name: &str) -> CompanyFields {
        let detail = match self.client.get_producer_full(mal_id).await {
            FetchOutcome::Success(envelope) => Some(envelope.data),
            FetchOutcome::NotFound => {
                debug!(mal_id, "No producer details");
                None
            }
            FetchOutcome::ExhaustedRetries(failure) => {
                warn!(mal_id, error = %failure, "Producer detail fetch failed, using name heuristics");
                None
            }
        };

        let about = detail.as_ref().and_then(|d| d.about.as_deref());
        let country = about
            .and_then(heuristics::infer_country_from_about)
            .or_else(|| heuristics::infer_country_from_name(name))
            .unwrap_or("Japan");

        CompanyFields {
            country: Some(country.to_string()),
            founded: detail
                .as_ref()
                .and_then(|d| d.established.as_deref())
                .and_then(heuristics::parse_established),
        }
    }
}

impl EntityPipeline for CompanyPipeline<'_> {
    type Item = ProducerListItem;

    fn name(&self) -> &'static str {
        "companies"
    }

    fn item_id(&self, item: &ProducerListItem) -> u32 {
        item.mal_id
    }

    async fn fetch_page(&mut self, page: u32) -> FetchOutcome<Vec<ProducerListItem>> {
        self.client
            .get_producer_page(page, self.page_size)
            .await
            .map(|response| response.data)
    }

    async fn process_item(&mut self, item: &ProducerListItem) -> Result<ItemOutcome> {
        let Some(name) = item.display_name().filter(|n| !n.trim().is_empty()) else {
            debug!(mal_id = item.mal_id, "Skipping unnamed producer");
            return Ok(ItemOutcome::Skipped);
        };

        // An existing row means the detail call can be saved outright.
        if self.store.find_company(name)?.is_some() {
            debug!(mal_id = item.mal_id, name, "Company already in catalog");
            return Ok(ItemOutcome::Ingested);
        }

        let fields = self.company_fields(item.mal_id, name).await;
        match self.store.resolve_company(name, &fields)? {
            Some(_) => Ok(ItemOutcome::Ingested),
            None => Ok(ItemOutcome::Skipped),
        }
    }
}
