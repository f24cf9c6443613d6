//! Importer library: ingestion and enrichment pipelines for the anime
//! catalog, fed by the Jikan API.
//!
//! The building blocks:
//! - [`api`]: rate-limited, retrying HTTP client and response types
//! - [`checkpoint`]: resumable run state on disk
//! - [`pipeline`]: the generic page/process/checkpoint/pace loop
//! - [`entities`]: the concrete anime, character, company, and genre
//!   pipelines
//! - [`enrich`]: post-ingestion passes for images and trailers
//! - [`seed`]: curated studio and genre seed data

pub mod api;
pub mod checkpoint;
pub mod enrich;
pub mod entities;
pub mod heuristics;
pub mod pipeline;
pub mod seed;

pub use api::{FetchFailure, FetchOutcome, JikanClient};
pub use checkpoint::{Checkpoint, CheckpointStore, DedupTracker};
pub use enrich::{EnrichStats, Enricher};
pub use pipeline::{
    EntityPipeline, ItemOutcome, Orchestrator, RunSettings, RunStats, StopReason,
};
