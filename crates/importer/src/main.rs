//! Anime catalog importer CLI application.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use importer::entities::{AnimePipeline, CharacterPipeline, CompanyPipeline, GenrePipeline};
use importer::{CheckpointStore, EnrichStats, Enricher, JikanClient, Orchestrator, RunSettings, RunStats};
use shared::{CatalogStore, Config, Database};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import anime from the completed-TV listing
    Anime {
        /// Override the configured target count
        #[arg(long)]
        target: Option<u64>,
    },
    /// Import characters from the favorites-ordered listing
    Characters {
        /// Override the configured target count
        #[arg(long)]
        target: Option<u64>,
    },
    /// Import production companies and studios
    Companies {
        /// Override the configured target count
        #[arg(long)]
        target: Option<u64>,
    },
    /// Import genres, themes, and demographics
    Genres,
    /// Attach images to characters that have none
    CharacterImages,
    /// Attach images to voice actors that have none
    VoiceActorImages,
    /// Attach trailers to anime that have none
    Trailers,
    /// Insert the curated list of major studios
    SeedStudios,
    /// Insert the curated list of custom genres
    SeedGenres,
}

fn run_settings(config: &Config, target: u64) -> RunSettings {
    RunSettings {
        target_count: Some(target),
        empty_page_limit: config.pipeline.empty_page_limit,
        page_budget: Duration::from_millis(config.pipeline.page_budget_ms),
        item_delay: Duration::from_millis(config.pipeline.item_delay_ms),
    }
}

fn report_run(stats: &RunStats) {
    info!("=== Import Complete ===");
    info!("Stop reason: {:?}", stats.stop_reason);
    info!("Pages fetched: {}", stats.pages_fetched);
    info!("Items ingested this run: {}", stats.ingested);
    info!("Duplicates skipped: {}", stats.skipped_duplicates);
    info!("Items filtered out: {}", stats.skipped_items);
    info!("Item errors: {}", stats.errors);
    info!("Failed pages: {}", stats.failed_pages);
    info!("Total ingested across runs: {}", stats.total_processed);
}

fn report_enrichment(stats: &EnrichStats) {
    info!("=== Enrichment Complete ===");
    info!("Candidates: {}", stats.candidates);
    info!("Enriched: {}", stats.enriched);
    info!("Nothing found: {}", stats.missing);
    info!("Failures: {}", stats.failed);
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Initialize logging
    let log_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    shared::logging::init(shared::LogConfig {
        log_dir: config.log_dir().to_string_lossy().to_string(),
        component: "importer".to_string(),
        default_level: log_level,
        console: true,
        file: true,
        json_format: config.logging.json_format,
    })?;

    info!("Catalog importer starting");
    info!(config_file = %args.config.display(), "Loaded configuration");

    std::fs::create_dir_all(config.data_dir()).context("Failed to create data directory")?;

    // Initialize database
    let db_path = config.database_path();
    info!(db_path = %db_path.display(), "Opening database");
    let database = Database::open(&db_path).context("Failed to open database")?;
    let store = CatalogStore::new(database);

    // Initialize API client
    let client = JikanClient::new(
        config.jikan.base_url.clone(),
        config.jikan.rate_limit.requests_per_second,
        config.jikan.rate_limit.requests_per_minute,
        config.jikan.max_retries,
        config.jikan.rate_limit_backoff_secs,
        config.jikan.backoff_cap_secs,
    )
    .context("Failed to create Jikan client")?;

    let checkpoint_dir = config.checkpoint_dir();

    match args.command {
        Command::Anime { target } => {
            let target = target.unwrap_or(config.pipeline.target_anime);
            let orchestrator = Orchestrator::new(
                CheckpointStore::new(&checkpoint_dir, "anime")?,
                run_settings(&config, target),
            );
            let mut pipeline = AnimePipeline::new(&client, &store, config.pipeline.page_size);
            let stats = orchestrator
                .run(&mut pipeline)
                .await
                .context("Anime import failed")?;
            report_run(&stats);
        }
        Command::Characters { target } => {
            let target = target.unwrap_or(config.pipeline.target_characters);
            let orchestrator = Orchestrator::new(
                CheckpointStore::new(&checkpoint_dir, "characters")?,
                run_settings(&config, target),
            );
            let mut pipeline = CharacterPipeline::new(&client, &store, config.pipeline.page_size);
            let stats = orchestrator
                .run(&mut pipeline)
                .await
                .context("Character import failed")?;
            report_run(&stats);
        }
        Command::Companies { target } => {
            let target = target.unwrap_or(config.pipeline.target_companies);
            let orchestrator = Orchestrator::new(
                CheckpointStore::new(&checkpoint_dir, "companies")?,
                run_settings(&config, target),
            );
            let mut pipeline = CompanyPipeline::new(&client, &store, config.pipeline.page_size);
            let stats = orchestrator
                .run(&mut pipeline)
                .await
                .context("Company import failed")?;
            report_run(&stats);
        }
        Command::Genres => {
            // The genre listings are small and finite; no target applies.
            let settings = RunSettings {
                target_count: None,
                empty_page_limit: config.pipeline.empty_page_limit,
                page_budget: Duration::from_millis(config.pipeline.page_budget_ms),
                item_delay: Duration::from_millis(config.pipeline.item_delay_ms),
            };
            let orchestrator =
                Orchestrator::new(CheckpointStore::new(&checkpoint_dir, "genres")?, settings);
            let mut pipeline = GenrePipeline::new(&client, &store);
            let stats = orchestrator
                .run(&mut pipeline)
                .await
                .context("Genre import failed")?;
            report_run(&stats);
        }
        Command::CharacterImages => {
            let enricher = enricher(client, store, &config);
            let stats = enricher
                .character_images(config.enrichment.batch_limit)
                .await
                .context("Character image enrichment failed")?;
            report_enrichment(&stats);
        }
        Command::VoiceActorImages => {
            let enricher = enricher(client, store, &config);
            let stats = enricher
                .voice_actor_images(config.enrichment.batch_limit)
                .await
                .context("Voice actor image enrichment failed")?;
            report_enrichment(&stats);
        }
        Command::Trailers => {
            let enricher = enricher(client, store, &config);
            let stats = enricher
                .trailers(config.enrichment.batch_limit)
                .await
                .context("Trailer enrichment failed")?;
            report_enrichment(&stats);
        }
        Command::SeedStudios => {
            let created = importer::seed::seed_major_studios(&store)?;
            info!("New studios inserted: {}", created);
        }
        Command::SeedGenres => {
            let created = importer::seed::seed_custom_genres(&store)?;
            info!("New genres inserted: {}", created);
        }
    }

    info!("Catalog importer finished successfully");

    Ok(())
}

fn enricher(client: JikanClient, store: CatalogStore, config: &Config) -> Enricher {
    Enricher::new(
        Arc::new(client),
        Arc::new(tokio::sync::Mutex::new(store)),
        config.enrichment.concurrency,
    )
}
