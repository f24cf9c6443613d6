//! Generic page-oriented ingestion loop.
//!
//! Every entity pipeline plugs into [`Orchestrator::run`] through the
//! [`EntityPipeline`] trait. The orchestrator owns the shared mechanics:
//! checkpointing, dedup against earlier runs, empty-page termination,
//! target counting, and pacing between pages.

use crate::api::FetchOutcome;
use crate::checkpoint::{CheckpointStore, DedupTracker};
use anyhow::Result;
use chrono::Utc;
use rand::Rng;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// What processing one item achieved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Item is now in the catalog (freshly written or already present);
    /// counts toward the target and is never processed again
    Ingested,
    /// Item was filtered out or unusable; not recorded, so a later run
    /// may look at it again
    Skipped,
}

/// One pageable data source feeding the catalog
pub trait EntityPipeline {
    type Item;

    /// Pipeline name, used for the checkpoint namespace and log fields
    fn name(&self) -> &'static str;

    /// Source ID of an item, used for dedup
    fn item_id(&self, item: &Self::Item) -> u32;

    /// Fetch one page of list items
    async fn fetch_page(&mut self, page: u32) -> FetchOutcome<Vec<Self::Item>>;

    /// Ingest one item into the catalog
    async fn process_item(&mut self, item: &Self::Item) -> Result<ItemOutcome>;
}

/// Tunables for one orchestrated run
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Stop once this many items have been ingested across all runs
    pub target_count: Option<u64>,
    /// Stop after this many consecutive pages with no new items
    pub empty_page_limit: u32,
    /// Minimum wall time per page; the remainder is slept off
    pub page_budget: Duration,
    /// Pause between items within a page
    pub item_delay: Duration,
}

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The cumulative ingested count reached the target
    TargetReached,
    /// The source stopped yielding new items
    Exhausted,
}

/// Counters for one run
#[derive(Debug, Clone)]
pub struct RunStats {
    pub pages_fetched: u32,
    pub ingested: u64,
    pub skipped_duplicates: u64,
    pub skipped_items: u64,
    pub errors: u64,
    pub failed_pages: u32,
    /// Cumulative ingested count including earlier runs
    pub total_processed: u64,
    pub stop_reason: StopReason,
}

/// Time to sleep after a page so it fills its budget, scaled by jitter
pub(crate) fn pace_delay(elapsed: Duration, budget: Duration, jitter: f64) -> Duration {
    budget.saturating_sub(elapsed).mul_f64(jitter)
}

/// Drives an [`EntityPipeline`] until its target or exhaustion
pub struct Orchestrator {
    store: CheckpointStore,
    settings: RunSettings,
}

impl Orchestrator {
    pub fn new(store: CheckpointStore, settings: RunSettings) -> Self {
        Self { store, settings }
    }

    /// Run the pipeline to completion, checkpointing after every page
    pub async fn run<P: EntityPipeline>(&self, pipeline: &mut P) -> Result<RunStats> {
        let mut checkpoint = self.store.load();
        let mut tracker = DedupTracker::from_ids(checkpoint.processed_ids.iter().copied());
        let mut page = checkpoint.current_page;
        let mut consecutive_empty = 0u32;

        let mut stats = RunStats {
            pages_fetched: 0,
            ingested: 0,
            skipped_duplicates: 0,
            skipped_items: 0,
            errors: 0,
            failed_pages: 0,
            total_processed: checkpoint.processed_count,
            stop_reason: StopReason::Exhausted,
        };

        info!(
            pipeline = pipeline.name(),
            start_page = page,
            already_processed = checkpoint.processed_count,
            target = ?self.settings.target_count,
            "Starting ingestion run"
        );

        let stop_reason = loop {
            if let Some(target) = self.settings.target_count {
                if checkpoint.processed_count >= target {
                    break StopReason::TargetReached;
                }
            }
            if consecutive_empty >= self.settings.empty_page_limit {
                break StopReason::Exhausted;
            }

            let page_start = Instant::now();

            let items = match pipeline.fetch_page(page).await {
                FetchOutcome::Success(items) => items,
                FetchOutcome::NotFound => {
                    debug!(pipeline = pipeline.name(), page, "Page not found");
                    Vec::new()
                }
                FetchOutcome::ExhaustedRetries(failure) => {
                    warn!(
                        pipeline = pipeline.name(),
                        page,
                        error = %failure,
                        "Page fetch failed, treating as empty"
                    );
                    stats.failed_pages += 1;
                    Vec::new()
                }
            };

            let mut page_new = 0u64;
            for item in &items {
                if let Some(target) = self.settings.target_count {
                    if checkpoint.processed_count >= target {
                        break;
                    }
                }

                let id = pipeline.item_id(item);
                if tracker.seen(id) {
                    stats.skipped_duplicates += 1;
                    continue;
                }

                match pipeline.process_item(item).await {
                    Ok(ItemOutcome::Ingested) => {
                        tracker.mark(id);
                        checkpoint.processed_ids.insert(id);
                        checkpoint.processed_count += 1;
                        page_new += 1;
                        stats.ingested += 1;
                    }
                    Ok(ItemOutcome::Skipped) => {
                        stats.skipped_items += 1;
                    }
                    Err(e) => {
                        warn!(
                            pipeline = pipeline.name(),
                            item_id = id,
                            error = %e,
                            "Failed to process item"
                        );
                        stats.errors += 1;
                    }
                }

                if !self.settings.item_delay.is_zero() {
                    sleep(self.settings.item_delay).await;
                }
            }

            if page_new == 0 {
                consecutive_empty += 1;
            } else {
                consecutive_empty = 0;
            }

            checkpoint.current_page = page;
            checkpoint.last_updated = Utc::now();
            self.store.save(&checkpoint)?;

            stats.pages_fetched += 1;
            info!(
                pipeline = pipeline.name(),
                page,
                new_items = page_new,
                total = checkpoint.processed_count,
                "Page complete"
            );

            page += 1;

            let jitter = rand::thread_rng().gen_range(0.8..=1.2);
            let delay = pace_delay(page_start.elapsed(), self.settings.page_budget, jitter);
            if !delay.is_zero() {
                sleep(delay).await;
            }
        };

        checkpoint.last_updated = Utc::now();
        self.store.save(&checkpoint)?;

        stats.total_processed = checkpoint.processed_count;
        stats.stop_reason = stop_reason;

        match stop_reason {
            StopReason::TargetReached => info!(
                pipeline = pipeline.name(),
                total = checkpoint.processed_count,
                "Target reached"
            ),
            StopReason::Exhausted => info!(
                pipeline = pipeline.name(),
                total = checkpoint.processed_count,
                empty_pages = consecutive_empty,
                "Source exhausted"
            ),
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::FetchFailure;
    use std::collections::HashSet;
    use tempfile::TempDir;

    struct MockPipeline {
        pages: Vec<Vec<u32>>,
        fail_pages: HashSet<u32>,
        skip_items: HashSet<u32>,
        fail_items: HashSet<u32>,
        processed: Vec<u32>,
    }

    impl MockPipeline {
        fn new(pages: Vec<Vec<u32>>) -> Self {
            Self {
                pages,
                fail_pages: HashSet::new(),
                skip_items: HashSet::new(),
                fail_items: HashSet::new(),
                processed: Vec::new(),
            }
        }
    }

    impl EntityPipeline for MockPipeline {
        type Item = u32;

        fn name(&self) -> &'static str {
            "mock"
        }

        fn item_id(&self, item: &u32) -> u32 {
            *item
        }

        async fn fetch_page(&mut self, page: u32) -> FetchOutcome<Vec<u32>> {
            if self.fail_pages.contains(&page) {
                return FetchOutcome::ExhaustedRetries(FetchFailure::Http {
                    status: 500,
                    attempts: 5,
                });
            }
            let index = (page - 1) as usize;
            FetchOutcome::Success(self.pages.get(index).cloned().unwrap_or_default())
        }

        async fn process_item(&mut self, item: &u32) -> Result<ItemOutcome> {
            self.processed.push(*item);
            if self.fail_items.contains(item) {
                anyhow::bail!("simulated processing failure");
            }
            if self.skip_items.contains(item) {
                return Ok(ItemOutcome::Skipped);
            }
            Ok(ItemOutcome::Ingested)
        }
    }

    fn instant_settings(target: Option<u64>) -> RunSettings {
        RunSettings {
            target_count: target,
            empty_page_limit: 3,
            page_budget: Duration::ZERO,
            item_delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_stops_after_consecutive_empty_pages() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path(), "mock").unwrap();
        let orchestrator = Orchestrator::new(store, instant_settings(None));

        let mut pipeline = MockPipeline::new(vec![vec![1, 2], vec![3]]);
        let stats = orchestrator.run(&mut pipeline).await.unwrap();

        assert_eq!(stats.stop_reason, StopReason::Exhausted);
        assert_eq!(stats.ingested, 3);
        // Two real pages plus three empty ones before giving up.
        assert_eq!(stats.pages_fetched, 5);
    }

    #[tokio::test]
    async fn test_stops_at_target() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path(), "mock").unwrap();
        let orchestrator = Orchestrator::new(store, instant_settings(Some(3)));

        let mut pipeline = MockPipeline::new(vec![vec![1, 2, 3, 4, 5], vec![6, 7]]);
        let stats = orchestrator.run(&mut pipeline).await.unwrap();

        assert_eq!(stats.stop_reason, StopReason::TargetReached);
        assert_eq!(stats.ingested, 3);
        assert_eq!(pipeline.processed, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_rerun_processes_nothing_new() {
        let dir = TempDir::new().unwrap();
        let pages = vec![vec![1, 2], vec![3, 4]];

        let store = CheckpointStore::new(dir.path(), "mock").unwrap();
        let orchestrator = Orchestrator::new(store, instant_settings(None));
        let mut first = MockPipeline::new(pages.clone());
        let stats = orchestrator.run(&mut first).await.unwrap();
        assert_eq!(stats.ingested, 4);

        let store = CheckpointStore::new(dir.path(), "mock").unwrap();
        let orchestrator = Orchestrator::new(store, instant_settings(None));
        let mut second = MockPipeline::new(pages);
        let stats = orchestrator.run(&mut second).await.unwrap();

        assert_eq!(stats.ingested, 0);
        assert!(second.processed.is_empty());
        assert_eq!(stats.total_processed, 4);
    }

    #[tokio::test]
    async fn test_resume_picks_up_remaining_items() {
        let dir = TempDir::new().unwrap();
        let pages = vec![vec![1, 2], vec![3, 4], vec![5, 6]];

        // First run stops at a target partway through the source.
        let store = CheckpointStore::new(dir.path(), "mock").unwrap();
        let orchestrator = Orchestrator::new(store, instant_settings(Some(3)));
        let mut first = MockPipeline::new(pages.clone());
        orchestrator.run(&mut first).await.unwrap();

        // Second run with a higher target continues where it left off.
        let store = CheckpointStore::new(dir.path(), "mock").unwrap();
        let orchestrator = Orchestrator::new(store, instant_settings(Some(6)));
        let mut second = MockPipeline::new(pages);
        let stats = orchestrator.run(&mut second).await.unwrap();

        assert_eq!(stats.stop_reason, StopReason::TargetReached);
        assert_eq!(stats.total_processed, 6);
        assert!(second.processed.iter().all(|id| *id >= 4));
    }

    #[tokio::test]
    async fn test_skipped_items_are_not_recorded() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path(), "mock").unwrap();
        let orchestrator = Orchestrator::new(store, instant_settings(None));

        let mut pipeline = MockPipeline::new(vec![vec![1, 2]]);
        pipeline.skip_items.insert(1);
        pipeline.skip_items.insert(2);
        let stats = orchestrator.run(&mut pipeline).await.unwrap();

        assert_eq!(stats.ingested, 0);
        assert_eq!(stats.skipped_items, 2);
        assert_eq!(stats.total_processed, 0);

        // A skip-only page counts as empty, so the run exhausts quickly.
        assert_eq!(stats.stop_reason, StopReason::Exhausted);
    }

    #[tokio::test]
    async fn test_item_errors_do_not_stop_the_run() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path(), "mock").unwrap();
        let orchestrator = Orchestrator::new(store, instant_settings(None));

        let mut pipeline = MockPipeline::new(vec![vec![1, 2, 3]]);
        pipeline.fail_items.insert(2);
        let stats = orchestrator.run(&mut pipeline).await.unwrap();

        assert_eq!(stats.ingested, 2);
        assert_eq!(stats.errors, 1);
    }

    #[tokio::test]
    async fn test_failed_page_counts_toward_exhaustion() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path(), "mock").unwrap();
        let orchestrator = Orchestrator::new(store, instant_settings(None));

        let mut pipeline = MockPipeline::new(vec![vec![1]]);
        pipeline.fail_pages.insert(2);
        let stats = orchestrator.run(&mut pipeline).await.unwrap();

        assert_eq!(stats.failed_pages, 1);
        assert_eq!(stats.stop_reason, StopReason::Exhausted);
        assert_eq!(stats.ingested, 1);
    }

    #[test]
    fn test_pace_delay() {
        let budget = Duration::from_millis(1000);

        // Fast page sleeps off the remaining budget.
        let delay = pace_delay(Duration::from_millis(200), budget, 1.0);
        assert_eq!(delay, Duration::from_millis(800));

        // Slow page sleeps nothing.
        let delay = pace_delay(Duration::from_millis(1500), budget, 1.0);
        assert_eq!(delay, Duration::ZERO);

        // Jitter scales the remainder.
        let delay = pace_delay(Duration::from_millis(500), budget, 0.8);
        assert_eq!(delay, Duration::from_millis(400));
    }
}
