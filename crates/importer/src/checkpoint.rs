//! Resumable run state: checkpoints on disk, dedup tracking in memory.
//!
//! A checkpoint is a small JSON document written atomically after every
//! page. A missing or unreadable file is treated as a fresh start so a
//! corrupted checkpoint can never wedge a pipeline.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Persistent progress of one ingestion pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Last fully processed page
    pub current_page: u32,
    /// Number of items ingested so far
    pub processed_count: u64,
    /// Source IDs already handled
    pub processed_ids: BTreeSet<u32>,
    /// When this checkpoint was written
    pub last_updated: DateTime<Utc>,
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self {
            current_page: 1,
            processed_count: 0,
            processed_ids: BTreeSet::new(),
            last_updated: Utc::now(),
        }
    }
}

/// Loads and atomically saves checkpoints for one named pipeline
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    /// Create a store writing to `<dir>/<namespace>.json`
    pub fn new(dir: impl AsRef<Path>, namespace: &str) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create checkpoint directory: {:?}", dir))?;
        Ok(Self {
            path: dir.join(format!("{}.json", namespace)),
        })
    }

    /// Load the checkpoint, falling back to a fresh one on any failure
    pub fn load(&self) -> Checkpoint {
        match fs::read_to_string(&self.path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(checkpoint) => {
                    debug!(path = ?self.path, "Loaded checkpoint");
                    checkpoint
                }
                Err(e) => {
                    warn!(path = ?self.path, error = %e, "Corrupt checkpoint, starting fresh");
                    Checkpoint::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = ?self.path, "No checkpoint found, starting fresh");
                Checkpoint::default()
            }
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Unreadable checkpoint, starting fresh");
                Checkpoint::default()
            }
        }
    }

    /// Write the checkpoint atomically (temp file then rename)
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let raw = serde_json::to_string_pretty(checkpoint)
            .context("Failed to serialize checkpoint")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw)
            .with_context(|| format!("Failed to write checkpoint temp file: {:?}", tmp))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace checkpoint: {:?}", self.path))?;
        debug!(path = ?self.path, page = checkpoint.current_page, "Saved checkpoint");
        Ok(())
    }

    /// Path of the checkpoint file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// In-memory set of source IDs handled during this or earlier runs
#[derive(Debug, Default)]
pub struct DedupTracker {
    seen: HashSet<u32>,
}

impl DedupTracker {
    /// Seed the tracker from a checkpoint's processed IDs
    pub fn from_ids<I: IntoIterator<Item = u32>>(ids: I) -> Self {
        Self {
            seen: ids.into_iter().collect(),
        }
    }

    /// Whether this ID has already been handled
    pub fn seen(&self, id: u32) -> bool {
        self.seen.contains(&id)
    }

    /// Record an ID; returns false if it was already present
    pub fn mark(&mut self, id: u32) -> bool {
        self.seen.insert(id)
    }

    /// Number of tracked IDs
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether no IDs are tracked yet
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_checkpoint_yields_default() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path(), "anime").unwrap();

        let checkpoint = store.load();
        assert_eq!(checkpoint.current_page, 1);
        assert_eq!(checkpoint.processed_count, 0);
        assert!(checkpoint.processed_ids.is_empty());
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path(), "anime").unwrap();

        let mut checkpoint = Checkpoint::default();
        checkpoint.current_page = 7;
        checkpoint.processed_count = 42;
        checkpoint.processed_ids.insert(1);
        checkpoint.processed_ids.insert(5);
        store.save(&checkpoint).unwrap();

        let loaded = store.load();
        assert_eq!(loaded.current_page, 7);
        assert_eq!(loaded.processed_count, 42);
        assert_eq!(loaded.processed_ids.len(), 2);
        assert!(loaded.processed_ids.contains(&5));
    }

    #[test]
    fn test_corrupt_checkpoint_yields_default() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path(), "anime").unwrap();

        std::fs::write(store.path(), "{not json").unwrap();

        let checkpoint = store.load();
        assert_eq!(checkpoint.current_page, 1);
        assert_eq!(checkpoint.processed_count, 0);
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path(), "characters").unwrap();

        store.save(&Checkpoint::default()).unwrap();
        store.save(&Checkpoint::default()).unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("characters.json")]);
    }

    #[test]
    fn test_namespaces_do_not_collide() {
        let dir = TempDir::new().unwrap();
        let anime = CheckpointStore::new(dir.path(), "anime").unwrap();
        let characters = CheckpointStore::new(dir.path(), "characters").unwrap();

        let mut checkpoint = Checkpoint::default();
        checkpoint.current_page = 9;
        anime.save(&checkpoint).unwrap();

        assert_eq!(characters.load().current_page, 1);
        assert_eq!(anime.load().current_page, 9);
    }

    #[test]
    fn test_dedup_tracker() {
        let mut tracker = DedupTracker::from_ids([1, 2, 3]);
        assert!(tracker.seen(2));
        assert!(!tracker.seen(4));

        assert!(tracker.mark(4));
        assert!(!tracker.mark(4));
        assert_eq!(tracker.len(), 4);
    }
}
