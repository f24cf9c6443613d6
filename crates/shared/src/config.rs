//! Configuration management for the importer.
//!
//! Loads settings from a TOML file with sensible defaults for everything,
//! so the binary runs without a config file at all.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory settings
    pub data: DataConfig,

    /// Database settings
    pub database: DatabaseConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Jikan API settings
    pub jikan: JikanConfig,

    /// Pagination/ingestion settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Enrichment pass settings
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
}

/// Data directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Root data directory path
    pub root_dir: String,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file path (relative to data directory or absolute)
    pub path: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log directory path (relative to data directory or absolute)
    pub log_dir: String,

    /// Default log level (trace, debug, info, warn, error)
    pub default_level: String,

    /// Enable console output
    pub console: bool,

    /// Enable file output
    pub file: bool,

    /// Enable JSON formatting for file logs
    pub json_format: bool,
}

/// Jikan API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JikanConfig {
    /// Jikan API base URL
    pub base_url: String,

    /// Rate limiting settings
    pub rate_limit: RateLimitConfig,

    /// Maximum retries for failed requests
    pub max_retries: u32,

    /// Base backoff in seconds for HTTP 429 responses
    pub rate_limit_backoff_secs: u64,

    /// Cap in seconds for the 429 backoff ladder
    pub backoff_cap_secs: u64,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests per second
    pub requests_per_second: f64,

    /// Maximum requests per minute
    pub requests_per_minute: u32,
}

/// Ingestion pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Items requested per list page
    pub page_size: u32,

    /// Time budget per page in milliseconds; pages finishing early are
    /// padded with a jittered sleep
    pub page_budget_ms: u64,

    /// Delay between items within a page in milliseconds
    pub item_delay_ms: u64,

    /// Consecutive pages with zero new items before the run stops
    pub empty_page_limit: u32,

    /// Directory holding per-pipeline checkpoint files (relative to the
    /// data directory or absolute)
    pub checkpoint_dir: String,

    /// Target number of anime to import
    pub target_anime: u64,

    /// Target number of characters to import
    pub target_characters: u64,

    /// Target number of companies to import
    pub target_companies: u64,
}

/// Enrichment pass configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Maximum concurrent in-flight enrichment items (1..~10)
    pub concurrency: usize,

    /// Maximum rows picked up per enrichment run
    pub batch_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            page_size: 25,
            page_budget_ms: 1000,
            item_delay_ms: 500,
            empty_page_limit: 3,
            checkpoint_dir: "checkpoints".to_string(),
            target_anime: 1000,
            target_characters: 1000,
            target_companies: 500,
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            batch_limit: 1000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data: DataConfig {
                root_dir: "data".to_string(),
            },
            database: DatabaseConfig {
                path: "catalog.db".to_string(),
            },
            logging: LoggingConfig {
                log_dir: "logs".to_string(),
                default_level: "info".to_string(),
                console: true,
                file: true,
                json_format: false,
            },
            jikan: JikanConfig {
                base_url: "https://api.jikan.moe/v4".to_string(),
                rate_limit: RateLimitConfig {
                    requests_per_second: 2.0,
                    requests_per_minute: 50,
                },
                max_retries: 5,
                rate_limit_backoff_secs: 5,
                backoff_cap_secs: 60,
            },
            pipeline: PipelineConfig::default(),
            enrichment: EnrichmentConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// If the file doesn't exist, returns the default configuration.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "Config file not found, using defaults"
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            "Configuration saved successfully"
        );

        Ok(())
    }

    /// Get the absolute path for the data directory
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data.root_dir)
    }

    /// Get the absolute path for the database file
    pub fn database_path(&self) -> PathBuf {
        self.resolve(&self.database.path)
    }

    /// Get the absolute path for the log directory
    pub fn log_dir(&self) -> PathBuf {
        self.resolve(&self.logging.log_dir)
    }

    /// Get the absolute path for the checkpoint directory
    pub fn checkpoint_dir(&self) -> PathBuf {
        self.resolve(&self.pipeline.checkpoint_dir)
    }

    fn resolve(&self, raw: &str) -> PathBuf {
        let path = Path::new(raw);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir().join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.data.root_dir, "data");
        assert_eq!(config.database.path, "catalog.db");
        assert_eq!(config.jikan.rate_limit.requests_per_second, 2.0);
        assert_eq!(config.pipeline.empty_page_limit, 3);
        assert_eq!(config.enrichment.concurrency, 1);
    }

    #[test]
    fn test_save_and_load_config() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("config.toml");

        let original_config = Config::default();
        original_config.save(&config_path)?;

        assert!(config_path.exists());

        let loaded_config = Config::from_file(&config_path)?;
        assert_eq!(loaded_config.data.root_dir, original_config.data.root_dir);
        assert_eq!(loaded_config.jikan.base_url, original_config.jikan.base_url);
        assert_eq!(
            loaded_config.pipeline.target_anime,
            original_config.pipeline.target_anime
        );

        Ok(())
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        // Should return default config without error
        assert_eq!(config.data.root_dir, "data");
    }

    #[test]
    fn test_path_resolution() {
        let config = Config::default();

        let db_path = config.database_path();
        assert!(db_path.ends_with("data/catalog.db"));

        let log_dir = config.log_dir();
        assert!(log_dir.ends_with("data/logs"));

        let checkpoint_dir = config.checkpoint_dir();
        assert!(checkpoint_dir.ends_with("data/checkpoints"));
    }
}
