//! Shared library for the anime catalog importer.
//!
//! This crate provides the functionality common to every ingestion
//! pipeline:
//! - Configuration management
//! - Database schema and connection handling
//! - Domain models
//! - Generic get-or-create entity resolution
//! - Catalog persistence (writers and enrichment queries)
//! - Logging infrastructure

pub mod config;
pub mod db;
pub mod logging;
pub mod models;
pub mod resolver;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use logging::LogConfig;
pub use models::*;
pub use resolver::EntityResolver;
pub use store::CatalogStore;

/// Common result type using anyhow::Error
pub type Result<T> = anyhow::Result<T>;
