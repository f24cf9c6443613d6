//! Catalog persistence for the ingestion pipelines.
//!
//! High-level API over the SQLite database: idempotent writers for the
//! primary entities (anime, characters), conflict-tolerant join/media
//! inserts, and the queries the enrichment passes start from.

use crate::models::*;
use crate::resolver::EntityResolver;
use crate::Database;
use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension};
use tracing::{debug, info};

/// Catalog store wrapping the database connection
pub struct CatalogStore {
    db: Database,
    company: EntityResolver,
    genre: EntityResolver,
    voice_actor: EntityResolver,
}

impl CatalogStore {
    /// Create a new store with the given database
    pub fn new(db: Database) -> Self {
        Self {
            db,
            company: EntityResolver::company(),
            genre: EntityResolver::genre(),
            voice_actor: EntityResolver::voice_actor(),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Get or create an anime entry, deduplicated by MAL ID
    ///
    /// Returns the database ID and whether a new row was inserted.
    pub fn get_or_create_anime(&self, anime: &NewAnime) -> Result<(i64, bool)> {
        let existing: Option<i64> = self
            .db
            .conn()
            .query_row(
                "SELECT anime_id FROM anime WHERE mal_id = ?1",
                params![anime.mal_id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query for existing anime")?;

        if let Some(id) = existing {
            debug!(mal_id = anime.mal_id, db_id = id, "Anime already exists");
            return Ok((id, false));
        }

        let insert = self.db.conn().execute(
            "INSERT INTO anime (
                mal_id, title, alternative_title, release_date, season,
                episodes, synopsis, rating, rank, company_id,
                seed_rating, seed_count
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                anime.mal_id,
                anime.title,
                anime.alternative_title,
                anime.release_date,
                anime.season,
                anime.episodes,
                anime.synopsis,
                anime.rating,
                anime.rank,
                anime.company_id,
                anime.rating.unwrap_or(0.0),
                if anime.rating.is_some() { 1 } else { 0 },
            ],
        );

        match insert {
            Ok(_) => {
                let id = self.db.conn().last_insert_rowid();
                info!(mal_id = anime.mal_id, db_id = id, title = %anime.title, "Created anime entry");
                Ok((id, true))
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                let id: i64 = self.db.conn().query_row(
                    "SELECT anime_id FROM anime WHERE mal_id = ?1",
                    params![anime.mal_id],
                    |row| row.get(0),
                )?;
                debug!(mal_id = anime.mal_id, db_id = id, "Anime insert conflicted, reusing row");
                Ok((id, false))
            }
            Err(e) => Err(e).context("Failed to insert anime"),
        }
    }

    /// Get or create a character entry, deduplicated by MAL ID
    pub fn get_or_create_character(&self, character: &NewCharacter) -> Result<(i64, bool)> {
        let existing: Option<i64> = self
            .db
            .conn()
            .query_row(
                "SELECT character_id FROM characters WHERE mal_id = ?1",
                params![character.mal_id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query for existing character")?;

        if let Some(id) = existing {
            debug!(mal_id = character.mal_id, db_id = id, "Character already exists");
            return Ok((id, false));
        }

        let insert = self.db.conn().execute(
            "INSERT INTO characters (mal_id, name, description, voice_actor_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                character.mal_id,
                character.name,
                character.description,
                character.voice_actor_id,
            ],
        );

        match insert {
            Ok(_) => {
                let id = self.db.conn().last_insert_rowid();
                info!(mal_id = character.mal_id, db_id = id, name = %character.name, "Created character entry");
                Ok((id, true))
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                let id: i64 = self.db.conn().query_row(
                    "SELECT character_id FROM characters WHERE mal_id = ?1",
                    params![character.mal_id],
                    |row| row.get(0),
                )?;
                Ok((id, false))
            }
            Err(e) => Err(e).context("Failed to insert character"),
        }
    }

    /// Find a company by name without creating it
    pub fn find_company(&self, name: &str) -> Result<Option<i64>> {
        self.company.find(&self.db, name)
    }

    /// Find an anime's database ID by its MAL ID
    pub fn find_anime_by_mal_id(&self, mal_id: u32) -> Result<Option<i64>> {
        self.db
            .conn()
            .query_row(
                "SELECT anime_id FROM anime WHERE mal_id = ?1",
                params![mal_id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query anime by MAL ID")
    }

    /// Resolve a company by name, inserting derived fields on first sight
    pub fn resolve_company(&self, name: &str, fields: &CompanyFields) -> Result<Option<i64>> {
        self.company.resolve(
            &self.db,
            name,
            &[("country", &fields.country), ("founded", &fields.founded)],
        )
    }

    /// Resolve a genre by name
    pub fn resolve_genre(&self, name: &str, fields: &GenreFields) -> Result<Option<i64>> {
        self.genre
            .resolve(&self.db, name, &[("description", &fields.description)])
    }

    /// Resolve a voice actor by name, inserting derived fields on first sight
    pub fn resolve_voice_actor(&self, name: &str, fields: &VoiceActorFields) -> Result<Option<i64>> {
        self.voice_actor.resolve(
            &self.db,
            name,
            &[
                ("birth_date", &fields.birth_date),
                ("nationality", &fields.nationality),
            ],
        )
    }

    /// Link an anime to a genre; a duplicate link is a no-op
    pub fn link_anime_genre(&self, anime_id: i64, genre_id: i64) -> Result<()> {
        self.db
            .conn()
            .execute(
                "INSERT OR IGNORE INTO anime_genre (anime_id, genre_id) VALUES (?1, ?2)",
                params![anime_id, genre_id],
            )
            .context("Failed to link anime to genre")?;
        Ok(())
    }

    /// Link an anime to a character with a role; a duplicate link is a no-op
    pub fn link_anime_character(&self, anime_id: i64, character_id: i64, role: &str) -> Result<()> {
        self.db
            .conn()
            .execute(
                "INSERT OR IGNORE INTO anime_character (anime_id, character_id, role)
                 VALUES (?1, ?2, ?3)",
                params![anime_id, character_id, role],
            )
            .context("Failed to link anime to character")?;
        Ok(())
    }

    /// Attach a media URL to an entity if none of that type exists yet
    ///
    /// Returns whether a row was actually inserted.
    pub fn insert_media_if_absent(
        &self,
        entity: MediaEntity,
        entity_id: i64,
        url: &str,
        media_type: &str,
    ) -> Result<bool> {
        let inserted = self
            .db
            .conn()
            .execute(
                "INSERT OR IGNORE INTO media (url, entity_type, entity_id, media_type)
                 VALUES (?1, ?2, ?3, ?4)",
                params![url, entity.as_str(), entity_id, media_type],
            )
            .context("Failed to insert media")?;
        Ok(inserted > 0)
    }

    /// Check whether an entity already has a media row of the given type
    pub fn has_media(&self, entity: MediaEntity, entity_id: i64, media_type: &str) -> Result<bool> {
        let found: Option<i64> = self
            .db
            .conn()
            .query_row(
                "SELECT 1 FROM media
                 WHERE entity_type = ?1 AND entity_id = ?2 AND media_type = ?3
                 LIMIT 1",
                params![entity.as_str(), entity_id, media_type],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query media")?;
        Ok(found.is_some())
    }

    /// Store the YouTube trailer ID for an anime
    pub fn set_anime_trailer(&self, anime_id: i64, youtube_id: &str) -> Result<()> {
        self.db
            .conn()
            .execute(
                "UPDATE anime SET trailer_url_yt_id = ?1 WHERE anime_id = ?2",
                params![youtube_id, anime_id],
            )
            .context("Failed to set anime trailer")?;
        Ok(())
    }

    /// Characters with no image yet, for the image enrichment pass
    pub fn characters_missing_images(&self, limit: usize) -> Result<Vec<PendingEnrichment>> {
        self.missing_media_rows("characters", "character_id", "character", limit)
    }

    /// Voice actors with no image yet
    pub fn voice_actors_missing_images(&self, limit: usize) -> Result<Vec<PendingEnrichment>> {
        self.missing_media_rows("voice_actor", "voice_actor_id", "voice_actor", limit)
    }

    fn missing_media_rows(
        &self,
        table: &str,
        id_column: &str,
        entity_type: &str,
        limit: usize,
    ) -> Result<Vec<PendingEnrichment>> {
        let sql = format!(
            "SELECT t.{id}, t.name FROM {table} t
             WHERE NOT EXISTS (
                 SELECT 1 FROM media m
                 WHERE m.entity_type = ?1
                 AND m.entity_id = t.{id}
                 AND m.media_type = 'image'
             )
             ORDER BY t.{id}
             LIMIT ?2",
            id = id_column,
            table = table,
        );

        let mut stmt = self.db.conn().prepare(&sql)?;
        let rows = stmt
            .query_map(params![entity_type, limit as i64], |row| {
                Ok(PendingEnrichment {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Anime rows with no trailer stored yet
    pub fn anime_missing_trailers(&self, limit: usize) -> Result<Vec<PendingTrailer>> {
        let mut stmt = self.db.conn().prepare(
            "SELECT anime_id, mal_id, title FROM anime
             WHERE trailer_url_yt_id IS NULL OR trailer_url_yt_id = ''
             ORDER BY anime_id
             LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(PendingTrailer {
                    anime_id: row.get(0)?,
                    mal_id: row.get(1)?,
                    title: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> CatalogStore {
        CatalogStore::new(Database::open_in_memory().unwrap())
    }

    fn sample_anime(mal_id: u32) -> NewAnime {
        NewAnime {
            mal_id,
            title: format!("Anime {}", mal_id),
            alternative_title: None,
            release_date: None,
            season: Some("Spring 2020".to_string()),
            episodes: Some(12),
            synopsis: None,
            rating: Some(4.1),
            rank: Some(100),
            company_id: None,
        }
    }

    #[test]
    fn test_anime_get_or_create_is_idempotent() -> Result<()> {
        let store = test_store();

        let (first, created) = store.get_or_create_anime(&sample_anime(10))?;
        assert!(created);

        let (second, created) = store.get_or_create_anime(&sample_anime(10))?;
        assert!(!created);
        assert_eq!(first, second);

        let count: i64 =
            store
                .database()
                .conn()
                .query_row("SELECT COUNT(*) FROM anime", [], |row| row.get(0))?;
        assert_eq!(count, 1);

        Ok(())
    }

    #[test]
    fn test_find_anime_by_mal_id() -> Result<()> {
        let store = test_store();

        assert_eq!(store.find_anime_by_mal_id(10)?, None);
        let (id, _) = store.get_or_create_anime(&sample_anime(10))?;
        assert_eq!(store.find_anime_by_mal_id(10)?, Some(id));

        Ok(())
    }

    #[test]
    fn test_seed_rating_follows_score() -> Result<()> {
        let store = test_store();

        let (id, _) = store.get_or_create_anime(&sample_anime(10))?;
        let (seed_rating, seed_count): (f64, i64) = store.database().conn().query_row(
            "SELECT seed_rating, seed_count FROM anime WHERE anime_id = ?1",
            params![id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        assert_eq!(seed_rating, 4.1);
        assert_eq!(seed_count, 1);

        let mut unscored = sample_anime(11);
        unscored.rating = None;
        let (id, _) = store.get_or_create_anime(&unscored)?;
        let seed_count: i64 = store.database().conn().query_row(
            "SELECT seed_count FROM anime WHERE anime_id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        assert_eq!(seed_count, 0);

        Ok(())
    }

    #[test]
    fn test_join_links_are_conflict_tolerant() -> Result<()> {
        let store = test_store();

        let (anime_id, _) = store.get_or_create_anime(&sample_anime(10))?;
        let genre_id = store
            .resolve_genre("Action", &GenreFields::default())?
            .unwrap();

        store.link_anime_genre(anime_id, genre_id)?;
        store.link_anime_genre(anime_id, genre_id)?;

        let count: i64 = store.database().conn().query_row(
            "SELECT COUNT(*) FROM anime_genre",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(count, 1);

        Ok(())
    }

    #[test]
    fn test_media_insert_if_absent() -> Result<()> {
        let store = test_store();

        let (anime_id, _) = store.get_or_create_anime(&sample_anime(10))?;

        assert!(!store.has_media(MediaEntity::Anime, anime_id, "image")?);
        assert!(store.insert_media_if_absent(
            MediaEntity::Anime,
            anime_id,
            "https://cdn.example/a.jpg",
            "image"
        )?);
        assert!(store.has_media(MediaEntity::Anime, anime_id, "image")?);

        // Second insert is a no-op and keeps the first URL.
        assert!(!store.insert_media_if_absent(
            MediaEntity::Anime,
            anime_id,
            "https://cdn.example/b.jpg",
            "image"
        )?);

        let url: String = store.database().conn().query_row(
            "SELECT url FROM media WHERE entity_type = 'anime' AND entity_id = ?1",
            params![anime_id],
            |row| row.get(0),
        )?;
        assert_eq!(url, "https://cdn.example/a.jpg");

        Ok(())
    }

    #[test]
    fn test_enrichment_queries_skip_covered_rows() -> Result<()> {
        let store = test_store();

        let (char_a, _) = store.get_or_create_character(&NewCharacter {
            mal_id: 1,
            name: "Alpha".to_string(),
            description: None,
            voice_actor_id: None,
        })?;
        store.get_or_create_character(&NewCharacter {
            mal_id: 2,
            name: "Beta".to_string(),
            description: None,
            voice_actor_id: None,
        })?;

        store.insert_media_if_absent(
            MediaEntity::Character,
            char_a,
            "https://cdn.example/alpha.jpg",
            "image",
        )?;

        let pending = store.characters_missing_images(100)?;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].name, "Beta");

        Ok(())
    }

    #[test]
    fn test_trailer_queries() -> Result<()> {
        let store = test_store();

        let (anime_id, _) = store.get_or_create_anime(&sample_anime(10))?;
        store.get_or_create_anime(&sample_anime(11))?;

        store.set_anime_trailer(anime_id, "dQw4w9WgXcQ")?;

        let pending = store.anime_missing_trailers(100)?;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].title, "Anime 11");
        assert_eq!(pending[0].mal_id, 11);

        Ok(())
    }
}
