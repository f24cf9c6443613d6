//! Generic get-or-create resolution for reference entities.
//!
//! Every reference table (company, genre, voice actor) follows the same
//! pattern: look up a row by its natural key (the unique name), insert it
//! with caller-supplied fields when absent, and return the local ID either
//! way. The uniqueness constraint on the name column is the source of
//! truth, so a concurrent or repeated insert degrades to a re-query
//! instead of a duplicate row.

use crate::Database;
use anyhow::{Context, Result};
use rusqlite::{params, types::ToSql, OptionalExtension};
use tracing::{debug, info};

/// Identity resolver for one reference table
#[derive(Debug, Clone, Copy)]
pub struct EntityResolver {
    table: &'static str,
    id_column: &'static str,
    key_column: &'static str,
}

impl EntityResolver {
    pub const fn new(
        table: &'static str,
        id_column: &'static str,
        key_column: &'static str,
    ) -> Self {
        Self {
            table,
            id_column,
            key_column,
        }
    }

    /// Resolver for the `company` table
    pub const fn company() -> Self {
        Self::new("company", "company_id", "name")
    }

    /// Resolver for the `genre` table
    pub const fn genre() -> Self {
        Self::new("genre", "genre_id", "name")
    }

    /// Resolver for the `voice_actor` table
    pub const fn voice_actor() -> Self {
        Self::new("voice_actor", "voice_actor_id", "name")
    }

    /// Find a row by natural key, inserting it with the supplied extra
    /// columns when absent. Returns `None` for an empty key: a missing
    /// optional association is not an error.
    ///
    /// The extra columns apply only on the insert path; a lookup hit never
    /// recomputes or overwrites them.
    pub fn resolve(
        &self,
        db: &Database,
        natural_key: &str,
        extra: &[(&str, &dyn ToSql)],
    ) -> Result<Option<i64>> {
        let natural_key = natural_key.trim();
        if natural_key.is_empty() {
            return Ok(None);
        }

        if let Some(id) = self.lookup(db, natural_key)? {
            debug!(table = self.table, key = natural_key, id = id, "Entity already exists");
            return Ok(Some(id));
        }

        let mut columns = vec![self.key_column];
        let mut values: Vec<&dyn ToSql> = vec![&natural_key];
        for (column, value) in extra {
            columns.push(column);
            values.push(*value);
        }

        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            columns.join(", "),
            placeholders.join(", ")
        );

        match db.conn().execute(&sql, values.as_slice()) {
            Ok(_) => {
                let id = db.conn().last_insert_rowid();
                info!(table = self.table, key = natural_key, id = id, "Created entity");
                Ok(Some(id))
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                // Lost a race with another writer; the row exists now.
                let id = self
                    .lookup(db, natural_key)?
                    .with_context(|| format!("{} row vanished after conflict", self.table))?;
                debug!(table = self.table, key = natural_key, id = id, "Insert conflicted, reusing row");
                Ok(Some(id))
            }
            Err(e) => Err(e).with_context(|| format!("Failed to insert into {}", self.table)),
        }
    }

    /// Find a row by natural key without creating it
    pub fn find(&self, db: &Database, natural_key: &str) -> Result<Option<i64>> {
        let natural_key = natural_key.trim();
        if natural_key.is_empty() {
            return Ok(None);
        }
        self.lookup(db, natural_key)
    }

    fn lookup(&self, db: &Database, natural_key: &str) -> Result<Option<i64>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1",
            self.id_column, self.table, self.key_column
        );
        db.conn()
            .query_row(&sql, params![natural_key], |row| row.get(0))
            .optional()
            .with_context(|| format!("Failed to query {} by {}", self.table, self.key_column))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_creates_then_reuses() -> Result<()> {
        let db = Database::open_in_memory()?;
        let resolver = EntityResolver::company();

        let country = Some("Japan".to_string());
        let first = resolver
            .resolve(&db, "StudioX", &[("country", &country)])?
            .unwrap();
        let second = resolver.resolve(&db, "StudioX", &[])?.unwrap();

        assert_eq!(first, second);

        let count: i64 = db.conn().query_row(
            "SELECT COUNT(*) FROM company WHERE name = 'StudioX'",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(count, 1);

        Ok(())
    }

    #[test]
    fn test_resolve_empty_key_is_no_entity() -> Result<()> {
        let db = Database::open_in_memory()?;
        let resolver = EntityResolver::genre();

        assert_eq!(resolver.resolve(&db, "", &[])?, None);
        assert_eq!(resolver.resolve(&db, "   ", &[])?, None);

        Ok(())
    }

    #[test]
    fn test_insert_fields_not_overwritten_on_lookup() -> Result<()> {
        let db = Database::open_in_memory()?;
        let resolver = EntityResolver::voice_actor();

        let nationality = Some("Japanese".to_string());
        resolver.resolve(&db, "Kana Hanazawa", &[("nationality", &nationality)])?;

        // Second resolution with different fields must not touch the row.
        let other = Some("American".to_string());
        resolver.resolve(&db, "Kana Hanazawa", &[("nationality", &other)])?;

        let stored: Option<String> = db.conn().query_row(
            "SELECT nationality FROM voice_actor WHERE name = 'Kana Hanazawa'",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(stored.as_deref(), Some("Japanese"));

        Ok(())
    }

    #[test]
    fn test_find_does_not_create() -> Result<()> {
        let db = Database::open_in_memory()?;
        let resolver = EntityResolver::company();

        assert_eq!(resolver.find(&db, "Ghost Studio")?, None);

        let count: i64 =
            db.conn()
                .query_row("SELECT COUNT(*) FROM company", [], |row| row.get(0))?;
        assert_eq!(count, 0);

        let id = resolver.resolve(&db, "Ghost Studio", &[])?.unwrap();
        assert_eq!(resolver.find(&db, "Ghost Studio")?, Some(id));

        Ok(())
    }

    #[test]
    fn test_distinct_keys_get_distinct_ids() -> Result<()> {
        let db = Database::open_in_memory()?;
        let resolver = EntityResolver::genre();

        let a = resolver.resolve(&db, "Action", &[])?.unwrap();
        let b = resolver.resolve(&db, "Drama", &[])?.unwrap();
        assert_ne!(a, b);

        Ok(())
    }
}
