use chrono::NaiveDate;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use super::domain::{Obituary, SourceId};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A record with the same (`identifier`, `source`) key is already
    /// persisted. The orchestrator checks `exists` first, so hitting this is
    /// a caller bug rather than a normal dedup outcome.
    #[error("record already exists")]
    Conflict,
    #[error("store unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),
}

/// Persistence seam for seen notices. The store is the only holder of
/// obituary state; everything else keeps records in memory per cycle.
#[allow(async_fn_in_trait)]
pub trait ObituaryStore {
    async fn exists(&self, identifier: &str, source: &SourceId) -> Result<bool, StoreError>;

    /// Persist a first-seen record. Duplicate natural keys surface as
    /// [`StoreError::Conflict`], never as a silent no-op.
    async fn add(&self, obituary: &Obituary) -> Result<(), StoreError>;

    /// Remove every record whose expiration date precedes `as_of` and return
    /// the removed count. Idempotent for a fixed `as_of`.
    async fn delete_expired(&self, as_of: NaiveDate) -> Result<u64, StoreError>;
}

const CREATE_TABLE: &str = "\
CREATE TABLE IF NOT EXISTS obituary (
    identifier TEXT NOT NULL,
    source TEXT NOT NULL,
    name TEXT NOT NULL,
    date_of_death DATE NOT NULL,
    expiration_date DATE NOT NULL,
    detail_link TEXT NOT NULL,
    image_link TEXT NOT NULL,
    PRIMARY KEY (identifier, source)
)";

const CREATE_EXPIRATION_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_obituary_expiration ON obituary (expiration_date)";

/// SQLite-backed store. A single pooled connection is enough for the batch
/// workload and keeps `sqlite::memory:` databases coherent in tests.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open the database and bootstrap the schema.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await?;
        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        sqlx::query(CREATE_EXPIRATION_INDEX).execute(&pool).await?;
        Ok(Self { pool })
    }
}

impl ObituaryStore for SqliteStore {
    async fn exists(&self, identifier: &str, source: &SourceId) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM obituary WHERE identifier = ?1 AND source = ?2")
            .bind(identifier)
            .bind(&source.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn add(&self, obituary: &Obituary) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO obituary \
             (identifier, source, name, date_of_death, expiration_date, detail_link, image_link) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&obituary.identifier)
        .bind(&obituary.source.0)
        .bind(&obituary.name)
        .bind(obituary.date_of_death)
        .bind(obituary.expiration_date)
        .bind(&obituary.detail_link)
        .bind(&obituary.image_link)
        .execute(&self.pool)
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict,
            _ => StoreError::Unavailable(err),
        })?;
        Ok(())
    }

    async fn delete_expired(&self, as_of: NaiveDate) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM obituary WHERE expiration_date < ?1")
            .bind(as_of)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
