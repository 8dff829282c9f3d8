//! `SQLite` implementation of [`BackupStore`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use govhub_app::ports::BackupStore;
use govhub_domain::backup::Backup;
use govhub_domain::error::GovError;
use govhub_domain::id::{AutomationId, BackupId};

use crate::codec;
use crate::error::StorageError;

struct Wrapper(Backup);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Backup> {
        value.map(|w| w.0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let automation_id: String = row.try_get("automation_id")?;
        let kind: String = row.try_get("kind")?;
        let config: String = row.try_get("config")?;
        let size_bytes: i64 = row.try_get("size_bytes")?;
        let created_at: String = row.try_get("created_at")?;

        #[allow(clippy::cast_sign_loss)]
        Ok(Self(Backup {
            id: codec::parse_id(&id)?,
            automation_id: codec::parse_id(&automation_id)?,
            kind: codec::from_json(&kind)?,
            config: codec::from_json(&config)?,
            size_bytes: size_bytes as u64,
            created_by: row.try_get("created_by")?,
            created_at: codec::parse_timestamp(&created_at)?,
        }))
    }
}

/// `SQLite`-backed backup store.
pub struct SqliteBackupStore {
    pool: SqlitePool,
}

impl SqliteBackupStore {
    /// Create a new store backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl BackupStore for SqliteBackupStore {
    #[allow(clippy::cast_possible_wrap)]
    async fn insert(&self, backup: Backup) -> Result<Backup, GovError> {
        let kind = codec::to_json(&backup.kind)?;
        let config = codec::to_json(&backup.config)?;

        sqlx::query(
            "INSERT INTO backups (id, automation_id, kind, config, size_bytes, created_by, \
             created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(backup.id.to_string())
        .bind(backup.automation_id.to_string())
        .bind(&kind)
        .bind(&config)
        .bind(backup.size_bytes as i64)
        .bind(&backup.created_by)
        .bind(backup.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        Ok(backup)
    }

    async fn get_by_id(&self, id: BackupId) -> Result<Option<Backup>, GovError> {
        let row: Option<Wrapper> = sqlx::query_as("SELECT * FROM backups WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(Wrapper::maybe(row))
    }

    async fn list_for(&self, automation_id: AutomationId) -> Result<Vec<Backup>, GovError> {
        let rows: Vec<Wrapper> = sqlx::query_as(
            "SELECT * FROM backups WHERE automation_id = ? ORDER BY created_at DESC",
        )
        .bind(automation_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn delete(&self, id: BackupId) -> Result<(), GovError> {
        sqlx::query("DELETE FROM backups WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }
}
