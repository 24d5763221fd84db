use super::SqliteStore;
use crate::domain::{
    error::DomainError,
    models::{SyncDirection, SyncEntity, SyncLogRecord, SyncOutcome},
};

type SyncLogRow = (
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    i64,
);

impl SqliteStore {
    pub async fn append_sync_log(&self, entry: &SyncLogRecord) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO sync_logs (log_id, entity_type, entity_id, direction, outcome, external_id, error, ts_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&entry.id)
        .bind(entry.entity_type.as_str())
        .bind(&entry.entity_id)
        .bind(entry.direction.as_str())
        .bind(entry.outcome.as_str())
        .bind(&entry.external_id)
        .bind(&entry.error)
        .bind(i64::try_from(entry.ts_ms).unwrap_or(i64::MAX))
        .execute(self.pool())
        .await
        .map_err(|error| DomainError::Storage(format!("failed to append sync log: {error}")))?;

        Ok(())
    }

    /// Newest entries first; rowid breaks ties between same-millisecond
    /// appends so the listing stays in insertion order.
    pub async fn list_sync_logs(&self, limit: usize) -> Result<Vec<SyncLogRecord>, DomainError> {
        let rows = sqlx::query_as::<_, SyncLogRow>(
            "SELECT log_id, entity_type, entity_id, direction, outcome, external_id, error, ts_ms
             FROM sync_logs ORDER BY ts_ms DESC, rowid DESC LIMIT ?1",
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(self.pool())
        .await
        .map_err(|error| DomainError::Storage(format!("failed to list sync logs: {error}")))?;

        rows.into_iter().map(map_sync_log_row).collect()
    }

    pub async fn count_sync_logs(&self) -> Result<u64, DomainError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sync_logs")
            .fetch_one(self.pool())
            .await
            .map_err(|error| DomainError::Storage(format!("failed to count sync logs: {error}")))?;

        Ok(u64::try_from(count).unwrap_or(0))
    }
}

fn map_sync_log_row(row: SyncLogRow) -> Result<SyncLogRecord, DomainError> {
    let entity_type = SyncEntity::parse(&row.1)
        .ok_or_else(|| DomainError::Storage(format!("unknown sync log entity: {}", row.1)))?;
    let direction = SyncDirection::parse(&row.3)
        .ok_or_else(|| DomainError::Storage(format!("unknown sync log direction: {}", row.3)))?;
    let outcome = SyncOutcome::parse(&row.4)
        .ok_or_else(|| DomainError::Storage(format!("unknown sync log outcome: {}", row.4)))?;

    Ok(SyncLogRecord {
        id: row.0,
        entity_type,
        entity_id: row.2,
        direction,
        outcome,
        external_id: row.5,
        error: row.6,
        ts_ms: u64::try_from(row.7).unwrap_or(0),
    })
}
