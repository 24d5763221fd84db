use tracing::error;
use uuid::Uuid;

use crate::{
    domain::models::{SyncDirection, SyncEntity, SyncLogRecord, SyncOutcome},
    storage::{SqliteStore, now_unix_ms},
};

/// Appends one audit entry for a synchronization attempt. The audit trail
/// must never take down ingestion, so append failures are logged and
/// swallowed instead of propagated.
pub async fn record_outcome(
    store: &SqliteStore,
    entity: SyncEntity,
    entity_id: &str,
    direction: SyncDirection,
    outcome: SyncOutcome,
    external_id: Option<&str>,
    error: Option<&str>,
) {
    let entry = SyncLogRecord {
        id: format!("sync-{}", Uuid::new_v4()),
        entity_type: entity,
        entity_id: entity_id.to_owned(),
        direction,
        outcome,
        external_id: external_id.map(str::to_owned),
        error: error.map(str::to_owned),
        ts_ms: now_unix_ms(),
    };

    if let Err(append_error) = store.append_sync_log(&entry).await {
        error!(
            "failed to append sync audit entry for {} {}: {append_error}",
            entry.entity_type.as_str(),
            entry.entity_id
        );
    }
}
