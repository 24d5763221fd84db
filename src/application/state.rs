use std::{sync::Arc, time::Instant};

use serde_json::{Value, json};

use crate::{
    application::config::RuntimeConfig,
    domain::{error::DomainError, models::SyncLogRecord},
    ingest::pipeline::IngestContext,
    storage::{SqliteStore, now_unix_ms},
};

#[derive(Clone)]
pub struct SharedState {
    inner: Arc<InnerState>,
}

struct InnerState {
    config: RuntimeConfig,
    store: SqliteStore,
    started_at: Instant,
}

impl SharedState {
    pub async fn new(config: RuntimeConfig) -> Result<Self, DomainError> {
        let store = SqliteStore::connect(&config.db_path).await?;

        Ok(Self {
            inner: Arc::new(InnerState {
                started_at: Instant::now(),
                store,
                config,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn store(&self) -> &SqliteStore {
        &self.inner.store
    }

    #[must_use]
    pub fn uptime_ms(&self) -> u64 {
        u64::try_from(self.inner.started_at.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    #[must_use]
    pub fn desk_verification_label(&self) -> &'static str {
        self.inner.config.desk_verification.label()
    }

    #[must_use]
    pub fn ingest_context(&self) -> IngestContext<'_> {
        IngestContext {
            store: &self.inner.store,
            dedup_window_ms: self.inner.config.dedup_window_ms(),
        }
    }

    pub async fn list_sync_logs(&self, limit: usize) -> Result<Vec<SyncLogRecord>, DomainError> {
        self.inner.store.list_sync_logs(limit).await
    }

    pub async fn health_payload(&self) -> Result<Value, DomainError> {
        let clients = self.inner.store.count_clients().await?;
        let tickets = self.inner.store.count_tickets().await?;
        let unread_tickets = self.inner.store.count_unread_tickets().await?;
        let messages = self.inner.store.count_messages().await?;
        let sync_log_entries = self.inner.store.count_sync_logs().await?;

        Ok(json!({
            "ok": true,
            "ts": now_unix_ms(),
            "runtime": "rust",
            "version": self.config().runtime_version,
            "deskVerification": self.desk_verification_label(),
            "uptimeMs": self.uptime_ms(),
            "clients": clients,
            "tickets": tickets,
            "unreadTickets": unread_tickets,
            "messages": messages,
            "syncLogEntries": sync_log_entries,
        }))
    }
}
