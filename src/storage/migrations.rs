use sqlx::{Executor, SqlitePool};

use crate::domain::error::DomainError;

pub async fn migrate(pool: &SqlitePool) -> Result<(), DomainError> {
    let migration = r#"
    PRAGMA journal_mode = WAL;
    PRAGMA synchronous = NORMAL;

    CREATE TABLE IF NOT EXISTS clients (
        client_id TEXT PRIMARY KEY NOT NULL,
        display_name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        phone TEXT,
        whatsapp_id TEXT,
        external_contact_id TEXT,
        created_at_ms INTEGER NOT NULL,
        updated_at_ms INTEGER NOT NULL
    );
    CREATE UNIQUE INDEX IF NOT EXISTS idx_clients_whatsapp_id
        ON clients(whatsapp_id) WHERE whatsapp_id IS NOT NULL;
    CREATE UNIQUE INDEX IF NOT EXISTS idx_clients_external_contact
        ON clients(external_contact_id) WHERE external_contact_id IS NOT NULL;
    CREATE INDEX IF NOT EXISTS idx_clients_phone ON clients(phone);

    CREATE TABLE IF NOT EXISTS tickets (
        ticket_id TEXT PRIMARY KEY NOT NULL,
        client_id TEXT NOT NULL REFERENCES clients(client_id),
        subject TEXT NOT NULL,
        channel TEXT NOT NULL,
        status TEXT NOT NULL,
        priority TEXT NOT NULL,
        unread INTEGER NOT NULL,
        external_ticket_id TEXT,
        last_synced_at_ms INTEGER,
        sync_state TEXT NOT NULL,
        created_at_ms INTEGER NOT NULL,
        updated_at_ms INTEGER NOT NULL
    );
    CREATE UNIQUE INDEX IF NOT EXISTS idx_tickets_external_id
        ON tickets(external_ticket_id) WHERE external_ticket_id IS NOT NULL;
    CREATE INDEX IF NOT EXISTS idx_tickets_client_channel
        ON tickets(client_id, channel, updated_at_ms DESC);

    CREATE TABLE IF NOT EXISTS messages (
        message_id TEXT PRIMARY KEY NOT NULL,
        ticket_id TEXT NOT NULL REFERENCES tickets(ticket_id),
        sender_kind TEXT NOT NULL,
        sender_id TEXT NOT NULL,
        content TEXT NOT NULL,
        ts_ms INTEGER NOT NULL,
        read INTEGER NOT NULL,
        delivery_status TEXT,
        delivery_error TEXT,
        external_message_id TEXT,
        media_ref TEXT
    );
    CREATE UNIQUE INDEX IF NOT EXISTS idx_messages_external_id
        ON messages(external_message_id) WHERE external_message_id IS NOT NULL;
    CREATE INDEX IF NOT EXISTS idx_messages_ticket_ts ON messages(ticket_id, ts_ms ASC);

    CREATE TABLE IF NOT EXISTS sync_logs (
        log_id TEXT PRIMARY KEY NOT NULL,
        entity_type TEXT NOT NULL,
        entity_id TEXT NOT NULL,
        direction TEXT NOT NULL,
        outcome TEXT NOT NULL,
        external_id TEXT,
        error TEXT,
        ts_ms INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_sync_logs_ts ON sync_logs(ts_ms DESC);
    CREATE INDEX IF NOT EXISTS idx_sync_logs_entity ON sync_logs(entity_type, entity_id);
    "#;

    pool.execute(migration)
        .await
        .map_err(|error| DomainError::Storage(format!("migration failed: {error}")))?;

    Ok(())
}
