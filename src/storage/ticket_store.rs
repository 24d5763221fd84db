use super::{SqliteStore, util};
use crate::domain::{
    error::DomainError,
    models::{Channel, SyncOutcome, TicketPriority, TicketRecord, TicketStatus},
};

type TicketRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    i64,
    Option<String>,
    Option<i64>,
    String,
    i64,
    i64,
);

impl SqliteStore {
    /// Inserts the ticket, returning `Ok(false)` when its external id is
    /// already claimed by another row.
    pub async fn try_insert_ticket(&self, ticket: &TicketRecord) -> Result<bool, DomainError> {
        let result = sqlx::query(
            "INSERT INTO tickets (ticket_id, client_id, subject, channel, status, priority, unread, external_ticket_id, last_synced_at_ms, sync_state, created_at_ms, updated_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        )
        .bind(&ticket.id)
        .bind(&ticket.client_id)
        .bind(&ticket.subject)
        .bind(ticket.channel.as_str())
        .bind(ticket.status.as_str())
        .bind(ticket.priority.as_str())
        .bind(i64::from(ticket.unread))
        .bind(&ticket.external_ticket_id)
        .bind(ticket.last_synced_at_ms.map(|ms| i64::try_from(ms).unwrap_or(i64::MAX)))
        .bind(ticket.sync_state.as_str())
        .bind(i64::try_from(ticket.created_at_ms).unwrap_or(i64::MAX))
        .bind(i64::try_from(ticket.updated_at_ms).unwrap_or(i64::MAX))
        .execute(self.pool())
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(error) if util::is_unique_violation(&error) => Ok(false),
            Err(error) => Err(DomainError::Storage(format!(
                "failed to insert ticket: {error}"
            ))),
        }
    }

    pub async fn get_ticket(&self, ticket_id: &str) -> Result<Option<TicketRecord>, DomainError> {
        let row = sqlx::query_as::<_, TicketRow>(
            "SELECT ticket_id, client_id, subject, channel, status, priority, unread, external_ticket_id, last_synced_at_ms, sync_state, created_at_ms, updated_at_ms
             FROM tickets WHERE ticket_id = ?1",
        )
        .bind(ticket_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|error| DomainError::Storage(format!("failed to load ticket: {error}")))?;

        row.map(map_ticket_row).transpose()
    }

    pub async fn find_ticket_by_external_id(
        &self,
        external_ticket_id: &str,
    ) -> Result<Option<TicketRecord>, DomainError> {
        let row = sqlx::query_as::<_, TicketRow>(
            "SELECT ticket_id, client_id, subject, channel, status, priority, unread, external_ticket_id, last_synced_at_ms, sync_state, created_at_ms, updated_at_ms
             FROM tickets WHERE external_ticket_id = ?1",
        )
        .bind(external_ticket_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|error| {
            DomainError::Storage(format!("failed to find ticket by external id: {error}"))
        })?;

        row.map(map_ticket_row).transpose()
    }

    /// Most recently touched ticket of the client on the channel that is
    /// still collecting messages (open or pending).
    pub async fn find_active_ticket(
        &self,
        client_id: &str,
        channel: Channel,
    ) -> Result<Option<TicketRecord>, DomainError> {
        let row = sqlx::query_as::<_, TicketRow>(
            "SELECT ticket_id, client_id, subject, channel, status, priority, unread, external_ticket_id, last_synced_at_ms, sync_state, created_at_ms, updated_at_ms
             FROM tickets
             WHERE client_id = ?1 AND channel = ?2 AND status IN (?3, ?4)
             ORDER BY updated_at_ms DESC LIMIT 1",
        )
        .bind(client_id)
        .bind(channel.as_str())
        .bind(TicketStatus::Open.as_str())
        .bind(TicketStatus::Pending.as_str())
        .fetch_optional(self.pool())
        .await
        .map_err(|error| {
            DomainError::Storage(format!("failed to find active ticket: {error}"))
        })?;

        row.map(map_ticket_row).transpose()
    }

    pub async fn mark_ticket_unread(&self, ticket_id: &str, now_ms: u64) -> Result<(), DomainError> {
        sqlx::query("UPDATE tickets SET unread = 1, updated_at_ms = ?2 WHERE ticket_id = ?1")
            .bind(ticket_id)
            .bind(i64::try_from(now_ms).unwrap_or(i64::MAX))
            .execute(self.pool())
            .await
            .map_err(|error| {
                DomainError::Storage(format!("failed to mark ticket unread: {error}"))
            })?;

        Ok(())
    }

    pub async fn bump_ticket(&self, ticket_id: &str, now_ms: u64) -> Result<(), DomainError> {
        sqlx::query("UPDATE tickets SET updated_at_ms = ?2 WHERE ticket_id = ?1")
            .bind(ticket_id)
            .bind(i64::try_from(now_ms).unwrap_or(i64::MAX))
            .execute(self.pool())
            .await
            .map_err(|error| DomainError::Storage(format!("failed to bump ticket: {error}")))?;

        Ok(())
    }

    /// Applies vendor-reported status and priority and stamps the ticket as
    /// freshly synchronized.
    pub async fn update_ticket_external_state(
        &self,
        ticket_id: &str,
        status: TicketStatus,
        priority: TicketPriority,
        now_ms: u64,
    ) -> Result<(), DomainError> {
        sqlx::query(
            "UPDATE tickets
             SET status = ?2, priority = ?3, sync_state = ?4, last_synced_at_ms = ?5, updated_at_ms = ?5
             WHERE ticket_id = ?1",
        )
        .bind(ticket_id)
        .bind(status.as_str())
        .bind(priority.as_str())
        .bind(SyncOutcome::Synced.as_str())
        .bind(i64::try_from(now_ms).unwrap_or(i64::MAX))
        .execute(self.pool())
        .await
        .map_err(|error| {
            DomainError::Storage(format!("failed to update ticket state: {error}"))
        })?;

        Ok(())
    }

    /// Moves a ticket to a different owner. Used when a placeholder-owned
    /// ticket is claimed by the real contact.
    pub async fn relink_ticket_client(
        &self,
        ticket_id: &str,
        client_id: &str,
        subject: &str,
        now_ms: u64,
    ) -> Result<(), DomainError> {
        sqlx::query(
            "UPDATE tickets SET client_id = ?2, subject = ?3, updated_at_ms = ?4 WHERE ticket_id = ?1",
        )
        .bind(ticket_id)
        .bind(client_id)
        .bind(subject)
        .bind(i64::try_from(now_ms).unwrap_or(i64::MAX))
        .execute(self.pool())
        .await
        .map_err(|error| DomainError::Storage(format!("failed to relink ticket: {error}")))?;

        Ok(())
    }

    pub async fn count_tickets(&self) -> Result<u64, DomainError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tickets")
            .fetch_one(self.pool())
            .await
            .map_err(|error| DomainError::Storage(format!("failed to count tickets: {error}")))?;

        Ok(u64::try_from(count).unwrap_or(0))
    }

    pub async fn count_unread_tickets(&self) -> Result<u64, DomainError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tickets WHERE unread = 1")
            .fetch_one(self.pool())
            .await
            .map_err(|error| {
                DomainError::Storage(format!("failed to count unread tickets: {error}"))
            })?;

        Ok(u64::try_from(count).unwrap_or(0))
    }
}

fn map_ticket_row(row: TicketRow) -> Result<TicketRecord, DomainError> {
    let channel = Channel::parse(&row.3)
        .ok_or_else(|| DomainError::Storage(format!("unknown ticket channel: {}", row.3)))?;
    let status = TicketStatus::parse(&row.4)
        .ok_or_else(|| DomainError::Storage(format!("unknown ticket status: {}", row.4)))?;
    let priority = TicketPriority::parse(&row.5)
        .ok_or_else(|| DomainError::Storage(format!("unknown ticket priority: {}", row.5)))?;
    let sync_state = SyncOutcome::parse(&row.9)
        .ok_or_else(|| DomainError::Storage(format!("unknown ticket sync state: {}", row.9)))?;

    Ok(TicketRecord {
        id: row.0,
        client_id: row.1,
        subject: row.2,
        channel,
        status,
        priority,
        unread: row.6 != 0,
        external_ticket_id: row.7,
        last_synced_at_ms: row.8.map(|ms| u64::try_from(ms).unwrap_or(0)),
        sync_state,
        created_at_ms: u64::try_from(row.10).unwrap_or(0),
        updated_at_ms: u64::try_from(row.11).unwrap_or(0),
    })
}
