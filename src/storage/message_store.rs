use super::{SqliteStore, util};
use crate::domain::{
    error::DomainError,
    models::{MessageRecord, SenderKind},
};

type MessageRow = (
    String,
    String,
    String,
    String,
    String,
    i64,
    i64,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
);

impl SqliteStore {
    /// Inserts the message, returning `Ok(false)` when its external id is
    /// already recorded (a redelivered webhook racing itself).
    pub async fn try_insert_message(&self, message: &MessageRecord) -> Result<bool, DomainError> {
        let result = sqlx::query(
            "INSERT INTO messages (message_id, ticket_id, sender_kind, sender_id, content, ts_ms, read, delivery_status, delivery_error, external_message_id, media_ref)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .bind(&message.id)
        .bind(&message.ticket_id)
        .bind(message.sender_kind.as_str())
        .bind(&message.sender_id)
        .bind(&message.content)
        .bind(i64::try_from(message.ts_ms).unwrap_or(i64::MAX))
        .bind(i64::from(message.read))
        .bind(&message.delivery_status)
        .bind(&message.delivery_error)
        .bind(&message.external_message_id)
        .bind(&message.media_ref)
        .execute(self.pool())
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(error) if util::is_unique_violation(&error) => Ok(false),
            Err(error) => Err(DomainError::Storage(format!(
                "failed to insert message: {error}"
            ))),
        }
    }

    pub async fn find_message_by_external_id(
        &self,
        external_message_id: &str,
    ) -> Result<Option<MessageRecord>, DomainError> {
        let row = sqlx::query_as::<_, MessageRow>(
            "SELECT message_id, ticket_id, sender_kind, sender_id, content, ts_ms, read, delivery_status, delivery_error, external_message_id, media_ref
             FROM messages WHERE external_message_id = ?1",
        )
        .bind(external_message_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|error| {
            DomainError::Storage(format!("failed to find message by external id: {error}"))
        })?;

        row.map(map_message_row).transpose()
    }

    /// Finds a message on the ticket with identical content inside the
    /// `[since_ms, until_ms]` window. Backs heuristic deduplication for
    /// events that carry no external message id.
    pub async fn find_thread_duplicate(
        &self,
        ticket_id: &str,
        content: &str,
        since_ms: u64,
        until_ms: u64,
    ) -> Result<Option<MessageRecord>, DomainError> {
        let row = sqlx::query_as::<_, MessageRow>(
            "SELECT message_id, ticket_id, sender_kind, sender_id, content, ts_ms, read, delivery_status, delivery_error, external_message_id, media_ref
             FROM messages
             WHERE ticket_id = ?1 AND content = ?2 AND ts_ms BETWEEN ?3 AND ?4
             LIMIT 1",
        )
        .bind(ticket_id)
        .bind(content)
        .bind(i64::try_from(since_ms).unwrap_or(i64::MAX))
        .bind(i64::try_from(until_ms).unwrap_or(i64::MAX))
        .fetch_optional(self.pool())
        .await
        .map_err(|error| {
            DomainError::Storage(format!("failed to scan for duplicate message: {error}"))
        })?;

        row.map(map_message_row).transpose()
    }

    pub async fn list_ticket_messages(
        &self,
        ticket_id: &str,
    ) -> Result<Vec<MessageRecord>, DomainError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT message_id, ticket_id, sender_kind, sender_id, content, ts_ms, read, delivery_status, delivery_error, external_message_id, media_ref
             FROM messages WHERE ticket_id = ?1 ORDER BY ts_ms ASC",
        )
        .bind(ticket_id)
        .fetch_all(self.pool())
        .await
        .map_err(|error| {
            DomainError::Storage(format!("failed to list ticket messages: {error}"))
        })?;

        rows.into_iter().map(map_message_row).collect()
    }

    pub async fn update_message_delivery(
        &self,
        message_id: &str,
        delivery_status: &str,
        delivery_error: Option<&str>,
    ) -> Result<(), DomainError> {
        sqlx::query(
            "UPDATE messages SET delivery_status = ?2, delivery_error = ?3 WHERE message_id = ?1",
        )
        .bind(message_id)
        .bind(delivery_status)
        .bind(delivery_error)
        .execute(self.pool())
        .await
        .map_err(|error| {
            DomainError::Storage(format!("failed to update message delivery: {error}"))
        })?;

        Ok(())
    }

    pub async fn count_messages(&self) -> Result<u64, DomainError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages")
            .fetch_one(self.pool())
            .await
            .map_err(|error| DomainError::Storage(format!("failed to count messages: {error}")))?;

        Ok(u64::try_from(count).unwrap_or(0))
    }

    pub async fn count_ticket_messages(&self, ticket_id: &str) -> Result<u64, DomainError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages WHERE ticket_id = ?1")
                .bind(ticket_id)
                .fetch_one(self.pool())
                .await
                .map_err(|error| {
                    DomainError::Storage(format!("failed to count ticket messages: {error}"))
                })?;

        Ok(u64::try_from(count).unwrap_or(0))
    }
}

fn map_message_row(row: MessageRow) -> Result<MessageRecord, DomainError> {
    let sender_kind = SenderKind::parse(&row.2)
        .ok_or_else(|| DomainError::Storage(format!("unknown message sender kind: {}", row.2)))?;

    Ok(MessageRecord {
        id: row.0,
        ticket_id: row.1,
        sender_kind,
        sender_id: row.3,
        content: row.4,
        ts_ms: u64::try_from(row.5).unwrap_or(0),
        read: row.6 != 0,
        delivery_status: row.7,
        delivery_error: row.8,
        external_message_id: row.9,
        media_ref: row.10,
    })
}
