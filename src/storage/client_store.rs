use super::{SqliteStore, util};
use crate::domain::{error::DomainError, models::ClientRecord};

type ClientRow = (
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    i64,
    i64,
);

impl SqliteStore {
    /// Inserts the client, returning `Ok(false)` when one of its unique
    /// identifiers is already taken by another row.
    pub async fn try_insert_client(&self, client: &ClientRecord) -> Result<bool, DomainError> {
        let result = sqlx::query(
            "INSERT INTO clients (client_id, display_name, email, phone, whatsapp_id, external_contact_id, created_at_ms, updated_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&client.id)
        .bind(&client.display_name)
        .bind(&client.email)
        .bind(&client.phone)
        .bind(&client.whatsapp_id)
        .bind(&client.external_contact_id)
        .bind(i64::try_from(client.created_at_ms).unwrap_or(i64::MAX))
        .bind(i64::try_from(client.updated_at_ms).unwrap_or(i64::MAX))
        .execute(self.pool())
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(error) if util::is_unique_violation(&error) => Ok(false),
            Err(error) => Err(DomainError::Storage(format!(
                "failed to insert client: {error}"
            ))),
        }
    }

    /// Rewrites the identity columns of an existing client, returning
    /// `Ok(false)` when the new values collide with another row.
    pub async fn update_client_identity(&self, client: &ClientRecord) -> Result<bool, DomainError> {
        let result = sqlx::query(
            "UPDATE clients
             SET display_name = ?2, email = ?3, phone = ?4, whatsapp_id = ?5, external_contact_id = ?6, updated_at_ms = ?7
             WHERE client_id = ?1",
        )
        .bind(&client.id)
        .bind(&client.display_name)
        .bind(&client.email)
        .bind(&client.phone)
        .bind(&client.whatsapp_id)
        .bind(&client.external_contact_id)
        .bind(i64::try_from(client.updated_at_ms).unwrap_or(i64::MAX))
        .execute(self.pool())
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(error) if util::is_unique_violation(&error) => Ok(false),
            Err(error) => Err(DomainError::Storage(format!(
                "failed to update client: {error}"
            ))),
        }
    }

    pub async fn get_client(&self, client_id: &str) -> Result<Option<ClientRecord>, DomainError> {
        let row = sqlx::query_as::<_, ClientRow>(
            "SELECT client_id, display_name, email, phone, whatsapp_id, external_contact_id, created_at_ms, updated_at_ms
             FROM clients WHERE client_id = ?1",
        )
        .bind(client_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|error| DomainError::Storage(format!("failed to load client: {error}")))?;

        Ok(row.map(map_client_row))
    }

    pub async fn find_client_by_external_contact_id(
        &self,
        external_contact_id: &str,
    ) -> Result<Option<ClientRecord>, DomainError> {
        let row = sqlx::query_as::<_, ClientRow>(
            "SELECT client_id, display_name, email, phone, whatsapp_id, external_contact_id, created_at_ms, updated_at_ms
             FROM clients WHERE external_contact_id = ?1",
        )
        .bind(external_contact_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|error| {
            DomainError::Storage(format!("failed to find client by contact id: {error}"))
        })?;

        Ok(row.map(map_client_row))
    }

    pub async fn find_client_by_whatsapp_id(
        &self,
        whatsapp_id: &str,
    ) -> Result<Option<ClientRecord>, DomainError> {
        let row = sqlx::query_as::<_, ClientRow>(
            "SELECT client_id, display_name, email, phone, whatsapp_id, external_contact_id, created_at_ms, updated_at_ms
             FROM clients WHERE whatsapp_id = ?1",
        )
        .bind(whatsapp_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|error| {
            DomainError::Storage(format!("failed to find client by whatsapp id: {error}"))
        })?;

        Ok(row.map(map_client_row))
    }

    pub async fn find_client_by_phone(
        &self,
        phone: &str,
    ) -> Result<Option<ClientRecord>, DomainError> {
        let row = sqlx::query_as::<_, ClientRow>(
            "SELECT client_id, display_name, email, phone, whatsapp_id, external_contact_id, created_at_ms, updated_at_ms
             FROM clients WHERE phone = ?1 ORDER BY created_at_ms ASC LIMIT 1",
        )
        .bind(phone)
        .fetch_optional(self.pool())
        .await
        .map_err(|error| {
            DomainError::Storage(format!("failed to find client by phone: {error}"))
        })?;

        Ok(row.map(map_client_row))
    }

    pub async fn find_client_by_email(
        &self,
        email: &str,
    ) -> Result<Option<ClientRecord>, DomainError> {
        let row = sqlx::query_as::<_, ClientRow>(
            "SELECT client_id, display_name, email, phone, whatsapp_id, external_contact_id, created_at_ms, updated_at_ms
             FROM clients WHERE email = ?1",
        )
        .bind(email)
        .fetch_optional(self.pool())
        .await
        .map_err(|error| {
            DomainError::Storage(format!("failed to find client by email: {error}"))
        })?;

        Ok(row.map(map_client_row))
    }

    pub async fn count_clients(&self) -> Result<u64, DomainError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM clients")
            .fetch_one(self.pool())
            .await
            .map_err(|error| DomainError::Storage(format!("failed to count clients: {error}")))?;

        Ok(u64::try_from(count).unwrap_or(0))
    }
}

fn map_client_row(row: ClientRow) -> ClientRecord {
    ClientRecord {
        id: row.0,
        display_name: row.1,
        email: row.2,
        phone: row.3,
        whatsapp_id: row.4,
        external_contact_id: row.5,
        created_at_ms: u64::try_from(row.6).unwrap_or(0),
        updated_at_ms: u64::try_from(row.7).unwrap_or(0),
    }
}
