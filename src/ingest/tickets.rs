use uuid::Uuid;

use crate::{
    domain::{
        error::DomainError,
        models::{Channel, ClientRecord, SyncOutcome, TicketPriority, TicketRecord, TicketStatus},
    },
    storage::{SqliteStore, now_unix_ms},
};

/// Field values for a ticket that may need to be created.
#[derive(Debug, Clone)]
pub struct NewTicketSpec {
    pub subject: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub sync_state: SyncOutcome,
    pub last_synced_at_ms: Option<u64>,
}

impl NewTicketSpec {
    /// Ticket opened by a plain channel message. It has no external
    /// counterpart yet, so it stays pending for a future outbound sync.
    pub fn inbound(channel: Channel, client: &ClientRecord) -> Self {
        Self {
            subject: format!("{} conversation with {}", channel.label(), client.display_name),
            status: TicketStatus::Open,
            priority: TicketPriority::Medium,
            sync_state: SyncOutcome::Pending,
            last_synced_at_ms: None,
        }
    }

    /// Ticket mirrored from the external desk, already synchronized.
    pub fn external(subject: String, status: TicketStatus, priority: TicketPriority) -> Self {
        Self {
            subject,
            status,
            priority,
            sync_state: SyncOutcome::Synced,
            last_synced_at_ms: Some(now_unix_ms()),
        }
    }
}

#[derive(Debug)]
pub struct TicketMatch {
    pub ticket: TicketRecord,
    pub created: bool,
}

/// Finds the ticket an inbound event belongs to, creating one when none
/// fits.
///
/// With an external id the ticket is keyed on it alone: find, else insert,
/// else re-find after losing the insert race to a concurrent delivery.
/// Without one, the client's most recent open or pending ticket on the
/// channel absorbs the event and is marked unread; only when no such ticket
/// exists does a new one open.
pub async fn match_or_create(
    store: &SqliteStore,
    client: &ClientRecord,
    channel: Channel,
    external_ticket_id: Option<&str>,
    spec: NewTicketSpec,
) -> Result<TicketMatch, DomainError> {
    if let Some(external_id) = external_ticket_id {
        if let Some(existing) = store.find_ticket_by_external_id(external_id).await? {
            return Ok(TicketMatch {
                ticket: existing,
                created: false,
            });
        }

        let ticket = build_ticket(client, channel, Some(external_id), spec);
        if store.try_insert_ticket(&ticket).await? {
            return Ok(TicketMatch {
                ticket,
                created: true,
            });
        }

        let Some(existing) = store.find_ticket_by_external_id(external_id).await? else {
            return Err(DomainError::LookupMiss(format!(
                "ticket insert conflicted but no row maps external id {external_id}"
            )));
        };
        return Ok(TicketMatch {
            ticket: existing,
            created: false,
        });
    }

    if let Some(active) = store.find_active_ticket(&client.id, channel).await? {
        let now = now_unix_ms();
        store.mark_ticket_unread(&active.id, now).await?;
        let mut ticket = active;
        ticket.unread = true;
        ticket.updated_at_ms = now;
        return Ok(TicketMatch {
            ticket,
            created: false,
        });
    }

    let ticket = build_ticket(client, channel, None, spec);
    if !store.try_insert_ticket(&ticket).await? {
        return Err(DomainError::Storage(
            "ticket insert conflicted unexpectedly".to_owned(),
        ));
    }
    Ok(TicketMatch {
        ticket,
        created: true,
    })
}

fn build_ticket(
    client: &ClientRecord,
    channel: Channel,
    external_ticket_id: Option<&str>,
    spec: NewTicketSpec,
) -> TicketRecord {
    let now = now_unix_ms();
    TicketRecord {
        id: format!("ticket-{}", Uuid::new_v4()),
        client_id: client.id.clone(),
        subject: spec.subject,
        channel,
        status: spec.status,
        priority: spec.priority,
        unread: true,
        external_ticket_id: external_ticket_id.map(str::to_owned),
        last_synced_at_ms: spec.last_synced_at_ms,
        sync_state: spec.sync_state,
        created_at_ms: now,
        updated_at_ms: now,
    }
}
