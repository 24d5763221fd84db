use tracing::warn;
use uuid::Uuid;

use crate::{
    domain::{
        error::DomainError,
        event::{ContactDetails, InboundEvent, ThreadDirection},
        models::{
            Channel, MessageRecord, SenderKind, SyncDirection, SyncEntity, SyncOutcome,
            TicketPriority, TicketStatus,
        },
    },
    ingest::{
        dedup::{self, CandidateMessage},
        identity::{self, ContactIdentity},
        sync_state,
        tickets::{self, NewTicketSpec},
    },
    mapping::{self, Vendor},
    storage::{SqliteStore, now_unix_ms},
};

/// Sender id recorded for desk agent thread entries; agents are not tracked
/// as first-class rows.
const DESK_AGENT_SENDER: &str = "desk-agent";

pub struct IngestContext<'a> {
    pub store: &'a SqliteStore,
    pub dedup_window_ms: u64,
}

/// What happened to one inbound event. Channel handlers translate this into
/// their vendor's acknowledgement shape.
#[derive(Debug)]
pub enum EventOutcome {
    TicketStored { ticket_id: String },
    MessageStored { ticket_id: String, message_id: String },
    StatusApplied { message_id: String },
    Duplicate,
    Skipped { reason: String },
    Failed { error: DomainError },
}

/// Applies one normalized event to the store. Never returns an error:
/// failures become `EventOutcome::Failed` plus a failed audit entry, so one
/// bad event cannot poison the rest of a webhook batch.
///
/// `source` names the channel the event arrived on; desk ticket events
/// carry their own channel and only message-style events fall back to it.
pub async fn apply_event(
    ctx: &IngestContext<'_>,
    source: Channel,
    event: InboundEvent,
) -> EventOutcome {
    let (entity, external_ref) = failure_scope(&event);
    match dispatch(ctx, source, event).await {
        Ok(outcome) => outcome,
        Err(error) => {
            warn!("failed to apply inbound event for {external_ref}: {error}");
            sync_state::record_outcome(
                ctx.store,
                entity,
                &external_ref,
                SyncDirection::Inbound,
                SyncOutcome::Failed,
                Some(&external_ref),
                Some(&error.to_string()),
            )
            .await;
            EventOutcome::Failed { error }
        }
    }
}

async fn dispatch(
    ctx: &IngestContext<'_>,
    source: Channel,
    event: InboundEvent,
) -> Result<EventOutcome, DomainError> {
    match event {
        InboundEvent::MessageReceived {
            external_message_id,
            from,
            profile_name,
            ts_ms,
            content,
            media_ref,
        } => {
            let identity =
                ContactIdentity::from_channel_peer(source, &from, profile_name.as_deref());
            apply_message_received(ctx, source, identity, external_message_id, ts_ms, content, media_ref)
                .await
        }
        InboundEvent::DeliveryStatusChanged {
            external_message_id,
            status,
            ts_ms: _,
            error,
        } => apply_delivery_status(ctx, &external_message_id, &status, error.as_deref()).await,
        InboundEvent::TicketCreated {
            external_ticket_id,
            subject,
            external_status,
            external_priority,
            channel,
            contact,
            description,
        } => {
            let vendor = vendor_for(source);
            let upsert = TicketUpsert {
                external_ticket_id,
                subject,
                status: external_status
                    .as_deref()
                    .map(|raw| mapping::map_status(vendor, raw)),
                priority: external_priority
                    .as_deref()
                    .map(|raw| mapping::map_priority(vendor, raw)),
                channel,
                contact,
                description,
            };
            apply_ticket_created(ctx, upsert).await
        }
        InboundEvent::TicketUpdated {
            external_ticket_id,
            external_status,
            external_priority,
        } => {
            let vendor = vendor_for(source);
            let status = external_status
                .as_deref()
                .map(|raw| mapping::map_status(vendor, raw));
            let priority = external_priority
                .as_deref()
                .map(|raw| mapping::map_priority(vendor, raw));
            apply_ticket_updated(ctx, &external_ticket_id, status, priority).await
        }
        InboundEvent::ThreadAdded {
            external_ticket_id,
            content,
            direction,
            author,
            ts_ms,
        } => apply_thread_added(ctx, &external_ticket_id, content, direction, author, ts_ms).await,
    }
}

struct TicketUpsert {
    external_ticket_id: String,
    subject: String,
    status: Option<TicketStatus>,
    priority: Option<TicketPriority>,
    channel: Channel,
    contact: ContactDetails,
    description: Option<String>,
}

async fn apply_message_received(
    ctx: &IngestContext<'_>,
    channel: Channel,
    identity: ContactIdentity,
    external_message_id: String,
    ts_ms: u64,
    content: String,
    media_ref: Option<String>,
) -> Result<EventOutcome, DomainError> {
    let client = identity::resolve(ctx.store, channel, identity).await?;
    let matched = tickets::match_or_create(
        ctx.store,
        &client,
        channel,
        None,
        NewTicketSpec::inbound(channel, &client),
    )
    .await?;

    let candidate = CandidateMessage {
        external_message_id: Some(&external_message_id),
        content: &content,
        ts_ms,
    };
    if dedup::is_duplicate(ctx.store, &matched.ticket, &candidate, ctx.dedup_window_ms).await? {
        return Ok(EventOutcome::Duplicate);
    }

    let message = MessageRecord {
        id: new_message_id(),
        ticket_id: matched.ticket.id.clone(),
        sender_kind: SenderKind::Client,
        sender_id: client.id,
        content,
        ts_ms,
        read: false,
        delivery_status: None,
        delivery_error: None,
        external_message_id: Some(external_message_id.clone()),
        media_ref,
    };
    if !ctx.store.try_insert_message(&message).await? {
        // A concurrent redelivery inserted the same external id first.
        return Ok(EventOutcome::Duplicate);
    }

    sync_state::record_outcome(
        ctx.store,
        SyncEntity::Message,
        &message.id,
        SyncDirection::Inbound,
        SyncOutcome::Synced,
        Some(&external_message_id),
        None,
    )
    .await;
    Ok(EventOutcome::MessageStored {
        ticket_id: matched.ticket.id,
        message_id: message.id,
    })
}

async fn apply_delivery_status(
    ctx: &IngestContext<'_>,
    external_message_id: &str,
    status: &str,
    error: Option<&str>,
) -> Result<EventOutcome, DomainError> {
    let Some(message) = ctx.store.find_message_by_external_id(external_message_id).await? else {
        warn!("dropping delivery status for unknown message {external_message_id}");
        sync_state::record_outcome(
            ctx.store,
            SyncEntity::Message,
            external_message_id,
            SyncDirection::Inbound,
            SyncOutcome::Failed,
            Some(external_message_id),
            Some("delivery status references an unknown message"),
        )
        .await;
        return Ok(EventOutcome::Skipped {
            reason: "unknown message reference".to_owned(),
        });
    };

    ctx.store
        .update_message_delivery(&message.id, status, error)
        .await?;
    sync_state::record_outcome(
        ctx.store,
        SyncEntity::Message,
        &message.id,
        SyncDirection::Inbound,
        SyncOutcome::Synced,
        Some(external_message_id),
        None,
    )
    .await;
    Ok(EventOutcome::StatusApplied {
        message_id: message.id,
    })
}

async fn apply_ticket_created(
    ctx: &IngestContext<'_>,
    upsert: TicketUpsert,
) -> Result<EventOutcome, DomainError> {
    let identity = ContactIdentity::from_contact(&upsert.contact);
    let client = if identity.has_identifiers() {
        identity::resolve(ctx.store, upsert.channel, identity).await?
    } else {
        identity::resolve_unclaimed_desk_contact(ctx.store).await?
    };

    let status = upsert.status.unwrap_or(mapping::DEFAULT_STATUS);
    let priority = upsert.priority.unwrap_or(mapping::DEFAULT_PRIORITY);
    let spec = NewTicketSpec::external(upsert.subject.clone(), status, priority);
    let matched = tickets::match_or_create(
        ctx.store,
        &client,
        upsert.channel,
        Some(&upsert.external_ticket_id),
        spec,
    )
    .await?;

    if !matched.created {
        let now = now_unix_ms();
        // Claim a placeholder-owned skeleton created by an earlier update
        // event that arrived before this create.
        if let Some(unclaimed) = ctx
            .store
            .find_client_by_email(identity::UNCLAIMED_CONTACT_EMAIL)
            .await?
            && matched.ticket.client_id == unclaimed.id
            && client.id != unclaimed.id
        {
            ctx.store
                .relink_ticket_client(&matched.ticket.id, &client.id, &upsert.subject, now)
                .await?;
        }
        let status = upsert.status.unwrap_or(matched.ticket.status);
        let priority = upsert.priority.unwrap_or(matched.ticket.priority);
        ctx.store
            .update_ticket_external_state(&matched.ticket.id, status, priority, now)
            .await?;
    }

    if let Some(text) = upsert
        .description
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
    {
        // The description becomes the opening message exactly once; on
        // redelivery the ticket already carries messages and nothing is
        // appended.
        let wants_description =
            matched.created || ctx.store.count_ticket_messages(&matched.ticket.id).await? == 0;
        if wants_description {
            let message = MessageRecord {
                id: new_message_id(),
                ticket_id: matched.ticket.id.clone(),
                sender_kind: SenderKind::Client,
                sender_id: client.id.clone(),
                content: text.to_owned(),
                ts_ms: now_unix_ms(),
                read: false,
                delivery_status: None,
                delivery_error: None,
                external_message_id: None,
                media_ref: None,
            };
            ctx.store.try_insert_message(&message).await?;
        }
    }

    sync_state::record_outcome(
        ctx.store,
        SyncEntity::Ticket,
        &matched.ticket.id,
        SyncDirection::Inbound,
        SyncOutcome::Synced,
        Some(&upsert.external_ticket_id),
        None,
    )
    .await;
    Ok(EventOutcome::TicketStored {
        ticket_id: matched.ticket.id,
    })
}

async fn apply_ticket_updated(
    ctx: &IngestContext<'_>,
    external_ticket_id: &str,
    status: Option<TicketStatus>,
    priority: Option<TicketPriority>,
) -> Result<EventOutcome, DomainError> {
    if let Some(ticket) = ctx.store.find_ticket_by_external_id(external_ticket_id).await? {
        let status = status.unwrap_or(ticket.status);
        let priority = priority.unwrap_or(ticket.priority);
        ctx.store
            .update_ticket_external_state(&ticket.id, status, priority, now_unix_ms())
            .await?;
        sync_state::record_outcome(
            ctx.store,
            SyncEntity::Ticket,
            &ticket.id,
            SyncDirection::Inbound,
            SyncOutcome::Synced,
            Some(external_ticket_id),
            None,
        )
        .await;
        return Ok(EventOutcome::TicketStored {
            ticket_id: ticket.id,
        });
    }

    // Update for a ticket we have never seen: open a skeleton owned by the
    // placeholder contact so the state is not lost, and let a later create
    // event claim it.
    let owner = identity::resolve_unclaimed_desk_contact(ctx.store).await?;
    let spec = NewTicketSpec::external(
        format!("Desk ticket {external_ticket_id}"),
        status.unwrap_or(mapping::DEFAULT_STATUS),
        priority.unwrap_or(mapping::DEFAULT_PRIORITY),
    );
    let matched = tickets::match_or_create(
        ctx.store,
        &owner,
        Channel::Web,
        Some(external_ticket_id),
        spec,
    )
    .await?;
    sync_state::record_outcome(
        ctx.store,
        SyncEntity::Ticket,
        &matched.ticket.id,
        SyncDirection::Inbound,
        SyncOutcome::Synced,
        Some(external_ticket_id),
        None,
    )
    .await;
    Ok(EventOutcome::TicketStored {
        ticket_id: matched.ticket.id,
    })
}

async fn apply_thread_added(
    ctx: &IngestContext<'_>,
    external_ticket_id: &str,
    content: String,
    direction: ThreadDirection,
    author: SenderKind,
    ts_ms: u64,
) -> Result<EventOutcome, DomainError> {
    let Some(ticket) = ctx.store.find_ticket_by_external_id(external_ticket_id).await? else {
        warn!("dropping thread entry for unknown desk ticket {external_ticket_id}");
        sync_state::record_outcome(
            ctx.store,
            SyncEntity::Message,
            external_ticket_id,
            SyncDirection::Inbound,
            SyncOutcome::Failed,
            Some(external_ticket_id),
            Some("thread entry references an unknown ticket"),
        )
        .await;
        return Ok(EventOutcome::Skipped {
            reason: "unknown ticket reference".to_owned(),
        });
    };

    let candidate = CandidateMessage {
        external_message_id: None,
        content: &content,
        ts_ms,
    };
    if dedup::is_duplicate(ctx.store, &ticket, &candidate, ctx.dedup_window_ms).await? {
        return Ok(EventOutcome::Duplicate);
    }

    let (sender_kind, sender_id) = match author {
        SenderKind::Client => (SenderKind::Client, ticket.client_id.clone()),
        SenderKind::Agent => (SenderKind::Agent, DESK_AGENT_SENDER.to_owned()),
    };
    let message = MessageRecord {
        id: new_message_id(),
        ticket_id: ticket.id.clone(),
        sender_kind,
        sender_id,
        content,
        ts_ms,
        read: author == SenderKind::Agent,
        delivery_status: None,
        delivery_error: None,
        external_message_id: None,
        media_ref: None,
    };
    if !ctx.store.try_insert_message(&message).await? {
        return Ok(EventOutcome::Duplicate);
    }

    let now = now_unix_ms();
    match direction {
        ThreadDirection::Incoming => ctx.store.mark_ticket_unread(&ticket.id, now).await?,
        ThreadDirection::Outgoing => ctx.store.bump_ticket(&ticket.id, now).await?,
    }

    sync_state::record_outcome(
        ctx.store,
        SyncEntity::Message,
        &message.id,
        SyncDirection::Inbound,
        SyncOutcome::Synced,
        None,
        None,
    )
    .await;
    Ok(EventOutcome::MessageStored {
        ticket_id: ticket.id,
        message_id: message.id,
    })
}

fn failure_scope(event: &InboundEvent) -> (SyncEntity, String) {
    match event {
        InboundEvent::MessageReceived {
            external_message_id, ..
        }
        | InboundEvent::DeliveryStatusChanged {
            external_message_id, ..
        } => (SyncEntity::Message, external_message_id.clone()),
        InboundEvent::TicketCreated {
            external_ticket_id, ..
        }
        | InboundEvent::TicketUpdated {
            external_ticket_id, ..
        } => (SyncEntity::Ticket, external_ticket_id.clone()),
        InboundEvent::ThreadAdded {
            external_ticket_id, ..
        } => (SyncEntity::Message, external_ticket_id.clone()),
    }
}

fn vendor_for(source: Channel) -> Vendor {
    match source {
        Channel::Whatsapp => Vendor::Whatsapp,
        Channel::Email | Channel::Web | Channel::Chat => Vendor::Desk,
    }
}

fn new_message_id() -> String {
    format!("msg-{}", Uuid::new_v4())
}
