use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use chrono::DateTime;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::{
    application::{config::DeskVerification, state::SharedState},
    domain::{
        error::DomainError,
        event::{ContactDetails, InboundEvent, ThreadDirection},
        models::{Channel, SenderKind},
    },
    ingest::pipeline::{self, EventOutcome},
    interfaces::adapter_common as common,
    mapping,
    security::signature,
    storage::now_unix_ms,
};

pub const DESK_SIGNATURE_HEADER: &str = "x-desk-signature";

#[derive(Debug, Deserialize)]
struct DeskDelivery {
    #[serde(rename = "eventType", alias = "event_type")]
    event_type: String,
    #[serde(default)]
    payload: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeskTicketPayload {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    ticket_number: Option<Value>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    contact: Option<DeskContactPayload>,
    #[serde(default)]
    contact_id: Option<Value>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeskContactPayload {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeskThreadPayload {
    #[serde(default)]
    ticket_id: Option<Value>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    direction: Option<String>,
    #[serde(default)]
    author_type: Option<String>,
    #[serde(default)]
    created_time: Option<String>,
}

/// Liveness probe the desk platform pings before enabling a webhook rule.
pub async fn probe_handler() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "ok": true,
            "service": "deskgate-core",
            "ts": now_unix_ms(),
        })),
    )
}

pub async fn webhook_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    if let Err(response) = verify_delivery(&state, &headers, &body) {
        return response;
    }

    let delivery = match parse_delivery(&body) {
        Ok(delivery) => delivery,
        Err(error) => return common::bad_request(error.to_string()),
    };

    let event = match adapt(&normalize_event_type(&delivery.event_type), delivery.payload) {
        Ok(Some(event)) => event,
        Ok(None) => {
            info!("ignoring unrecognized desk event type {:?}", delivery.event_type);
            return (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "eventType": delivery.event_type,
                    "ignored": true,
                })),
            );
        }
        Err(error) => return common::bad_request(error.to_string()),
    };

    let ctx = state.ingest_context();
    let outcome = pipeline::apply_event(&ctx, Channel::Web, event).await;
    ack(&delivery.event_type, outcome)
}

/// The signature covers the raw bytes on the wire; it must be checked before
/// any parsing, and never against a re-serialized body.
fn verify_delivery(
    state: &SharedState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(), (StatusCode, Json<Value>)> {
    let secret = match &state.config().desk_verification {
        DeskVerification::Insecure => {
            warn!("desk delivery accepted without signature verification");
            return Ok(());
        }
        DeskVerification::Secret(secret) => secret,
    };

    let Some(provided) = headers
        .get(DESK_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
    else {
        return Err(common::unauthorized("missing desk signature header"));
    };

    signature::verify_hmac_sha256(body, provided, secret)
        .map_err(|error| common::unauthorized(error.to_string()))
}

fn parse_delivery(body: &[u8]) -> Result<DeskDelivery, DomainError> {
    serde_json::from_slice::<DeskDelivery>(body)
        .map_err(|error| DomainError::MalformedPayload(format!("invalid desk delivery: {error}")))
}

/// The desk platform spells event types both dotted and underscored
/// (`Ticket_Add`, `ticket.add`); both collapse to the dotted lowercase form.
fn normalize_event_type(raw: &str) -> String {
    raw.trim().to_ascii_lowercase().replace('_', ".")
}

fn adapt(event_type: &str, payload: Value) -> Result<Option<InboundEvent>, DomainError> {
    match event_type {
        "ticket.add" => ticket_add_event(payload).map(Some),
        "ticket.update" => ticket_update_event(payload).map(Some),
        "thread.add" => thread_add_event(payload).map(Some),
        _ => Ok(None),
    }
}

fn ticket_add_event(payload: Value) -> Result<InboundEvent, DomainError> {
    let ticket = parse_ticket_payload(payload)?;
    let external_ticket_id = require_ticket_id(&ticket)?;
    let contact = contact_details(&ticket);
    let subject = ticket
        .subject
        .as_deref()
        .and_then(trim_non_empty)
        .unwrap_or_else(|| format!("Desk ticket {external_ticket_id}"));

    Ok(InboundEvent::TicketCreated {
        subject,
        external_status: ticket.status.as_deref().and_then(trim_non_empty),
        external_priority: ticket.priority.as_deref().and_then(trim_non_empty),
        channel: ticket
            .channel
            .as_deref()
            .map_or(Channel::Web, mapping::map_desk_channel),
        contact,
        description: ticket.description.as_deref().and_then(trim_non_empty),
        external_ticket_id,
    })
}

fn ticket_update_event(payload: Value) -> Result<InboundEvent, DomainError> {
    let ticket = parse_ticket_payload(payload)?;
    let external_ticket_id = require_ticket_id(&ticket)?;

    Ok(InboundEvent::TicketUpdated {
        external_ticket_id,
        external_status: ticket.status.as_deref().and_then(trim_non_empty),
        external_priority: ticket.priority.as_deref().and_then(trim_non_empty),
    })
}

fn thread_add_event(payload: Value) -> Result<InboundEvent, DomainError> {
    let thread = serde_json::from_value::<DeskThreadPayload>(payload).map_err(|error| {
        DomainError::MalformedPayload(format!("invalid desk thread payload: {error}"))
    })?;
    let external_ticket_id = id_string(thread.ticket_id.as_ref()).ok_or_else(|| {
        DomainError::MalformedPayload("desk thread event is missing ticketId".to_owned())
    })?;

    let content = thread
        .content
        .as_deref()
        .and_then(trim_non_empty)
        .or_else(|| thread.summary.as_deref().and_then(trim_non_empty))
        .unwrap_or_else(|| "[No content]".to_owned());
    let direction = parse_direction(thread.direction.as_deref());

    Ok(InboundEvent::ThreadAdded {
        external_ticket_id,
        content,
        direction,
        author: parse_author(thread.author_type.as_deref(), direction),
        ts_ms: parse_created_time(thread.created_time.as_deref()),
    })
}

fn parse_ticket_payload(payload: Value) -> Result<DeskTicketPayload, DomainError> {
    serde_json::from_value::<DeskTicketPayload>(payload).map_err(|error| {
        DomainError::MalformedPayload(format!("invalid desk ticket payload: {error}"))
    })
}

fn require_ticket_id(ticket: &DeskTicketPayload) -> Result<String, DomainError> {
    id_string(ticket.id.as_ref())
        .or_else(|| id_string(ticket.ticket_number.as_ref()))
        .ok_or_else(|| {
            DomainError::MalformedPayload("desk ticket event is missing its id".to_owned())
        })
}

/// Contact fields arrive nested under `contact` or flat on the payload,
/// depending on which desk automation fired; nested wins.
fn contact_details(ticket: &DeskTicketPayload) -> ContactDetails {
    let nested = ticket.contact.as_ref();
    ContactDetails {
        external_contact_id: nested
            .and_then(|contact| id_string(contact.id.as_ref()))
            .or_else(|| id_string(ticket.contact_id.as_ref())),
        display_name: nested.and_then(contact_display_name),
        email: nested
            .and_then(|contact| contact.email.as_deref().and_then(trim_non_empty))
            .or_else(|| ticket.email.as_deref().and_then(trim_non_empty)),
        phone: nested
            .and_then(|contact| contact.phone.as_deref().and_then(trim_non_empty))
            .or_else(|| ticket.phone.as_deref().and_then(trim_non_empty)),
    }
}

fn contact_display_name(contact: &DeskContactPayload) -> Option<String> {
    let first = contact.first_name.as_deref().map(str::trim).unwrap_or_default();
    let last = contact.last_name.as_deref().map(str::trim).unwrap_or_default();
    trim_non_empty(&format!("{first} {last}"))
}

/// Desk ids show up as JSON numbers or strings depending on the payload
/// version; both normalize to their string form.
fn id_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) => trim_non_empty(text),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn parse_direction(raw: Option<&str>) -> ThreadDirection {
    match raw.map(str::trim).map(str::to_ascii_lowercase).as_deref() {
        Some("out" | "outgoing") => ThreadDirection::Outgoing,
        _ => ThreadDirection::Incoming,
    }
}

/// An explicit author type wins; otherwise outgoing entries are presumed
/// agent-authored and incoming ones client-authored.
fn parse_author(raw: Option<&str>, direction: ThreadDirection) -> SenderKind {
    match raw.map(str::trim).map(str::to_ascii_lowercase).as_deref() {
        Some("agent") => SenderKind::Agent,
        Some("end_user" | "client" | "contact") => SenderKind::Client,
        _ => match direction {
            ThreadDirection::Outgoing => SenderKind::Agent,
            ThreadDirection::Incoming => SenderKind::Client,
        },
    }
}

fn parse_created_time(raw: Option<&str>) -> u64 {
    raw.and_then(|value| DateTime::parse_from_rfc3339(value.trim()).ok())
        .map(|parsed| u64::try_from(parsed.timestamp_millis()).unwrap_or(0))
        .unwrap_or_else(now_unix_ms)
}

fn ack(event_type: &str, outcome: EventOutcome) -> (StatusCode, Json<Value>) {
    match outcome {
        EventOutcome::TicketStored { ticket_id } => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "eventType": event_type,
                "ticketId": ticket_id,
            })),
        ),
        EventOutcome::MessageStored { message_id, .. }
        | EventOutcome::StatusApplied { message_id } => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "eventType": event_type,
                "messageId": message_id,
            })),
        ),
        EventOutcome::Duplicate => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "eventType": event_type,
                "duplicate": true,
            })),
        ),
        EventOutcome::Skipped { reason } => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "eventType": event_type,
                "skipped": true,
                "reason": reason,
            })),
        ),
        EventOutcome::Failed { error } => {
            let status = match &error {
                DomainError::MalformedPayload(_) | DomainError::InvalidRequest(_) => {
                    StatusCode::BAD_REQUEST
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (
                status,
                Json(json!({
                    "success": false,
                    "eventType": event_type,
                    "error": error.to_string(),
                })),
            )
        }
    }
}

fn trim_non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}
