use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::{
    application::state::SharedState,
    domain::{error::DomainError, event::InboundEvent, models::Channel},
    interfaces::adapter_common as common,
    security::signature,
    storage::now_unix_ms,
};

/// Top-level `object` discriminator Meta sends for Business Cloud deliveries.
const WHATSAPP_OBJECT: &str = "whatsapp_business_account";

#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    object: String,
    #[serde(default)]
    entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(default)]
    changes: Vec<Change>,
}

#[derive(Debug, Deserialize)]
struct Change {
    #[serde(default)]
    value: ChangeValue,
}

#[derive(Debug, Default, Deserialize)]
struct ChangeValue {
    #[serde(default)]
    contacts: Vec<WaContact>,
    #[serde(default)]
    messages: Vec<WaMessage>,
    #[serde(default)]
    statuses: Vec<WaStatus>,
}

#[derive(Debug, Deserialize)]
struct WaContact {
    #[serde(default)]
    wa_id: String,
    #[serde(default)]
    profile: Option<WaProfile>,
}

#[derive(Debug, Deserialize)]
struct WaProfile {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WaMessage {
    #[serde(default)]
    id: String,
    #[serde(default)]
    from: String,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    text: Option<WaText>,
    #[serde(default)]
    image: Option<WaMedia>,
    #[serde(default)]
    video: Option<WaMedia>,
    #[serde(default)]
    document: Option<WaMedia>,
    #[serde(default)]
    audio: Option<WaMedia>,
    #[serde(default)]
    sticker: Option<WaMedia>,
    #[serde(default)]
    location: Option<WaLocation>,
    #[serde(default)]
    interactive: Option<WaInteractive>,
    #[serde(default)]
    button: Option<WaButton>,
}

#[derive(Debug, Deserialize)]
struct WaText {
    #[serde(default)]
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WaMedia {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    caption: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WaLocation {
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WaInteractive {
    #[serde(default)]
    button_reply: Option<WaReply>,
    #[serde(default)]
    list_reply: Option<WaReply>,
}

#[derive(Debug, Deserialize)]
struct WaReply {
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WaButton {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WaStatus {
    #[serde(default)]
    id: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    errors: Vec<WaStatusError>,
}

#[derive(Debug, Deserialize)]
struct WaStatusError {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    code: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode", default)]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token", default)]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge", default)]
    challenge: Option<String>,
}

/// Subscription handshake. On a match the challenge is echoed back verbatim
/// as plain text; any mismatch must not leak the challenge.
pub async fn verify_handler(
    State(state): State<SharedState>,
    Query(params): Query<VerifyParams>,
) -> Response {
    let Some(expected) = state.config().whatsapp_verify_token.as_deref() else {
        return common::unavailable("whatsapp verify token is not configured").into_response();
    };

    if signature::verify_handshake(params.mode.as_deref(), params.verify_token.as_deref(), expected)
    {
        (StatusCode::OK, params.challenge.unwrap_or_default()).into_response()
    } else {
        common::forbidden("webhook verification failed").into_response()
    }
}

/// Event delivery. Once the envelope is structurally sound the response is
/// always 200 with outcome counts; acking failed events keeps the vendor
/// from retry-storming on non-transient errors.
pub async fn webhook_handler(
    State(state): State<SharedState>,
    Json(payload): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let envelope = match parse_envelope(payload) {
        Ok(envelope) => envelope,
        Err(error) => return common::bad_request(error.to_string()),
    };

    let (events, malformed) = adapt(&envelope);
    let mut summary = common::apply_batch(&state, Channel::Whatsapp, events).await;
    summary.failed += malformed;
    common::batch_ack(&summary)
}

fn parse_envelope(payload: Value) -> Result<WebhookEnvelope, DomainError> {
    let envelope = serde_json::from_value::<WebhookEnvelope>(payload).map_err(|error| {
        DomainError::MalformedPayload(format!("invalid whatsapp webhook envelope: {error}"))
    })?;

    if envelope.object != WHATSAPP_OBJECT {
        return Err(DomainError::MalformedPayload(format!(
            "unexpected webhook object {:?}",
            envelope.object
        )));
    }
    Ok(envelope)
}

/// One delivery may bundle several messages and statuses across entries.
/// Items missing their identifying fields are skipped with a warning and
/// counted as malformed; they must not sink the rest of the batch.
fn adapt(envelope: &WebhookEnvelope) -> (Vec<InboundEvent>, usize) {
    let mut events = Vec::new();
    let mut malformed = 0;
    for entry in &envelope.entry {
        for change in &entry.changes {
            collect_change_events(&change.value, &mut events, &mut malformed);
        }
    }
    (events, malformed)
}

fn collect_change_events(value: &ChangeValue, events: &mut Vec<InboundEvent>, malformed: &mut usize) {
    for message in &value.messages {
        let Some(external_message_id) = trim_non_empty(&message.id) else {
            warn!("whatsapp message without an id skipped");
            *malformed += 1;
            continue;
        };
        let Some(from) = trim_non_empty(&message.from) else {
            warn!("whatsapp message {external_message_id} without a sender skipped");
            *malformed += 1;
            continue;
        };

        let (content, media_ref) = summarize(message);
        events.push(InboundEvent::MessageReceived {
            external_message_id,
            profile_name: profile_name_for(value, &from),
            from,
            ts_ms: timestamp_ms(message.timestamp.as_deref()),
            content,
            media_ref,
        });
    }

    for status in &value.statuses {
        let Some(external_message_id) = trim_non_empty(&status.id) else {
            warn!("whatsapp status callback without a message id skipped");
            *malformed += 1;
            continue;
        };
        let Some(new_status) = trim_non_empty(&status.status) else {
            warn!("whatsapp status callback for {external_message_id} without a value skipped");
            *malformed += 1;
            continue;
        };

        events.push(InboundEvent::DeliveryStatusChanged {
            external_message_id,
            status: new_status.to_ascii_lowercase(),
            ts_ms: timestamp_ms(status.timestamp.as_deref()),
            error: status_error_detail(status),
        });
    }
}

/// Every message type summarizes to non-empty text. Rich types without a
/// caption fall back to a fixed per-type marker; unknown types get a generic
/// one instead of being dropped.
fn summarize(message: &WaMessage) -> (String, Option<String>) {
    if let Some(text) = &message.text
        && let Some(body) = text.body.as_deref().and_then(trim_non_empty)
    {
        return (body, None);
    }
    if let Some(image) = &message.image {
        return (caption_or(image, "[Image received]"), image.id.clone());
    }
    if let Some(video) = &message.video {
        return (caption_or(video, "[Video received]"), video.id.clone());
    }
    if let Some(document) = &message.document {
        return (caption_or(document, "[Document received]"), document.id.clone());
    }
    if let Some(audio) = &message.audio {
        return ("[Audio received]".to_owned(), audio.id.clone());
    }
    if let Some(sticker) = &message.sticker {
        return ("[Sticker received]".to_owned(), sticker.id.clone());
    }
    if let Some(location) = &message.location {
        return (location_summary(location), None);
    }
    if let Some(interactive) = &message.interactive {
        let title = interactive
            .button_reply
            .as_ref()
            .or(interactive.list_reply.as_ref())
            .and_then(|reply| reply.title.as_deref())
            .and_then(trim_non_empty);
        return (title.unwrap_or_else(|| "[Interactive reply]".to_owned()), None);
    }
    if let Some(button) = &message.button {
        let text = button.text.as_deref().and_then(trim_non_empty);
        return (text.unwrap_or_else(|| "[Button reply]".to_owned()), None);
    }

    ("[Unsupported message received]".to_owned(), None)
}

fn caption_or(media: &WaMedia, marker: &str) -> String {
    media
        .caption
        .as_deref()
        .and_then(trim_non_empty)
        .unwrap_or_else(|| marker.to_owned())
}

fn location_summary(location: &WaLocation) -> String {
    match (location.latitude, location.longitude) {
        (Some(latitude), Some(longitude)) => format!("[Location: {latitude}, {longitude}]"),
        _ => "[Location received]".to_owned(),
    }
}

fn profile_name_for(value: &ChangeValue, from: &str) -> Option<String> {
    value
        .contacts
        .iter()
        .find(|contact| contact.wa_id == from)
        .and_then(|contact| contact.profile.as_ref())
        .and_then(|profile| profile.name.as_deref())
        .and_then(trim_non_empty)
}

fn status_error_detail(status: &WaStatus) -> Option<String> {
    let error = status.errors.first()?;
    error
        .title
        .as_deref()
        .and_then(trim_non_empty)
        .or_else(|| error.code.map(|code| format!("error code {code}")))
}

/// Meta sends epoch seconds as a string; an unparseable value falls back to
/// arrival time.
fn timestamp_ms(raw: Option<&str>) -> u64 {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
        .map(|seconds| seconds.saturating_mul(1_000))
        .unwrap_or_else(now_unix_ms)
}

fn trim_non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}
