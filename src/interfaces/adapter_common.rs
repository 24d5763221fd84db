use axum::{Json, http::StatusCode};
use serde_json::{Value, json};

use crate::{
    application::state::SharedState,
    domain::{event::InboundEvent, models::Channel},
    ingest::pipeline::{self, EventOutcome},
};

/// Tally of what one webhook batch did to the store.
#[derive(Debug, Default)]
pub(crate) struct IngestSummary {
    pub processed: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl IngestSummary {
    pub(crate) fn absorb(&mut self, outcome: &EventOutcome) {
        match outcome {
            EventOutcome::TicketStored { .. }
            | EventOutcome::MessageStored { .. }
            | EventOutcome::StatusApplied { .. } => self.processed += 1,
            EventOutcome::Duplicate => self.duplicates += 1,
            EventOutcome::Skipped { .. } => self.skipped += 1,
            EventOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// Runs every event of one delivery through the pipeline. Events fail
/// independently; a bad event only moves the summary's failed counter.
pub(crate) async fn apply_batch(
    state: &SharedState,
    source: Channel,
    events: Vec<InboundEvent>,
) -> IngestSummary {
    let ctx = state.ingest_context();
    let mut summary = IngestSummary::default();
    for event in events {
        let outcome = pipeline::apply_event(&ctx, source, event).await;
        summary.absorb(&outcome);
    }
    summary
}

pub(crate) fn batch_ack(summary: &IngestSummary) -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "ok": true,
            "processed": summary.processed,
            "duplicates": summary.duplicates,
            "skipped": summary.skipped,
            "failed": summary.failed,
        })),
    )
}

pub(crate) fn unauthorized(message: impl Into<String>) -> (StatusCode, Json<Value>) {
    error_response(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
}

pub(crate) fn forbidden(message: impl Into<String>) -> (StatusCode, Json<Value>) {
    error_response(StatusCode::FORBIDDEN, "FORBIDDEN", message)
}

pub(crate) fn unavailable(message: impl Into<String>) -> (StatusCode, Json<Value>) {
    error_response(StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE", message)
}

pub(crate) fn bad_request(message: impl Into<String>) -> (StatusCode, Json<Value>) {
    error_response(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message)
}

fn error_response(
    status: StatusCode,
    code: &str,
    message: impl Into<String>,
) -> (StatusCode, Json<Value>) {
    (
        status,
        Json(json!({
            "ok": false,
            "error": {
                "code": code,
                "message": message.into(),
            }
        })),
    )
}
