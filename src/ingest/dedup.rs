use crate::{
    domain::{error::DomainError, models::TicketRecord},
    storage::SqliteStore,
};

/// Message about to be persisted, described just enough to decide whether
/// it already exists.
#[derive(Debug, Clone, Copy)]
pub struct CandidateMessage<'a> {
    pub external_message_id: Option<&'a str>,
    pub content: &'a str,
    pub ts_ms: u64,
}

/// True when the candidate is a redelivery of a stored message.
///
/// With an external message id the check is an exact global lookup. Without
/// one it falls back to a heuristic: identical content on the same ticket
/// within `window_ms` of the candidate timestamp, either side.
pub async fn is_duplicate(
    store: &SqliteStore,
    ticket: &TicketRecord,
    candidate: &CandidateMessage<'_>,
    window_ms: u64,
) -> Result<bool, DomainError> {
    if let Some(external_id) = candidate.external_message_id {
        return Ok(store.find_message_by_external_id(external_id).await?.is_some());
    }

    let since = candidate.ts_ms.saturating_sub(window_ms);
    let until = candidate.ts_ms.saturating_add(window_ms);
    let found = store
        .find_thread_duplicate(&ticket.id, candidate.content, since, until)
        .await?;
    Ok(found.is_some())
}
