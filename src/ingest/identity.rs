use uuid::Uuid;

use crate::{
    domain::{
        error::DomainError,
        event::ContactDetails,
        models::{Channel, ClientRecord},
    },
    storage::{SqliteStore, now_unix_ms},
};

/// Reserved domain for synthesized addresses. Clients created from channels
/// that carry no email get `<identifier>@contacts.invalid`, keeping the
/// unique email column satisfiable without inventing routable addresses.
const PLACEHOLDER_EMAIL_SUFFIX: &str = "@contacts.invalid";

pub(crate) const UNCLAIMED_CONTACT_EMAIL: &str = "unclaimed@contacts.invalid";
const UNCLAIMED_CONTACT_NAME: &str = "Unclaimed desk contact";

/// Identifiers observed for a contact in a single webhook event.
#[derive(Debug, Clone, Default)]
pub struct ContactIdentity {
    pub external_contact_id: Option<String>,
    pub whatsapp_id: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl ContactIdentity {
    pub fn from_contact(details: &ContactDetails) -> Self {
        Self {
            external_contact_id: details.external_contact_id.clone(),
            whatsapp_id: None,
            phone: details.phone.clone(),
            email: details.email.clone(),
            display_name: details.display_name.clone(),
        }
    }

    pub fn from_channel_peer(channel: Channel, peer: &str, display_name: Option<&str>) -> Self {
        let mut identity = Self {
            display_name: display_name.map(str::to_owned),
            ..Self::default()
        };
        match channel {
            Channel::Whatsapp => identity.whatsapp_id = Some(peer.to_owned()),
            Channel::Email => identity.email = Some(peer.to_owned()),
            Channel::Web | Channel::Chat => identity.external_contact_id = Some(peer.to_owned()),
        }
        identity
    }

    fn normalized(&self) -> Self {
        let whatsapp_id = self.whatsapp_id.as_deref().and_then(normalize_phone);
        // A whatsapp id doubles as a phone number, so phone lookups also
        // match clients first seen on the messaging side.
        let phone = self
            .phone
            .as_deref()
            .and_then(normalize_phone)
            .or_else(|| whatsapp_id.clone());
        Self {
            external_contact_id: self.external_contact_id.as_deref().and_then(normalize_token),
            whatsapp_id,
            phone,
            email: self.email.as_deref().and_then(normalize_email),
            display_name: self.display_name.as_deref().and_then(normalize_token),
        }
    }

    fn is_empty(&self) -> bool {
        self.external_contact_id.is_none()
            && self.whatsapp_id.is_none()
            && self.phone.is_none()
            && self.email.is_none()
    }

    /// True when at least one identifier survives normalization, i.e.
    /// `resolve` can key a client on this identity.
    pub fn has_identifiers(&self) -> bool {
        !self.normalized().is_empty()
    }
}

/// Resolves the contact to a client row, creating one on first sight.
///
/// Lookup precedence: external contact id, whatsapp id, phone, email.
/// Newly observed identifiers are attached to the matched row; identifiers
/// already on the row are never overwritten with conflicting values.
/// Creation inserts first and re-runs the lookup on a unique violation, so
/// two racing deliveries converge on the same row.
pub async fn resolve(
    store: &SqliteStore,
    channel: Channel,
    identity: ContactIdentity,
) -> Result<ClientRecord, DomainError> {
    let identity = identity.normalized();
    if identity.is_empty() {
        return Err(DomainError::InvalidRequest(
            "contact carries no usable identifier".to_owned(),
        ));
    }

    if let Some(existing) = lookup(store, &identity).await? {
        return attach_observed(store, existing, &identity).await;
    }

    let candidate = build_client(channel, &identity);
    if store.try_insert_client(&candidate).await? {
        return Ok(candidate);
    }

    let Some(existing) = lookup(store, &identity).await? else {
        return Err(DomainError::LookupMiss(
            "client insert conflicted but no row matches the contact".to_owned(),
        ));
    };
    attach_observed(store, existing, &identity).await
}

/// Placeholder owner for desk tickets whose create event has not arrived
/// yet. Such tickets are moved to the real contact once it shows up.
pub async fn resolve_unclaimed_desk_contact(
    store: &SqliteStore,
) -> Result<ClientRecord, DomainError> {
    let identity = ContactIdentity {
        email: Some(UNCLAIMED_CONTACT_EMAIL.to_owned()),
        display_name: Some(UNCLAIMED_CONTACT_NAME.to_owned()),
        ..ContactIdentity::default()
    };
    resolve(store, Channel::Web, identity).await
}

async fn lookup(
    store: &SqliteStore,
    identity: &ContactIdentity,
) -> Result<Option<ClientRecord>, DomainError> {
    if let Some(external_id) = identity.external_contact_id.as_deref()
        && let Some(found) = store.find_client_by_external_contact_id(external_id).await?
    {
        return Ok(Some(found));
    }
    if let Some(whatsapp_id) = identity.whatsapp_id.as_deref()
        && let Some(found) = store.find_client_by_whatsapp_id(whatsapp_id).await?
    {
        return Ok(Some(found));
    }
    if let Some(phone) = identity.phone.as_deref()
        && let Some(found) = store.find_client_by_phone(phone).await?
    {
        return Ok(Some(found));
    }
    if let Some(email) = identity.email.as_deref()
        && let Some(found) = store.find_client_by_email(email).await?
    {
        return Ok(Some(found));
    }
    Ok(None)
}

async fn attach_observed(
    store: &SqliteStore,
    existing: ClientRecord,
    identity: &ContactIdentity,
) -> Result<ClientRecord, DomainError> {
    let mut updated = existing.clone();
    let mut changed = false;

    if updated.phone.is_none() && identity.phone.is_some() {
        updated.phone = identity.phone.clone();
        changed = true;
    }
    if updated.whatsapp_id.is_none() && identity.whatsapp_id.is_some() {
        updated.whatsapp_id = identity.whatsapp_id.clone();
        changed = true;
    }
    if updated.external_contact_id.is_none() && identity.external_contact_id.is_some() {
        updated.external_contact_id = identity.external_contact_id.clone();
        changed = true;
    }
    if let Some(name) = identity.display_name.as_deref()
        && name != updated.display_name
    {
        updated.display_name = name.to_owned();
        changed = true;
    }
    // A real address replaces a synthesized one, never the other way round.
    if let Some(email) = identity.email.as_deref()
        && updated.email.ends_with(PLACEHOLDER_EMAIL_SUFFIX)
        && email != updated.email
    {
        updated.email = email.to_owned();
        changed = true;
    }

    if !changed {
        return Ok(existing);
    }

    updated.updated_at_ms = now_unix_ms();
    if store.update_client_identity(&updated).await? {
        return Ok(updated);
    }

    // One of the attached identifiers belongs to another client. Keep the
    // row's unique columns as they were and take only the safe fields.
    let mut fallback = existing.clone();
    if let Some(name) = identity.display_name.as_deref() {
        fallback.display_name = name.to_owned();
    }
    if fallback.phone.is_none() && identity.phone.is_some() {
        fallback.phone = identity.phone.clone();
    }
    fallback.updated_at_ms = now_unix_ms();
    if store.update_client_identity(&fallback).await? {
        Ok(fallback)
    } else {
        Ok(existing)
    }
}

fn build_client(channel: Channel, identity: &ContactIdentity) -> ClientRecord {
    let now = now_unix_ms();
    ClientRecord {
        id: format!("client-{}", Uuid::new_v4()),
        display_name: display_name_for(channel, identity),
        email: identity
            .email
            .clone()
            .unwrap_or_else(|| synthesized_email(identity)),
        phone: identity.phone.clone(),
        whatsapp_id: identity.whatsapp_id.clone(),
        external_contact_id: identity.external_contact_id.clone(),
        created_at_ms: now,
        updated_at_ms: now,
    }
}

fn display_name_for(channel: Channel, identity: &ContactIdentity) -> String {
    if let Some(name) = identity.display_name.clone() {
        return name;
    }
    if let Some(email) = identity.email.clone() {
        return email;
    }
    format!("{} contact {}", channel.label(), primary_identifier(identity))
}

fn primary_identifier(identity: &ContactIdentity) -> String {
    identity
        .whatsapp_id
        .clone()
        .or_else(|| identity.phone.clone())
        .or_else(|| identity.external_contact_id.clone())
        .unwrap_or_else(|| "unknown".to_owned())
}

fn synthesized_email(identity: &ContactIdentity) -> String {
    format!("{}{PLACEHOLDER_EMAIL_SUFFIX}", primary_identifier(identity))
}

fn normalize_token(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}

fn normalize_email(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_ascii_lowercase())
    }
}

/// Digits only; formatting differences between vendors must not split one
/// person into two clients.
fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() { None } else { Some(digits) }
}
