use crate::domain::models::{Channel, SenderKind};

/// Normalized inbound webhook event. Channel adapters translate vendor
/// payloads into this closed set; the ingest pipeline matches on it
/// exhaustively, so adding a variant forces every consumer to handle it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    MessageReceived {
        external_message_id: String,
        from: String,
        profile_name: Option<String>,
        ts_ms: u64,
        content: String,
        media_ref: Option<String>,
    },
    DeliveryStatusChanged {
        external_message_id: String,
        status: String,
        ts_ms: u64,
        error: Option<String>,
    },
    TicketCreated {
        external_ticket_id: String,
        subject: String,
        external_status: Option<String>,
        external_priority: Option<String>,
        channel: Channel,
        contact: ContactDetails,
        description: Option<String>,
    },
    TicketUpdated {
        external_ticket_id: String,
        external_status: Option<String>,
        external_priority: Option<String>,
    },
    ThreadAdded {
        external_ticket_id: String,
        content: String,
        direction: ThreadDirection,
        author: SenderKind,
        ts_ms: u64,
    },
}

/// Contact fields carried by a desk ticket event. All optional; the identity
/// resolver decides what to key on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactDetails {
    pub external_contact_id: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadDirection {
    Incoming,
    Outgoing,
}
