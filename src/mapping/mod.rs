//! Vendor vocabulary translation. Each webhook vendor reports ticket fields
//! in its own vocabulary; the tables here map those onto the internal enums.
//! Lookup is case-insensitive and total: unmapped values fall back to a
//! documented default instead of failing the event.

use tracing::debug;

use crate::domain::models::{Channel, TicketPriority, TicketStatus};

pub const DEFAULT_STATUS: TicketStatus = TicketStatus::Open;
pub const DEFAULT_PRIORITY: TicketPriority = TicketPriority::Medium;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vendor {
    Desk,
    Whatsapp,
}

impl Vendor {
    pub fn as_str(self) -> &'static str {
        match self {
            Vendor::Desk => "desk",
            Vendor::Whatsapp => "whatsapp",
        }
    }
}

const DESK_STATUS: &[(&str, TicketStatus)] = &[
    ("open", TicketStatus::Open),
    ("on hold", TicketStatus::Pending),
    ("escalated", TicketStatus::Open),
    ("resolved", TicketStatus::Resolved),
    ("closed", TicketStatus::Closed),
];

const DESK_PRIORITY: &[(&str, TicketPriority)] = &[
    ("low", TicketPriority::Low),
    ("medium", TicketPriority::Medium),
    ("high", TicketPriority::High),
    ("urgent", TicketPriority::Urgent),
    // Placeholder the desk sends while a ticket has no priority assigned.
    ("-none-", TicketPriority::Medium),
];

const DESK_CHANNEL: &[(&str, Channel)] = &[
    ("email", Channel::Email),
    ("web", Channel::Web),
    ("chat", Channel::Chat),
    ("whatsapp", Channel::Whatsapp),
];

// WhatsApp deliveries carry no ticket vocabulary of their own, so both
// tables are empty and every value lands on the default.
const WHATSAPP_STATUS: &[(&str, TicketStatus)] = &[];
const WHATSAPP_PRIORITY: &[(&str, TicketPriority)] = &[];

pub fn map_status(vendor: Vendor, raw: &str) -> TicketStatus {
    let table = match vendor {
        Vendor::Desk => DESK_STATUS,
        Vendor::Whatsapp => WHATSAPP_STATUS,
    };
    lookup(table, raw).unwrap_or_else(|| {
        debug!("no {} status mapping for {raw:?}, using default", vendor.as_str());
        DEFAULT_STATUS
    })
}

pub fn map_priority(vendor: Vendor, raw: &str) -> TicketPriority {
    let table = match vendor {
        Vendor::Desk => DESK_PRIORITY,
        Vendor::Whatsapp => WHATSAPP_PRIORITY,
    };
    lookup(table, raw).unwrap_or_else(|| {
        debug!("no {} priority mapping for {raw:?}, using default", vendor.as_str());
        DEFAULT_PRIORITY
    })
}

pub fn map_desk_channel(raw: &str) -> Channel {
    lookup(DESK_CHANNEL, raw).unwrap_or_else(|| {
        debug!("no desk channel mapping for {raw:?}, using web");
        Channel::Web
    })
}

fn lookup<T: Copy>(table: &[(&str, T)], raw: &str) -> Option<T> {
    let normalized = raw.trim().to_ascii_lowercase();
    table
        .iter()
        .find(|(key, _)| *key == normalized)
        .map(|(_, value)| *value)
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_PRIORITY, DEFAULT_STATUS, Vendor, map_desk_channel, map_priority, map_status};
    use crate::domain::models::{Channel, TicketPriority, TicketStatus};

    #[test]
    fn desk_status_vocabulary_maps_to_internal_states() {
        assert_eq!(map_status(Vendor::Desk, "Open"), TicketStatus::Open);
        assert_eq!(map_status(Vendor::Desk, "On Hold"), TicketStatus::Pending);
        assert_eq!(map_status(Vendor::Desk, "Escalated"), TicketStatus::Open);
        assert_eq!(map_status(Vendor::Desk, "Resolved"), TicketStatus::Resolved);
        assert_eq!(map_status(Vendor::Desk, "closed"), TicketStatus::Closed);
    }

    #[test]
    fn unmapped_status_falls_back_to_default() {
        assert_eq!(map_status(Vendor::Desk, "Lost In Space"), DEFAULT_STATUS);
        assert_eq!(map_status(Vendor::Whatsapp, "open"), DEFAULT_STATUS);
        assert_eq!(map_status(Vendor::Desk, ""), DEFAULT_STATUS);
    }

    #[test]
    fn desk_priority_vocabulary_maps_to_internal_priorities() {
        assert_eq!(map_priority(Vendor::Desk, "low"), TicketPriority::Low);
        assert_eq!(map_priority(Vendor::Desk, "Medium"), TicketPriority::Medium);
        assert_eq!(map_priority(Vendor::Desk, "HIGH"), TicketPriority::High);
        assert_eq!(map_priority(Vendor::Desk, "urgent"), TicketPriority::Urgent);
    }

    #[test]
    fn unassigned_priority_placeholder_maps_to_medium() {
        assert_eq!(map_priority(Vendor::Desk, "-None-"), TicketPriority::Medium);
        assert_eq!(map_priority(Vendor::Desk, " -none- "), TicketPriority::Medium);
    }

    #[test]
    fn unmapped_priority_falls_back_to_default() {
        assert_eq!(map_priority(Vendor::Desk, "blocker"), DEFAULT_PRIORITY);
        assert_eq!(map_priority(Vendor::Whatsapp, "high"), DEFAULT_PRIORITY);
    }

    #[test]
    fn desk_channel_maps_with_web_fallback() {
        assert_eq!(map_desk_channel("Email"), Channel::Email);
        assert_eq!(map_desk_channel("chat"), Channel::Chat);
        assert_eq!(map_desk_channel("WhatsApp"), Channel::Whatsapp);
        assert_eq!(map_desk_channel("Forums"), Channel::Web);
        assert_eq!(map_desk_channel(""), Channel::Web);
    }
}
