use serde::Serialize;

use crate::models::{Invitation, InvitationStatus, Link};

/// Change notifications published by the store, in the order they were applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StoreEvent {
    /// All collections were replaced with freshly fetched state
    Reloaded,
    InvitationAdded {
        id: String,
    },
    InvitationUpdated {
        id: String,
        status: InvitationStatus,
    },
    LinkAdded {
        id: String,
    },
    LinkUpdated {
        id: String,
    },
}

/// Immutable copy of everything the store holds at one instant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreSnapshot {
    /// Most recent first
    pub sent: Vec<Invitation>,
    pub received: Vec<Invitation>,
    /// Most recent first
    pub links: Vec<Link>,
}

impl StoreSnapshot {
    pub fn active_links(&self) -> impl Iterator<Item = &Link> {
        self.links.iter().filter(|link| link.is_active())
    }

    pub fn pending_received(&self) -> impl Iterator<Item = &Invitation> {
        self.received.iter().filter(|invitation| invitation.is_pending())
    }
}
