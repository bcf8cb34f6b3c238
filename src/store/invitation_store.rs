// src/store/invitation_store.rs
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::models::{Invitation, InvitationStatus, Link, LinkStatus};

use super::types::{StoreEvent, StoreSnapshot};

const EVENT_CAPACITY: usize = 100;

/// Local mirror of the caller's invitations and links.
///
/// Every mutation happens inside one critical section on a single mutex, so
/// readers and subscribers never observe a half-applied update. The remote API
/// stays the source of truth; [`InvitationStore::replace_all`] resynchronizes
/// after a refresh.
#[derive(Clone)]
pub struct InvitationStore {
    state: Arc<Mutex<StoreSnapshot>>,
    events: broadcast::Sender<StoreEvent>,
}

impl Default for InvitationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InvitationStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(StoreSnapshot::default())),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.lock().clone()
    }

    pub fn invitation(&self, id: &str) -> Option<Invitation> {
        let state = self.lock();
        state
            .sent
            .iter()
            .chain(state.received.iter())
            .find(|invitation| invitation.id == id)
            .cloned()
    }

    pub fn received_by_code(&self, code: &str) -> Option<Invitation> {
        self.lock()
            .received
            .iter()
            .find(|invitation| invitation.invitation_code == code)
            .cloned()
    }

    pub fn link(&self, id: &str) -> Option<Link> {
        self.lock().links.iter().find(|link| link.id == id).cloned()
    }

    /// A sent invitation to `email` that is still pending and unexpired at `now`
    pub fn open_sent_to(&self, email: &str, now: DateTime<Utc>) -> Option<Invitation> {
        self.lock()
            .sent
            .iter()
            .find(|invitation| invitation.is_addressed_to(email) && invitation.is_open_at(now))
            .cloned()
    }

    pub fn replace_all(&self, sent: Vec<Invitation>, received: Vec<Invitation>, links: Vec<Link>) {
        let mut state = self.lock();
        *state = StoreSnapshot {
            sent,
            received,
            links,
        };
        debug!(
            sent = state.sent.len(),
            received = state.received.len(),
            links = state.links.len(),
            "store reloaded"
        );
        self.publish(StoreEvent::Reloaded);
    }

    /// Puts a newly created invitation at the front of the sent list
    pub fn insert_sent(&self, invitation: Invitation) {
        let mut state = self.lock();
        state.sent.retain(|existing| existing.id != invitation.id);
        let id = invitation.id.clone();
        state.sent.insert(0, invitation);
        self.publish(StoreEvent::InvitationAdded { id });
    }

    /// Replaces the stored copy of `invitation`, wherever it lives.
    ///
    /// Returns `false` when the invitation is unknown or when the update would
    /// move a terminal invitation to another status.
    pub fn apply_invitation(&self, invitation: Invitation) -> bool {
        let mut state = self.lock();
        self.apply_invitation_locked(&mut state, invitation)
    }

    pub fn set_status(
        &self,
        id: &str,
        status: InvitationStatus,
        responded_at: Option<DateTime<Utc>>,
    ) -> bool {
        let mut state = self.lock();
        let Some(current) = state
            .sent
            .iter()
            .chain(state.received.iter())
            .find(|invitation| invitation.id == id)
            .cloned()
        else {
            return false;
        };
        let updated = Invitation {
            status,
            responded_at: responded_at.or(current.responded_at),
            ..current
        };
        self.apply_invitation_locked(&mut state, updated)
    }

    /// Applies an accepted invitation and the link it produced as one unit.
    ///
    /// The pair has already been committed remotely, so it always wins: any
    /// other active link for the same patient and professional is marked
    /// inactive, and a local copy in another status is overwritten.
    pub fn apply_acceptance(&self, invitation: Invitation, link: Link) {
        let mut guard = self.lock();
        let state = &mut *guard;

        let mut superseded = Vec::new();
        for existing in state.links.iter_mut().filter(|existing| {
            existing.id != link.id
                && existing.is_active()
                && existing.connects(&link.patient_id, &link.professional_id)
        }) {
            warn!(
                link_id = %existing.id,
                replaced_by = %link.id,
                "deactivating stale link for the same pair"
            );
            existing.status = LinkStatus::Inactive;
            superseded.push(existing.id.clone());
        }

        let id = invitation.id.clone();
        let status = invitation.status;
        let current = state
            .sent
            .iter_mut()
            .chain(state.received.iter_mut())
            .find(|existing| existing.id == id);
        let event = match current {
            Some(current) => {
                if !current.status.can_transition_to(status) {
                    warn!(
                        invitation_id = %id,
                        local = %current.status,
                        "server accepted an invitation held locally as terminal"
                    );
                }
                *current = invitation;
                StoreEvent::InvitationUpdated { id, status }
            }
            None => {
                // not mirrored yet, e.g. accepted straight from a code
                state.received.insert(0, invitation);
                StoreEvent::InvitationAdded { id }
            }
        };

        let link_id = link.id.clone();
        state.links.retain(|existing| existing.id != link.id);
        state.links.insert(0, link);

        self.publish(event);
        for id in superseded {
            self.publish(StoreEvent::LinkUpdated { id });
        }
        self.publish(StoreEvent::LinkAdded { id: link_id });
    }

    pub fn update_link(&self, link: Link) -> bool {
        let mut state = self.lock();
        let Some(slot) = state.links.iter_mut().find(|existing| existing.id == link.id) else {
            return false;
        };
        if link.total_paid < slot.total_paid {
            warn!(link_id = %link.id, "ignoring link update that lowers total paid");
            return false;
        }
        let id = link.id.clone();
        *slot = link;
        self.publish(StoreEvent::LinkUpdated { id });
        true
    }

    pub fn deactivate_link(&self, id: &str) -> bool {
        let mut state = self.lock();
        let Some(slot) = state.links.iter_mut().find(|existing| existing.id == id) else {
            return false;
        };
        slot.status = LinkStatus::Inactive;
        self.publish(StoreEvent::LinkUpdated { id: id.to_string() });
        true
    }

    fn apply_invitation_locked(&self, state: &mut StoreSnapshot, invitation: Invitation) -> bool {
        let slot = state
            .sent
            .iter_mut()
            .chain(state.received.iter_mut())
            .find(|existing| existing.id == invitation.id);
        let Some(slot) = slot else {
            return false;
        };
        if !slot.status.can_transition_to(invitation.status) {
            warn!(
                invitation_id = %invitation.id,
                from = %slot.status,
                to = %invitation.status,
                "ignoring update that would leave a terminal status"
            );
            return false;
        }
        let event = StoreEvent::InvitationUpdated {
            id: invitation.id.clone(),
            status: invitation.status,
        };
        *slot = invitation;
        self.publish(event);
        true
    }

    fn publish(&self, event: StoreEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    fn lock(&self) -> MutexGuard<'_, StoreSnapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
