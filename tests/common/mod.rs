#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration as StdDuration,
};

use async_trait::async_trait;
use carelink::{
    models::{
        CreateInvitationRequest, Invitation, InvitationPage, InvitationStatus, Inviter, Link,
        LinkStatus, Money, RespondAction, RespondRequest, RespondResponse,
    },
    repositories::{InvitationApi, LinkApi},
    services::{
        InvitationService, LinkService, NotificationDispatcher, NotificationError,
        NotificationKind, NotificationQueue, NotificationQueueConfig,
    },
    store::InvitationStore,
    utils::{
        invitation_validator::InvitationValidator,
        time::{Clock, ManualClock},
    },
    errors::TransportFailure,
    RemoteError,
};
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Notify;
use uuid::Uuid;

pub const PROFESSIONAL_ID: &str = "pro-1";

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

pub fn inviter() -> Inviter {
    Inviter {
        id: "patient-1".into(),
        name: "Pat Doe".into(),
        email: "p@x.com".into(),
    }
}

pub fn fee(raw: &str) -> Money {
    raw.parse().unwrap()
}

#[derive(Default)]
struct FakeState {
    invitations: Vec<Invitation>,
    links: Vec<Link>,
    next_id: u32,
    create_keys: Vec<Uuid>,
    created_by_key: HashMap<Uuid, Invitation>,
    calls: Vec<String>,
    fail_next: Option<RemoteError>,
    lose_next_response: bool,
}

/// In-memory stand-in for the remote API, enforcing the same rules the real
/// server does: one open invitation per pair and one response per invitation.
pub struct FakeApi {
    state: Mutex<FakeState>,
    clock: ManualClock,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeApi {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            state: Mutex::new(FakeState::default()),
            clock,
            gate: Mutex::new(None),
        }
    }

    pub fn fail_next(&self, err: RemoteError) {
        self.state.lock().unwrap().fail_next = Some(err);
    }

    /// The next call commits on the server but the client sees a timeout
    pub fn lose_next_response(&self) {
        self.state.lock().unwrap().lose_next_response = true;
    }

    /// Makes `respond` wait until the returned handle is notified
    pub fn hold_responses(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(notify.clone());
        notify
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn create_keys(&self) -> Vec<Uuid> {
        self.state.lock().unwrap().create_keys.clone()
    }

    pub fn invitation(&self, id: &str) -> Option<Invitation> {
        self.state
            .lock()
            .unwrap()
            .invitations
            .iter()
            .find(|i| i.id == id)
            .cloned()
    }

    pub fn links(&self) -> Vec<Link> {
        self.state.lock().unwrap().links.clone()
    }

    /// Seeds an invitation addressed to us, as if another patient had sent it
    pub fn seed_received(&self, from_email: &str) -> Invitation {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let now = self.clock.now();
        let invitation = Invitation {
            id: format!("inv-{}", state.next_id),
            from_patient_id: format!("patient-{}", state.next_id),
            from_patient_name: "Other Patient".into(),
            from_patient_email: from_email.into(),
            to_professional_email: "doc@y.com".into(),
            to_professional_name: Some("Dr Who".into()),
            message: None,
            invitation_code: format!("CODE{}", state.next_id),
            status: InvitationStatus::Pending,
            created_at: now,
            expires_at: Invitation::expiry_for(now),
            responded_at: None,
        };
        state.invitations.push(invitation.clone());
        invitation
    }

    fn begin(&self, call: &str) -> Result<std::sync::MutexGuard<'_, FakeState>, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call.to_string());
        let failure = state.fail_next.take();
        match failure {
            Some(err) => Err(err),
            None => Ok(state),
        }
    }

    fn page(invitations: Vec<Invitation>, page: usize, limit: usize) -> InvitationPage {
        let total = invitations.len();
        InvitationPage {
            invitations: invitations
                .into_iter()
                .skip((page - 1) * limit)
                .take(limit)
                .collect(),
            total,
            page,
            limit,
        }
    }
}

fn conflict(message: &str) -> RemoteError {
    RemoteError::backend(Some(409), message)
}

#[async_trait]
impl InvitationApi for FakeApi {
    async fn create_invitation(
        &self,
        request: &CreateInvitationRequest,
        idempotency_key: Uuid,
    ) -> Result<Invitation, RemoteError> {
        let now = self.clock.now();
        let mut state = self.begin("create")?;
        state.create_keys.push(idempotency_key);
        if let Some(existing) = state.created_by_key.get(&idempotency_key) {
            return Ok(existing.clone());
        }

        let duplicate = state.invitations.iter().any(|i| {
            i.from_patient_email == request.patient_email
                && i.to_professional_email == request.to_email
                && i.is_open_at(now)
        });
        if duplicate {
            return Err(conflict("Invitation already exists for this professional"));
        }

        state.next_id += 1;
        let invitation = Invitation {
            id: format!("inv-{}", state.next_id),
            from_patient_id: "patient-1".into(),
            from_patient_name: request.patient_name.clone(),
            from_patient_email: request.patient_email.clone(),
            to_professional_email: request.to_email.clone(),
            to_professional_name: request.to_name.clone(),
            message: request.message.clone(),
            invitation_code: format!("CODE{}", state.next_id),
            status: InvitationStatus::Pending,
            created_at: now,
            expires_at: Invitation::expiry_for(now),
            responded_at: None,
        };
        state.invitations.push(invitation.clone());
        state
            .created_by_key
            .insert(idempotency_key, invitation.clone());
        if std::mem::take(&mut state.lose_next_response) {
            return Err(TransportFailure::Timeout.into());
        }
        Ok(invitation)
    }

    async fn list_sent(&self, page: usize, limit: usize) -> Result<InvitationPage, RemoteError> {
        let state = self.begin("list_sent")?;
        let sent = state
            .invitations
            .iter()
            .rev()
            .filter(|i| i.from_patient_email == "p@x.com")
            .cloned()
            .collect();
        Ok(Self::page(sent, page, limit))
    }

    async fn list_received(
        &self,
        page: usize,
        limit: usize,
    ) -> Result<InvitationPage, RemoteError> {
        let state = self.begin("list_received")?;
        let received = state
            .invitations
            .iter()
            .filter(|i| i.from_patient_email != "p@x.com")
            .cloned()
            .collect();
        Ok(Self::page(received, page, limit))
    }

    async fn respond(
        &self,
        invitation_id: &str,
        request: &RespondRequest,
    ) -> Result<RespondResponse, RemoteError> {
        let gate = self.gate.lock().unwrap().clone();
        match gate {
            Some(gate) => gate.notified().await,
            None => tokio::task::yield_now().await,
        }

        let now = self.clock.now();
        let mut state = self.begin("respond")?;
        state.next_id += 1;
        let link_id = format!("link-{}", state.next_id);

        let invitation = state
            .invitations
            .iter_mut()
            .find(|i| i.id == invitation_id)
            .ok_or_else(|| RemoteError::backend(Some(404), "Invitation not found"))?;
        if !invitation.is_open_at(now) {
            return Err(conflict("Invitation has expired or is no longer pending"));
        }

        invitation.responded_at = Some(now);
        match request.action {
            RespondAction::Reject => {
                invitation.status = InvitationStatus::Rejected;
                Ok(RespondResponse {
                    invitation: invitation.clone(),
                    link: None,
                })
            }
            RespondAction::Accept => {
                invitation.status = InvitationStatus::Accepted;
                let invitation = invitation.clone();
                let link = Link {
                    id: link_id,
                    patient_id: invitation.from_patient_id.clone(),
                    professional_id: PROFESSIONAL_ID.into(),
                    monthly_fee: request.monthly_fee.unwrap_or(Money::ZERO),
                    status: LinkStatus::Active,
                    total_paid: Money::ZERO,
                    created_at: now,
                };
                state.links.insert(0, link.clone());
                Ok(RespondResponse {
                    invitation,
                    link: Some(link),
                })
            }
        }
    }

    async fn cancel(&self, invitation_id: &str) -> Result<Invitation, RemoteError> {
        let now = self.clock.now();
        let mut state = self.begin("cancel")?;
        let invitation = state
            .invitations
            .iter_mut()
            .find(|i| i.id == invitation_id)
            .ok_or_else(|| RemoteError::backend(Some(404), "Invitation not found"))?;
        if !invitation.is_pending() {
            return Err(conflict("Only pending invitations can be cancelled"));
        }
        invitation.status = InvitationStatus::Cancelled;
        invitation.responded_at = Some(now);
        Ok(invitation.clone())
    }

    async fn resend(&self, invitation_id: &str) -> Result<Invitation, RemoteError> {
        let now = self.clock.now();
        let mut state = self.begin("resend")?;
        let invitation = state
            .invitations
            .iter_mut()
            .find(|i| i.id == invitation_id)
            .ok_or_else(|| RemoteError::backend(Some(404), "Invitation not found"))?;
        if !invitation.is_open_at(now) {
            return Err(conflict("Invitation has expired"));
        }
        invitation.created_at = now;
        invitation.expires_at = Invitation::expiry_for(now);
        Ok(invitation.clone())
    }
}

#[async_trait]
impl LinkApi for FakeApi {
    async fn list_links(&self) -> Result<Vec<Link>, RemoteError> {
        Ok(self.begin("list_links")?.links.clone())
    }

    async fn update_fee(&self, link_id: &str, monthly_fee: Money) -> Result<Link, RemoteError> {
        let mut state = self.begin("update_fee")?;
        let link = state
            .links
            .iter_mut()
            .find(|l| l.id == link_id)
            .ok_or_else(|| RemoteError::backend(Some(404), "Link not found"))?;
        link.monthly_fee = monthly_fee;
        Ok(link.clone())
    }

    async fn unlink(&self, link_id: &str, _reason: Option<String>) -> Result<(), RemoteError> {
        let mut state = self.begin("unlink")?;
        let link = state
            .links
            .iter_mut()
            .find(|l| l.id == link_id)
            .ok_or_else(|| RemoteError::backend(Some(404), "Link not found"))?;
        link.status = LinkStatus::Inactive;
        Ok(())
    }
}

/// Records every dispatch; optionally fails all of them
#[derive(Default)]
pub struct RecordingDispatcher {
    pub always_fail: bool,
    calls: Mutex<Vec<(String, NotificationKind)>>,
}

impl RecordingDispatcher {
    pub fn failing() -> Self {
        Self {
            always_fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<(String, NotificationKind)> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, id: &str, kind: NotificationKind) -> Result<(), NotificationError> {
        self.calls.lock().unwrap().push((id.to_string(), kind));
        if self.always_fail {
            return Err(NotificationError::Delivery("dispatcher unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn send_invitation_created(&self, i: &Invitation) -> Result<(), NotificationError> {
        self.record(&i.id, NotificationKind::InvitationCreated)
    }

    async fn send_accepted(&self, i: &Invitation, _: &Link) -> Result<(), NotificationError> {
        self.record(&i.id, NotificationKind::Accepted)
    }

    async fn send_rejected(&self, i: &Invitation) -> Result<(), NotificationError> {
        self.record(&i.id, NotificationKind::Rejected)
    }

    async fn send_unlinked(&self, l: &Link) -> Result<(), NotificationError> {
        self.record(&l.id, NotificationKind::Unlinked)
    }
}

pub struct Harness {
    pub service: InvitationService,
    pub api: Arc<FakeApi>,
    pub clock: ManualClock,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub queue: NotificationQueue,
}

impl Harness {
    pub fn store(&self) -> &InvitationStore {
        self.service.store()
    }
}

pub fn harness() -> Harness {
    harness_with(RecordingDispatcher::default())
}

/// Must run inside a tokio runtime: the notification worker is spawned here
pub fn harness_with(dispatcher: RecordingDispatcher) -> Harness {
    let clock = ManualClock::new(start());
    let api = Arc::new(FakeApi::new(clock.clone()));
    let dispatcher = Arc::new(dispatcher);
    let (queue, _worker) = NotificationQueue::spawn(
        dispatcher.clone(),
        NotificationQueueConfig {
            max_attempts: 2,
            initial_backoff: StdDuration::from_millis(1),
            dedupe_capacity: 100,
        },
    );
    let store = InvitationStore::new();
    let links = LinkService::new(api.clone(), store.clone(), queue.clone());
    let service = InvitationService::new(
        api.clone(),
        links,
        store,
        queue.clone(),
        InvitationValidator::default(),
        Arc::new(clock.clone()),
    );
    Harness {
        service,
        api,
        clock,
        dispatcher,
        queue,
    }
}
