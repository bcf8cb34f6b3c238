// services/invitation_service.rs

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    errors::{DomainError, Field, Result},
    models::{
        Invitation, InvitationStatus, Inviter, Link, Money, NewInvitation, RespondRequest,
    },
    repositories::{invitation_repository::fetch_all, InvitationApi},
    store::{InvitationStore, StoreSnapshot},
    utils::{invitation_validator::InvitationValidator, time::Clock},
};

use super::{
    error_translator::translate,
    link_service::LinkService,
    notification_service::{NotificationJob, NotificationQueue},
};

/// Drives invitations through `pending → {accepted, rejected, cancelled}`.
///
/// Every remote call is awaited without holding the store lock; results are
/// applied afterwards in one step, so dropping an operation midway leaves the
/// store untouched. State-changing calls are never retried here.
#[derive(Clone)]
pub struct InvitationService {
    api: Arc<dyn InvitationApi>,
    links: LinkService,
    store: InvitationStore,
    notifier: NotificationQueue,
    validator: Arc<InvitationValidator>,
    clock: Arc<dyn Clock>,
}

impl InvitationService {
    pub fn new(
        api: Arc<dyn InvitationApi>,
        links: LinkService,
        store: InvitationStore,
        notifier: NotificationQueue,
        validator: InvitationValidator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            api,
            links,
            store,
            notifier,
            validator: Arc::new(validator),
            clock,
        }
    }

    pub fn store(&self) -> &InvitationStore {
        &self.store
    }

    pub fn links(&self) -> &LinkService {
        &self.links
    }

    pub async fn create(&self, input: NewInvitation, inviter: &Inviter) -> Result<Invitation> {
        let request = self.validator.validate_create_input(&input, inviter)?;

        // advisory only; the server makes the final call
        if let Some(existing) = self.store.open_sent_to(&request.to_email, self.clock.now()) {
            info!(invitation_id = %existing.id, "pending invitation already sent to this professional");
            return Err(DomainError::InvitationAlreadyExists);
        }

        let idempotency_key = input.idempotency_key.unwrap_or_else(Uuid::new_v4);
        let invitation = self
            .api
            .create_invitation(&request, idempotency_key)
            .await
            .map_err(translate)?;

        self.store.insert_sent(invitation.clone());
        info!(invitation_id = %invitation.id, %idempotency_key, "invitation created");
        self.notifier
            .enqueue(NotificationJob::InvitationCreated(invitation.clone()));
        Ok(invitation)
    }

    pub async fn accept(
        &self,
        invitation: &Invitation,
        responder_id: &str,
        monthly_fee: Money,
    ) -> Result<Link> {
        let current = self.latest(invitation);
        if !current.is_open_at(self.clock.now()) {
            return Err(DomainError::InvitationExpired);
        }
        if !monthly_fee.is_positive() {
            return Err(DomainError::validation(
                Field::MonthlyFee,
                "monthly fee must be greater than zero",
            ));
        }

        let response = self
            .api
            .respond(&invitation.id, &RespondRequest::accept(monthly_fee))
            .await
            .map_err(translate)?;

        let (accepted, link) = self
            .links
            .bind_acceptance(&invitation.id, response, monthly_fee)?;
        if link.professional_id != responder_id {
            warn!(
                link_id = %link.id,
                responder_id,
                professional_id = %link.professional_id,
                "link professional differs from responder"
            );
        }

        self.notifier.enqueue(NotificationJob::Accepted {
            invitation: accepted,
            link: link.clone(),
        });
        Ok(link)
    }

    /// Accepts a received invitation identified by its out-of-band code
    pub async fn accept_by_code(
        &self,
        code: &str,
        responder_id: &str,
        monthly_fee: Money,
    ) -> Result<Link> {
        let invitation = self
            .store
            .received_by_code(code.trim())
            .ok_or_else(|| DomainError::Unknown("invitation code not recognised".to_string()))?;
        self.accept(&invitation, responder_id, monthly_fee).await
    }

    pub async fn reject(&self, invitation: &Invitation, reason: Option<String>) -> Result<Invitation> {
        if !self.latest(invitation).is_pending() {
            return Err(DomainError::InvitationExpired);
        }

        let response = self
            .api
            .respond(&invitation.id, &RespondRequest::reject(reason))
            .await
            .map_err(translate)?;
        let rejected = response.invitation;
        if rejected.status != InvitationStatus::Rejected {
            return Err(DomainError::Unknown(format!(
                "server left invitation {} {} after reject",
                rejected.id, rejected.status
            )));
        }

        if !self.store.apply_invitation(rejected.clone()) {
            debug!(invitation_id = %rejected.id, "rejected invitation not mirrored locally");
        }
        info!(invitation_id = %rejected.id, "invitation rejected");
        self.notifier
            .enqueue(NotificationJob::Rejected(rejected.clone()));
        Ok(rejected)
    }

    /// Withdraws a sent invitation. Allowed while pending, even past expiry.
    pub async fn cancel(&self, invitation: &Invitation) -> Result<()> {
        if !self.latest(invitation).is_pending() {
            return Err(DomainError::CannotCancelInvitation);
        }

        let cancelled = self.api.cancel(&invitation.id).await.map_err(translate)?;

        let responded_at = cancelled.responded_at.or_else(|| Some(self.clock.now()));
        self.store
            .set_status(&invitation.id, InvitationStatus::Cancelled, responded_at);
        info!(invitation_id = %invitation.id, "invitation cancelled");
        Ok(())
    }

    pub async fn resend(&self, invitation: &Invitation) -> Result<Invitation> {
        if !self.latest(invitation).is_open_at(self.clock.now()) {
            return Err(DomainError::CannotResendInvitation);
        }

        let refreshed = self.api.resend(&invitation.id).await.map_err(translate)?;

        self.store.apply_invitation(refreshed.clone());
        info!(invitation_id = %refreshed.id, expires_at = %refreshed.expires_at, "invitation resent");
        Ok(refreshed)
    }

    /// Replaces local state with the server's. Also the recovery path after
    /// any local application that did not complete.
    pub async fn refresh(&self) -> Result<StoreSnapshot> {
        let api = self.api.as_ref();
        let sent = async {
            fetch_all(|page, limit| api.list_sent(page, limit))
                .await
                .map_err(translate)
        };
        let received = async {
            fetch_all(|page, limit| api.list_received(page, limit))
                .await
                .map_err(translate)
        };
        let (sent, received, links) = tokio::try_join!(sent, received, self.links.fetch_links())?;

        self.store.replace_all(sent, received, links);
        Ok(self.store.snapshot())
    }

    /// The freshest copy we know of; the caller's may predate a completed operation
    fn latest(&self, invitation: &Invitation) -> Invitation {
        self.store
            .invitation(&invitation.id)
            .unwrap_or_else(|| invitation.clone())
    }
}
