// services/link_service.rs

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    errors::{DomainError, Field, Result},
    models::{Invitation, InvitationStatus, Link, Money, RespondResponse},
    repositories::LinkApi,
    store::InvitationStore,
};

use super::{
    error_translator::translate,
    notification_service::{NotificationJob, NotificationQueue},
};

/// Owns the billed side of a patient–professional relationship: turning an
/// accepted invitation into a link, fee changes and unlinking.
#[derive(Clone)]
pub struct LinkService {
    api: Arc<dyn LinkApi>,
    store: InvitationStore,
    notifier: NotificationQueue,
}

impl LinkService {
    pub fn new(api: Arc<dyn LinkApi>, store: InvitationStore, notifier: NotificationQueue) -> Self {
        Self {
            api,
            store,
            notifier,
        }
    }

    /// Applies the remote result of an accept as a single unit.
    ///
    /// The remote API has already committed both the transition and the link;
    /// this only checks the pair is coherent and mirrors it locally. If it is
    /// not, nothing is applied and a later refresh restores the true state.
    pub fn bind_acceptance(
        &self,
        invitation_id: &str,
        response: RespondResponse,
        requested_fee: Money,
    ) -> Result<(Invitation, Link)> {
        let RespondResponse { invitation, link } = response;

        if invitation.id != invitation_id {
            return Err(DomainError::Unknown(format!(
                "server answered for invitation {} instead of {invitation_id}",
                invitation.id
            )));
        }
        if invitation.status != InvitationStatus::Accepted {
            return Err(DomainError::Unknown(format!(
                "server left invitation {invitation_id} {} after accept",
                invitation.status
            )));
        }
        let Some(link) = link else {
            return Err(DomainError::Unknown(format!(
                "server accepted invitation {invitation_id} without creating a link"
            )));
        };
        if !link.is_active() {
            return Err(DomainError::Unknown(format!(
                "link {} for invitation {invitation_id} is not active",
                link.id
            )));
        }
        if link.monthly_fee != requested_fee {
            warn!(
                link_id = %link.id,
                requested = %requested_fee,
                stored = %link.monthly_fee,
                "server stored a different monthly fee"
            );
        }

        self.store.apply_acceptance(invitation.clone(), link.clone());
        info!(invitation_id, link_id = %link.id, fee = %link.monthly_fee, "link created");
        Ok((invitation, link))
    }

    pub async fn fetch_links(&self) -> Result<Vec<Link>> {
        self.api.list_links().await.map_err(translate)
    }

    pub async fn update_monthly_fee(&self, link_id: &str, monthly_fee: Money) -> Result<Link> {
        if !monthly_fee.is_positive() {
            return Err(DomainError::validation(
                Field::MonthlyFee,
                "monthly fee must be greater than zero",
            ));
        }
        self.active_link(link_id)?;

        let link = self
            .api
            .update_fee(link_id, monthly_fee)
            .await
            .map_err(translate)?;

        if !self.store.update_link(link.clone()) {
            warn!(link_id, "fee updated remotely but local link was not replaced");
        }
        info!(link_id, fee = %link.monthly_fee, "monthly fee updated");
        Ok(link)
    }

    pub async fn unlink(&self, link_id: &str, reason: Option<String>) -> Result<()> {
        let link = self.active_link(link_id)?;

        self.api.unlink(link_id, reason).await.map_err(translate)?;

        self.store.deactivate_link(link_id);
        info!(link_id, "patient unlinked");
        self.notifier.enqueue(NotificationJob::Unlinked(link));
        Ok(())
    }

    fn active_link(&self, link_id: &str) -> Result<Link> {
        self.store
            .link(link_id)
            .filter(Link::is_active)
            .ok_or(DomainError::LinkNotFound)
    }
}
