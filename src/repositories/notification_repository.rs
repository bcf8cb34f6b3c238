// repositories/notification_repository.rs

use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;
use tracing::debug;

use crate::{
    models::{Invitation, Link},
    services::notification_service::{NotificationDispatcher, NotificationError, NotificationKind},
};

use super::api_client::{ApiClient, IDEMPOTENCY_HEADER};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Email,
    Push,
}

impl Channel {
    const fn path(&self) -> &'static str {
        match self {
            Channel::Email => "/notifications/email",
            Channel::Push => "/notifications/push",
        }
    }

    const fn name(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Push => "push",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct NotificationPayload {
    event: NotificationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    recipient_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    recipient_id: Option<String>,
    title: String,
    body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    invitation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    link_id: Option<String>,
}

/// Sends lifecycle notifications through the platform's email and push endpoints
#[derive(Clone)]
pub struct HttpNotificationDispatcher {
    client: ApiClient,
}

impl HttpNotificationDispatcher {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    async fn fan_out(&self, key: &str, payload: NotificationPayload) -> Result<(), NotificationError> {
        for channel in [Channel::Email, Channel::Push] {
            let builder = self
                .client
                .request(Method::POST, channel.path())
                .header(
                    IDEMPOTENCY_HEADER,
                    format!("{}:{}:{}", key, payload.event, channel.name()),
                )
                .json(&payload);
            self.client.send_empty(builder).await?;
            debug!(key, channel = channel.name(), event = %payload.event, "notification sent");
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationDispatcher for HttpNotificationDispatcher {
    async fn send_invitation_created(
        &self,
        invitation: &Invitation,
    ) -> Result<(), NotificationError> {
        let payload = NotificationPayload {
            event: NotificationKind::InvitationCreated,
            recipient_email: Some(invitation.to_professional_email.clone()),
            recipient_id: None,
            title: "New patient invitation".to_string(),
            body: format!(
                "{} invited you to connect as their professional.",
                invitation.from_patient_name
            ),
            invitation_id: Some(invitation.id.clone()),
            link_id: None,
        };
        self.fan_out(&invitation.id, payload).await
    }

    async fn send_accepted(
        &self,
        invitation: &Invitation,
        link: &Link,
    ) -> Result<(), NotificationError> {
        let professional = invitation
            .to_professional_name
            .clone()
            .unwrap_or_else(|| invitation.to_professional_email.clone());
        let payload = NotificationPayload {
            event: NotificationKind::Accepted,
            recipient_email: Some(invitation.from_patient_email.clone()),
            recipient_id: Some(invitation.from_patient_id.clone()),
            title: "Invitation accepted".to_string(),
            body: format!(
                "{professional} accepted your invitation. Monthly fee: {}.",
                link.monthly_fee
            ),
            invitation_id: Some(invitation.id.clone()),
            link_id: Some(link.id.clone()),
        };
        self.fan_out(&invitation.id, payload).await
    }

    async fn send_rejected(&self, invitation: &Invitation) -> Result<(), NotificationError> {
        let professional = invitation
            .to_professional_name
            .clone()
            .unwrap_or_else(|| invitation.to_professional_email.clone());
        let payload = NotificationPayload {
            event: NotificationKind::Rejected,
            recipient_email: Some(invitation.from_patient_email.clone()),
            recipient_id: Some(invitation.from_patient_id.clone()),
            title: "Invitation declined".to_string(),
            body: format!("{professional} declined your invitation."),
            invitation_id: Some(invitation.id.clone()),
            link_id: None,
        };
        self.fan_out(&invitation.id, payload).await
    }

    async fn send_unlinked(&self, link: &Link) -> Result<(), NotificationError> {
        let payload = NotificationPayload {
            event: NotificationKind::Unlinked,
            recipient_email: None,
            recipient_id: Some(link.professional_id.clone()),
            title: "Patient unlinked".to_string(),
            body: "A patient ended their link with you.".to_string(),
            invitation_id: None,
            link_id: Some(link.id.clone()),
        };
        self.fan_out(&link.id, payload).await
    }
}
