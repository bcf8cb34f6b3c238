// repositories/invitation_repository.rs

use std::collections::HashSet;

use async_trait::async_trait;
use reqwest::Method;
use tracing::warn;
use uuid::Uuid;

use crate::{
    errors::RemoteError,
    models::{
        CreateInvitationRequest, Invitation, InvitationEnvelope, InvitationPage, RespondRequest,
        RespondResponse,
    },
};

use super::api_client::{ApiClient, IDEMPOTENCY_HEADER};

pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Remote invitation endpoints. The remote side is the source of truth and
/// enforces uniqueness and state transitions authoritatively.
#[async_trait]
pub trait InvitationApi: Send + Sync {
    /// `idempotency_key` lets the server recognise a repeated create
    async fn create_invitation(
        &self,
        request: &CreateInvitationRequest,
        idempotency_key: Uuid,
    ) -> Result<Invitation, RemoteError>;

    async fn list_sent(&self, page: usize, limit: usize) -> Result<InvitationPage, RemoteError>;

    async fn list_received(&self, page: usize, limit: usize)
        -> Result<InvitationPage, RemoteError>;

    async fn respond(
        &self,
        invitation_id: &str,
        request: &RespondRequest,
    ) -> Result<RespondResponse, RemoteError>;

    async fn cancel(&self, invitation_id: &str) -> Result<Invitation, RemoteError>;

    async fn resend(&self, invitation_id: &str) -> Result<Invitation, RemoteError>;
}

#[async_trait]
impl InvitationApi for ApiClient {
    async fn create_invitation(
        &self,
        request: &CreateInvitationRequest,
        idempotency_key: Uuid,
    ) -> Result<Invitation, RemoteError> {
        let builder = self
            .request(Method::POST, "/invitations")
            .header(IDEMPOTENCY_HEADER, idempotency_key.to_string())
            .json(request);
        let envelope: InvitationEnvelope = self.send_json(builder).await?;
        Ok(envelope.invitation)
    }

    async fn list_sent(&self, page: usize, limit: usize) -> Result<InvitationPage, RemoteError> {
        let builder = self
            .request(Method::GET, "/invitations/sent")
            .query(&[("page", page), ("limit", limit)]);
        self.send_json(builder).await
    }

    async fn list_received(
        &self,
        page: usize,
        limit: usize,
    ) -> Result<InvitationPage, RemoteError> {
        let builder = self
            .request(Method::GET, "/invitations/received")
            .query(&[("page", page), ("limit", limit)]);
        self.send_json(builder).await
    }

    async fn respond(
        &self,
        invitation_id: &str,
        request: &RespondRequest,
    ) -> Result<RespondResponse, RemoteError> {
        let builder = self
            .request(Method::POST, &format!("/invitations/{invitation_id}/respond"))
            .json(request);
        self.send_json(builder).await
    }

    async fn cancel(&self, invitation_id: &str) -> Result<Invitation, RemoteError> {
        let builder = self.request(Method::DELETE, &format!("/invitations/{invitation_id}"));
        let envelope: InvitationEnvelope = self.send_json(builder).await?;
        Ok(envelope.invitation)
    }

    async fn resend(&self, invitation_id: &str) -> Result<Invitation, RemoteError> {
        let builder = self.request(Method::POST, &format!("/invitations/{invitation_id}/resend"));
        let envelope: InvitationEnvelope = self.send_json(builder).await?;
        Ok(envelope.invitation)
    }
}

/// Walks every page of a listing endpoint
pub async fn fetch_all<F, Fut>(mut fetch_page: F) -> Result<Vec<Invitation>, RemoteError>
where
    F: FnMut(usize, usize) -> Fut,
    Fut: std::future::Future<Output = Result<InvitationPage, RemoteError>>,
{
    let mut invitations: Vec<Invitation> = Vec::new();
    let mut seen = HashSet::new();
    let mut page = 1;
    loop {
        let batch = fetch_page(page, DEFAULT_PAGE_SIZE).await?;
        let received = batch.invitations.len();
        let before = invitations.len();
        invitations.extend(
            batch
                .invitations
                .into_iter()
                .filter(|invitation| seen.insert(invitation.id.clone())),
        );
        if received == 0 || invitations.len() >= batch.total {
            return Ok(invitations);
        }
        if invitations.len() == before {
            // server ignored `page`; nothing new will come
            warn!(page, total = batch.total, "page repeated earlier results; stopping");
            return Ok(invitations);
        }
        page += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::invitation::fixtures::pending;

    #[tokio::test]
    async fn fetch_all_follows_pages_until_total() {
        let all: Vec<_> = (0..5).map(|i| pending(&format!("inv-{i}"), "doc@y.com")).collect();
        let source = all.clone();
        let fetched = fetch_all(|page, _limit| {
            let chunk: Vec<_> = source.iter().skip((page - 1) * 2).take(2).cloned().collect();
            async move {
                Ok(InvitationPage {
                    invitations: chunk,
                    total: 5,
                    page,
                    limit: 2,
                })
            }
        })
        .await
        .unwrap();
        assert_eq!(fetched, all);
    }

    #[tokio::test]
    async fn fetch_all_stops_when_pages_repeat() {
        let first_page: Vec<_> = (0..2)
            .map(|i| pending(&format!("inv-{i}"), "doc@y.com"))
            .collect();
        let mut calls = 0;
        let fetched = fetch_all(|page, limit| {
            calls += 1;
            let invitations = first_page.clone();
            async move {
                Ok(InvitationPage {
                    invitations,
                    total: 10,
                    page,
                    limit,
                })
            }
        })
        .await
        .unwrap();
        assert_eq!(fetched, first_page);
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn fetch_all_stops_on_an_empty_page() {
        let fetched = fetch_all(|page, limit| async move {
            Ok(InvitationPage {
                invitations: vec![],
                total: 10,
                page,
                limit,
            })
        })
        .await
        .unwrap();
        assert!(fetched.is_empty());
    }
}
