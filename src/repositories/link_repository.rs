// repositories/link_repository.rs

use async_trait::async_trait;
use reqwest::Method;

use crate::{
    errors::RemoteError,
    models::{Link, LinkEnvelope, LinkList, Money, UnlinkRequest, UpdateFeeRequest},
};

use super::api_client::ApiClient;

/// Remote patient–professional link endpoints
#[async_trait]
pub trait LinkApi: Send + Sync {
    async fn list_links(&self) -> Result<Vec<Link>, RemoteError>;

    async fn update_fee(&self, link_id: &str, monthly_fee: Money) -> Result<Link, RemoteError>;

    async fn unlink(&self, link_id: &str, reason: Option<String>) -> Result<(), RemoteError>;
}

#[async_trait]
impl LinkApi for ApiClient {
    async fn list_links(&self) -> Result<Vec<Link>, RemoteError> {
        let list: LinkList = self
            .send_json(self.request(Method::GET, "/patient-links"))
            .await?;
        Ok(list.links)
    }

    async fn update_fee(&self, link_id: &str, monthly_fee: Money) -> Result<Link, RemoteError> {
        let builder = self
            .request(Method::PUT, &format!("/patient-links/{link_id}"))
            .json(&UpdateFeeRequest { monthly_fee });
        let envelope: LinkEnvelope = self.send_json(builder).await?;
        Ok(envelope.link)
    }

    async fn unlink(&self, link_id: &str, reason: Option<String>) -> Result<(), RemoteError> {
        let builder = self
            .request(Method::POST, &format!("/patient-links/{link_id}/unlink"))
            .json(&UnlinkRequest { reason });
        self.send_empty(builder).await
    }
}
