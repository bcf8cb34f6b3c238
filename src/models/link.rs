use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Active,
    Inactive,
}

/// Billed relationship between a patient and a professional
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub id: String,
    pub patient_id: String,
    pub professional_id: String,
    pub monthly_fee: Money,
    pub status: LinkStatus,
    pub total_paid: Money,
    pub created_at: DateTime<Utc>,
}

impl Link {
    pub fn is_active(&self) -> bool {
        self.status == LinkStatus::Active
    }

    pub fn connects(&self, patient_id: &str, professional_id: &str) -> bool {
        self.patient_id == patient_id && self.professional_id == professional_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFeeRequest {
    pub monthly_fee: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlinkRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEnvelope {
    pub link: Link,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkList {
    pub links: Vec<Link>,
}
