use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{link::Link, money::Money};

/// How long an invitation stays answerable after creation
pub const INVITATION_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
    Expired,
}

impl InvitationStatus {
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, InvitationStatus::Pending)
    }

    /// Statuses only ever move out of `Pending`, and only once.
    pub fn can_transition_to(&self, next: InvitationStatus) -> bool {
        *self == next || (*self == InvitationStatus::Pending && next.is_terminal())
    }
}

impl fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                InvitationStatus::Pending => "pending",
                InvitationStatus::Accepted => "accepted",
                InvitationStatus::Rejected => "rejected",
                InvitationStatus::Cancelled => "cancelled",
                InvitationStatus::Expired => "expired",
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    pub id: String,
    pub from_patient_id: String,
    pub from_patient_name: String,
    pub from_patient_email: String,
    pub to_professional_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_professional_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub invitation_code: String,
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<DateTime<Utc>>,
}

impl Invitation {
    pub fn expiry_for(created_at: DateTime<Utc>) -> DateTime<Utc> {
        created_at + Duration::days(INVITATION_TTL_DAYS)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_pending(&self) -> bool {
        self.status == InvitationStatus::Pending
    }

    /// Pending and not yet past its expiry at `now`
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.is_pending() && !self.is_expired_at(now)
    }

    /// Status as a user should see it: a pending invitation past its expiry
    /// reads as expired even though nobody stored that.
    pub fn effective_status(&self, now: DateTime<Utc>) -> InvitationStatus {
        if self.is_pending() && self.is_expired_at(now) {
            InvitationStatus::Expired
        } else {
            self.status
        }
    }

    pub fn is_addressed_to(&self, email: &str) -> bool {
        self.to_professional_email.eq_ignore_ascii_case(email.trim())
    }
}

/// Snapshot of the patient sending an invitation
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct Inviter {
    pub id: String,
    #[validate(length(min = 1, message = "Inviter name is required"))]
    pub name: String,
    #[validate(email(message = "Inviter email is invalid"))]
    pub email: String,
}

/// Raw input for a new invitation, as typed by the patient
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewInvitation {
    pub email: String,
    pub name: Option<String>,
    pub message: Option<String>,
    /// Sent as `Idempotency-Key`. Pass the same key when retrying a create
    /// whose outcome is unknown; a fresh one is generated when absent.
    pub idempotency_key: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvitationRequest {
    pub to_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_name: Option<String>,
    pub patient_name: String,
    pub patient_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RespondAction {
    Accept,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondRequest {
    pub action: RespondAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_fee: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RespondRequest {
    pub fn accept(monthly_fee: Money) -> Self {
        Self {
            action: RespondAction::Accept,
            monthly_fee: Some(monthly_fee),
            reason: None,
        }
    }

    pub fn reject(reason: Option<String>) -> Self {
        Self {
            action: RespondAction::Reject,
            monthly_fee: None,
            reason,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationEnvelope {
    pub invitation: Invitation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RespondResponse {
    pub invitation: Invitation,
    #[serde(default)]
    pub link: Option<Link>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationPage {
    pub invitations: Vec<Invitation>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}
