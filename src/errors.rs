// errors.rs

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Input field a validation failure refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Email,
    Name,
    Message,
    InviterName,
    InviterEmail,
    MonthlyFee,
}

impl Field {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Field::Email => "email",
            Field::Name => "name",
            Field::Message => "message",
            Field::InviterName => "inviterName",
            Field::InviterEmail => "inviterEmail",
            Field::MonthlyFee => "monthlyFee",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every error a lifecycle operation can surface to its caller.
///
/// The set is closed: transport and backend failures are folded into it by
/// the error translator before they leave the service layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid {field}: {reason}")]
    Validation { field: Field, reason: String },

    #[error("An invitation to this professional is already pending")]
    InvitationAlreadyExists,

    #[error("This invitation has expired or is no longer pending")]
    InvitationExpired,

    #[error("Only pending invitations can be cancelled")]
    CannotCancelInvitation,

    #[error("Only pending, unexpired invitations can be resent")]
    CannotResendInvitation,

    #[error("Professional not found")]
    ProfessionalNotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("An active link between this patient and professional already exists")]
    LinkAlreadyExists,

    #[error("Link not found")]
    LinkNotFound,

    #[error("You do not have permission to perform this action")]
    InsufficientPermissions,

    #[error("The message contains inappropriate content")]
    InappropriateContent,

    #[error("You cannot invite yourself")]
    CannotInviteSelf,

    #[error("No network connection")]
    NetworkUnavailable,

    #[error("The request timed out")]
    RequestTimeout,

    #[error("The server is unavailable")]
    ServerUnavailable,

    #[error("Unexpected error: {0}")]
    Unknown(String),
}

/// Machine-readable discriminant of a [`DomainError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationError,
    InvitationAlreadyExists,
    InvitationExpired,
    CannotCancelInvitation,
    CannotResendInvitation,
    ProfessionalNotFound,
    PatientNotFound,
    LinkAlreadyExists,
    LinkNotFound,
    InsufficientPermissions,
    InappropriateContent,
    CannotInviteSelf,
    NetworkUnavailable,
    RequestTimeout,
    ServerUnavailable,
    UnknownError,
}

impl ErrorKind {
    pub const fn code(&self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::InvitationAlreadyExists => "invitation_already_exists",
            ErrorKind::InvitationExpired => "invitation_expired",
            ErrorKind::CannotCancelInvitation => "cannot_cancel_invitation",
            ErrorKind::CannotResendInvitation => "cannot_resend_invitation",
            ErrorKind::ProfessionalNotFound => "professional_not_found",
            ErrorKind::PatientNotFound => "patient_not_found",
            ErrorKind::LinkAlreadyExists => "link_already_exists",
            ErrorKind::LinkNotFound => "link_not_found",
            ErrorKind::InsufficientPermissions => "insufficient_permissions",
            ErrorKind::InappropriateContent => "inappropriate_content",
            ErrorKind::CannotInviteSelf => "cannot_invite_self",
            ErrorKind::NetworkUnavailable => "network_unavailable",
            ErrorKind::RequestTimeout => "request_timeout",
            ErrorKind::ServerUnavailable => "server_unavailable",
            ErrorKind::UnknownError => "unknown_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl DomainError {
    pub fn validation(field: Field, reason: impl Into<String>) -> Self {
        DomainError::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Validation { .. } => ErrorKind::ValidationError,
            DomainError::InvitationAlreadyExists => ErrorKind::InvitationAlreadyExists,
            DomainError::InvitationExpired => ErrorKind::InvitationExpired,
            DomainError::CannotCancelInvitation => ErrorKind::CannotCancelInvitation,
            DomainError::CannotResendInvitation => ErrorKind::CannotResendInvitation,
            DomainError::ProfessionalNotFound => ErrorKind::ProfessionalNotFound,
            DomainError::PatientNotFound => ErrorKind::PatientNotFound,
            DomainError::LinkAlreadyExists => ErrorKind::LinkAlreadyExists,
            DomainError::LinkNotFound => ErrorKind::LinkNotFound,
            DomainError::InsufficientPermissions => ErrorKind::InsufficientPermissions,
            DomainError::InappropriateContent => ErrorKind::InappropriateContent,
            DomainError::CannotInviteSelf => ErrorKind::CannotInviteSelf,
            DomainError::NetworkUnavailable => ErrorKind::NetworkUnavailable,
            DomainError::RequestTimeout => ErrorKind::RequestTimeout,
            DomainError::ServerUnavailable => ErrorKind::ServerUnavailable,
            DomainError::Unknown(_) => ErrorKind::UnknownError,
        }
    }

    /// The offending field, for validation failures only
    pub fn field(&self) -> Option<Field> {
        match self {
            DomainError::Validation { field, .. } => Some(*field),
            _ => None,
        }
    }
}

pub type Result<T> = core::result::Result<T, DomainError>;

/// Transport-level causes the remote client can recognise
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportFailure {
    #[error("no network connectivity")]
    NoConnectivity,
    #[error("request timed out")]
    Timeout,
    #[error("host unreachable")]
    HostUnreachable,
    #[error("{0}")]
    Other(String),
}

/// Raw failure produced by the remote API adapters, before translation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportFailure),

    #[error("backend error ({}): {}", status_label(.status), .message)]
    Backend {
        status: Option<u16>,
        message: String,
    },

    #[error("malformed response: {0}")]
    Decode(String),
}

impl RemoteError {
    pub fn backend(status: Option<u16>, message: impl Into<String>) -> Self {
        RemoteError::Backend {
            status,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return TransportFailure::Timeout.into();
        }
        if err.is_decode() {
            return RemoteError::Decode(err.to_string());
        }
        if err.is_connect() {
            let chain = error_chain(&err).to_lowercase();
            if chain.contains("dns")
                || chain.contains("network is unreachable")
                || chain.contains("no route to host")
            {
                return TransportFailure::NoConnectivity.into();
            }
            return TransportFailure::HostUnreachable.into();
        }
        if let Some(status) = err.status() {
            return RemoteError::backend(Some(status.as_u16()), err.to_string());
        }
        TransportFailure::Other(error_chain(&err)).into()
    }
}

fn status_label(status: &Option<u16>) -> String {
    status.map_or_else(|| "-".to_string(), |s| s.to_string())
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut description = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        description.push_str(": ");
        description.push_str(&cause.to_string());
        source = cause.source();
    }
    description
}
