use tracing::debug;

use crate::errors::{DomainError, Field, RemoteError, TransportFailure};

/// Folds a remote failure into the closed domain taxonomy.
///
/// Rules are tried in a fixed order and the first match wins: passthrough,
/// transport causes, backend message patterns, then `Unknown`. Ambiguous
/// backend messages (say, "invalid email already exists") resolve by that
/// order, so it must not change.
pub fn translate(err: RemoteError) -> DomainError {
    let translated = match err {
        RemoteError::Domain(domain) => domain,
        RemoteError::Transport(failure) => match failure {
            TransportFailure::NoConnectivity => DomainError::NetworkUnavailable,
            TransportFailure::Timeout => DomainError::RequestTimeout,
            TransportFailure::HostUnreachable => DomainError::ServerUnavailable,
            TransportFailure::Other(description) => match_message(&description)
                .unwrap_or(DomainError::Unknown(description)),
        },
        RemoteError::Backend {
            status: Some(502..=504),
            ..
        } => DomainError::ServerUnavailable,
        RemoteError::Backend { message, .. } => {
            match_message(&message).unwrap_or(DomainError::Unknown(message))
        }
        RemoteError::Decode(description) => {
            match_message(&description).unwrap_or(DomainError::Unknown(description))
        }
    };
    debug!(kind = %translated.kind(), "translated remote error");
    translated
}

fn match_message(message: &str) -> Option<DomainError> {
    let message = message.to_lowercase();
    let has = |needle: &str| message.contains(needle);

    if has("email") && has("invalid") {
        return Some(DomainError::validation(
            Field::Email,
            "the server rejected the email address",
        ));
    }
    if has("already exists") || has("duplicate") {
        return Some(DomainError::InvitationAlreadyExists);
    }
    if has("expired") {
        return Some(DomainError::InvitationExpired);
    }
    if has("not found") {
        if has("professional") {
            return Some(DomainError::ProfessionalNotFound);
        }
        if has("patient") {
            return Some(DomainError::PatientNotFound);
        }
    }
    if has("unauthorized") || has("permission") {
        return Some(DomainError::InsufficientPermissions);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    fn backend(message: &str) -> ErrorKind {
        translate(RemoteError::backend(Some(400), message)).kind()
    }

    #[test]
    fn domain_errors_pass_through() {
        let err = translate(DomainError::CannotCancelInvitation.into());
        assert_eq!(err, DomainError::CannotCancelInvitation);
    }

    #[test]
    fn transport_causes_map_to_connectivity_errors() {
        assert_eq!(
            translate(TransportFailure::NoConnectivity.into()),
            DomainError::NetworkUnavailable
        );
        assert_eq!(
            translate(TransportFailure::Timeout.into()),
            DomainError::RequestTimeout
        );
        assert_eq!(
            translate(TransportFailure::HostUnreachable.into()),
            DomainError::ServerUnavailable
        );
        assert_eq!(
            translate(RemoteError::backend(Some(503), "invitation expired")),
            DomainError::ServerUnavailable
        );
    }

    #[test]
    fn backend_messages_match_case_insensitively() {
        assert_eq!(backend("Email is INVALID"), ErrorKind::ValidationError);
        assert_eq!(backend("Invitation already exists"), ErrorKind::InvitationAlreadyExists);
        assert_eq!(backend("DUPLICATE key"), ErrorKind::InvitationAlreadyExists);
        assert_eq!(backend("Invitation has Expired"), ErrorKind::InvitationExpired);
        assert_eq!(backend("Professional not found"), ErrorKind::ProfessionalNotFound);
        assert_eq!(backend("Patient NOT FOUND"), ErrorKind::PatientNotFound);
        assert_eq!(backend("Unauthorized"), ErrorKind::InsufficientPermissions);
        assert_eq!(backend("missing permission"), ErrorKind::InsufficientPermissions);
    }

    #[test]
    fn ambiguous_messages_follow_priority_order() {
        // email+invalid beats duplicate
        assert_eq!(
            backend("invalid email: duplicate entry"),
            ErrorKind::ValidationError
        );
        // duplicate beats expired
        assert_eq!(
            backend("duplicate of an expired invitation"),
            ErrorKind::InvitationAlreadyExists
        );
        // expired beats not found
        assert_eq!(
            backend("patient not found or invitation expired"),
            ErrorKind::InvitationExpired
        );
        // professional is checked before patient
        assert_eq!(
            backend("patient's professional not found"),
            ErrorKind::ProfessionalNotFound
        );
        // not found beats permission
        assert_eq!(
            backend("patient not found (permission check skipped)"),
            ErrorKind::PatientNotFound
        );
    }

    #[test]
    fn unmatched_messages_fall_back_to_unknown() {
        let err = translate(RemoteError::backend(Some(500), "kaboom"));
        assert_eq!(err, DomainError::Unknown("kaboom".into()));
        assert_eq!(backend("invitation not found"), ErrorKind::UnknownError);
        assert_eq!(
            translate(TransportFailure::Other("socket hang up".into()).into()).kind(),
            ErrorKind::UnknownError
        );
        assert_eq!(
            translate(TransportFailure::Other("permission denied".into()).into()).kind(),
            ErrorKind::InsufficientPermissions
        );
    }
}
