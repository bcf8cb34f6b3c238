// utils/invitation_validator.rs

use once_cell::sync::Lazy;
use regex::Regex;
use validator::{validate_email, Validate};

use crate::{
    errors::{DomainError, Field, Result},
    models::{CreateInvitationRequest, Inviter, NewInvitation},
};

pub const NAME_MIN_CHARS: usize = 2;
pub const NAME_MAX_CHARS: usize = 100;
pub const MESSAGE_MAX_CHARS: usize = 1000;

/// Terms rejected in invitation messages when no denylist is configured
pub const DEFAULT_DENYLIST: &[&str] = &["idiot", "stupid", "scam", "fraud", "moron"];

static NAME_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\p{L} '\-]+$").unwrap());

/// Checks invitation input before anything is sent to the remote API
#[derive(Debug, Clone)]
pub struct InvitationValidator {
    denylist: Vec<String>,
}

impl Default for InvitationValidator {
    fn default() -> Self {
        Self::new(DEFAULT_DENYLIST.iter().copied())
    }
}

impl InvitationValidator {
    /// Creates a validator with a custom denylist; terms match case-insensitively
    pub fn new<I, S>(denylist: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let denylist = denylist
            .into_iter()
            .map(|term| term.as_ref().trim().to_lowercase())
            .filter(|term| !term.is_empty())
            .collect();
        Self { denylist }
    }

    /// Validates a new invitation and returns the normalized request body.
    ///
    /// Checks run in a fixed order: invitee email, self-invite, name,
    /// message length, message content, then the inviter snapshot.
    pub fn validate_create_input(
        &self,
        input: &NewInvitation,
        inviter: &Inviter,
    ) -> Result<CreateInvitationRequest> {
        let to_email = Self::normalize_email(&input.email)?;

        if inviter.email.trim().to_lowercase() == to_email {
            return Err(DomainError::CannotInviteSelf);
        }

        // a name that is given must be valid, even if blank
        let to_name = input
            .name
            .as_deref()
            .map(Self::validate_name)
            .transpose()?;

        let message = non_blank(input.message.as_deref())
            .map(|message| self.validate_message(message))
            .transpose()?;

        Self::validate_inviter(inviter)?;

        Ok(CreateInvitationRequest {
            to_email,
            to_name,
            patient_name: inviter.name.trim().to_string(),
            patient_email: inviter.email.trim().to_lowercase(),
            message,
        })
    }

    /// Returns the trimmed, lower-cased address
    pub fn normalize_email(email: &str) -> Result<String> {
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return Err(DomainError::validation(Field::Email, "email is required"));
        }
        if !validate_email(email.as_str()) {
            return Err(DomainError::validation(
                Field::Email,
                "email address is not valid",
            ));
        }
        Ok(email)
    }

    pub fn validate_name(name: &str) -> Result<String> {
        let name = name.trim();
        let length = name.chars().count();
        if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&length) {
            return Err(DomainError::validation(
                Field::Name,
                format!("name must be between {NAME_MIN_CHARS} and {NAME_MAX_CHARS} characters"),
            ));
        }
        if !NAME_REGEX.is_match(name) {
            return Err(DomainError::validation(
                Field::Name,
                "name may only contain letters, spaces, hyphens and apostrophes",
            ));
        }
        Ok(name.to_string())
    }

    pub fn validate_message(&self, message: &str) -> Result<String> {
        if message.chars().count() > MESSAGE_MAX_CHARS {
            return Err(DomainError::validation(
                Field::Message,
                format!("message must be at most {MESSAGE_MAX_CHARS} characters"),
            ));
        }
        if self.contains_denied_term(message) {
            return Err(DomainError::InappropriateContent);
        }
        Ok(message.to_string())
    }

    pub fn contains_denied_term(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.denylist.iter().any(|term| text.contains(term.as_str()))
    }

    fn validate_inviter(inviter: &Inviter) -> Result<()> {
        if inviter.name.trim().is_empty() {
            return Err(DomainError::validation(
                Field::InviterName,
                "inviter name is required",
            ));
        }
        let trimmed = Inviter {
            email: inviter.email.trim().to_string(),
            name: inviter.name.trim().to_string(),
            ..inviter.clone()
        };
        trimmed.validate().map_err(|errors| {
            let field = if errors.field_errors().contains_key("email") {
                Field::InviterEmail
            } else {
                Field::InviterName
            };
            DomainError::validation(field, format!("inviter is invalid: {errors}").replace('\n', ", "))
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
