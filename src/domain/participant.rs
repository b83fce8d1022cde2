use chrono::DateTime;
use chrono::Utc;
use validator::ValidateEmail;

use super::User;
use crate::error::CoreError;

/// Discriminated union over the three kinds of actor a ticket can attribute
/// activity to (`spec.md` §3/§4.1, §9 "Participant as tagged union"). Exactly
/// one payload branch is populated; the three idempotent lookup functions in
/// `crate::repo::participant` are the only constructors — never build one
/// directly from raw fields outside that module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParticipantKind {
    User(User),
    Email { address: String, display_name: Option<String> },
    External { external_id: String, external_url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: i64,
    pub kind: ParticipantKind,
    pub created: DateTime<Utc>,
}

impl Participant {
    /// Human-friendly display name.
    pub fn name(&self) -> String {
        match &self.kind {
            ParticipantKind::User(user) => user.canonical_name(),
            ParticipantKind::Email { address, display_name } => {
                display_name.clone().unwrap_or_else(|| address.clone())
            }
            ParticipantKind::External { external_id, .. } => external_id.clone(),
        }
    }

    /// Human-friendly unique identifier (distinct from `name` for the email
    /// variant, which prefers the display name for `name` but always uses
    /// the address as the identifier).
    pub fn identifier(&self) -> String {
        match &self.kind {
            ParticipantKind::User(user) => user.canonical_name(),
            ParticipantKind::Email { address, .. } => address.clone(),
            ParticipantKind::External { external_id, .. } => external_id.clone(),
        }
    }

    pub fn as_user(&self) -> Option<&User> {
        match &self.kind {
            ParticipantKind::User(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self.kind, ParticipantKind::User(_))
    }
}

/// Validates an email-participant address before it reaches
/// `crate::repo::participant::for_email` (§4.1: unrecognized senders become
/// email participants, but malformed addresses must still be rejected).
pub fn validate_email(address: &str) -> Result<(), CoreError> {
    if !address.validate_email() {
        return Err(CoreError::validation("email", format!("{address:?} is not a valid email address")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use claims::assert_err;
    use claims::assert_ok;

    use super::*;

    #[test]
    fn accepts_ordinary_addresses() {
        assert_ok!(validate_email("dev@example.org"));
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert_err!(validate_email("not-an-email"));
    }
}
