use chrono::DateTime;
use chrono::Utc;

use super::AccessSet;
use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Unlisted,
    Private,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Unlisted => "unlisted",
            Self::Private => "private",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "public" => Some(Self::Public),
            "unlisted" => Some(Self::Unlisted),
            "private" => Some(Self::Private),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Tracker {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub visibility: Visibility,
    pub default_access: AccessSet,
    pub next_ticket_id: i64,
    /// Masks partial state during bulk import (§3, §4.7).
    pub import_in_progress: bool,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

const RESERVED_NAMES: [&str; 3] = [".", "..", ".git"];

/// Validates a tracker name against `spec.md` §3: `[A-Za-z0-9._-]+`, not
/// `.`/`..`/`.git`/`.hg`, 1–255 chars.
pub fn validate_tracker_name(name: &str) -> Result<(), CoreError> {
    if name.is_empty() || name.chars().count() > 255 {
        return Err(CoreError::validation(
            "name",
            "Tracker name must be 1-255 characters",
        ));
    }
    let allowed = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');
    if !allowed {
        return Err(CoreError::validation(
            "name",
            "Tracker name may only contain letters, digits, '.', '_', '-'",
        ));
    }
    if RESERVED_NAMES.contains(&name) || name == ".hg" {
        return Err(CoreError::validation(
            "name",
            format!("{name:?} is a reserved tracker name"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use claims::assert_err;
    use claims::assert_ok;

    use super::*;

    #[test]
    fn accepts_ordinary_names() {
        assert_ok!(validate_tracker_name("bugs"));
        assert_ok!(validate_tracker_name("my-tracker_v2.1"));
    }

    #[test]
    fn rejects_reserved_names() {
        assert_err!(validate_tracker_name("."));
        assert_err!(validate_tracker_name(".."));
        assert_err!(validate_tracker_name(".git"));
        assert_err!(validate_tracker_name(".hg"));
    }

    #[test]
    fn rejects_bad_characters_and_length() {
        assert_err!(validate_tracker_name(""));
        assert_err!(validate_tracker_name("has space"));
        assert_err!(validate_tracker_name(&"a".repeat(256)));
        assert_ok!(validate_tracker_name(&"a".repeat(255)));
    }
}
