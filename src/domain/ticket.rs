use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use unicode_segmentation::UnicodeSegmentation;

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Reported,
    Confirmed,
    InProgress,
    Pending,
    Resolved,
}

impl TicketStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reported => "reported",
            Self::Confirmed => "confirmed",
            Self::InProgress => "in_progress",
            Self::Pending => "pending",
            Self::Resolved => "resolved",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "reported" => Some(Self::Reported),
            "confirmed" => Some(Self::Confirmed),
            "in_progress" => Some(Self::InProgress),
            "pending" => Some(Self::Pending),
            "resolved" => Some(Self::Resolved),
            _ => None,
        }
    }

    pub fn is_open(self) -> bool {
        !matches!(self, Self::Resolved)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketResolution {
    Unresolved,
    Fixed,
    Implemented,
    WontFix,
    ByDesign,
    Invalid,
    Duplicate,
    NotOurBug,
    Closed,
}

impl TicketResolution {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unresolved => "unresolved",
            Self::Fixed => "fixed",
            Self::Implemented => "implemented",
            Self::WontFix => "wont_fix",
            Self::ByDesign => "by_design",
            Self::Invalid => "invalid",
            Self::Duplicate => "duplicate",
            Self::NotOurBug => "not_our_bug",
            Self::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "unresolved" => Some(Self::Unresolved),
            "fixed" => Some(Self::Fixed),
            "implemented" => Some(Self::Implemented),
            "wont_fix" => Some(Self::WontFix),
            "by_design" => Some(Self::ByDesign),
            "invalid" => Some(Self::Invalid),
            "duplicate" => Some(Self::Duplicate),
            "not_our_bug" => Some(Self::NotOurBug),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

/// Provenance of a ticket or comment's content (`spec.md` §3, §9). Unlike
/// the IntFlag-backed original, this is a closed enum — content is never
/// simultaneously "tampered" and "unauthenticated".
///
/// `EditedByOther` resolves the §9 redesign flag: the original conflates an
/// in-place edit by a different local user (e.g. a triager correcting a
/// typo) with a failed import signature check by using the same `tampered`
/// state for both. Here, lifecycle edits use `EditedByOther`; `Tampered` is
/// reserved for import signature verification failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketAuthenticity {
    Authentic,
    Unauthenticated,
    Tampered,
    EditedByOther,
}

impl TicketAuthenticity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Authentic => "authentic",
            Self::Unauthenticated => "unauthenticated",
            Self::Tampered => "tampered",
            Self::EditedByOther => "edited_by_other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "authentic" => Some(Self::Authentic),
            "unauthenticated" => Some(Self::Unauthenticated),
            "tampered" => Some(Self::Tampered),
            "edited_by_other" => Some(Self::EditedByOther),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Ticket {
    pub id: i64,
    pub tracker_id: i64,
    /// Per-tracker sequence number shown to users (`spec.md` §3, §4.4).
    pub scoped_id: i64,
    pub submitter_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: TicketStatus,
    pub resolution: TicketResolution,
    pub authenticity: TicketAuthenticity,
    pub comment_count: i64,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Ticket {
    /// `trackername#scoped_id` form used in mentions and URLs.
    pub fn reference(&self, tracker_name: &str) -> String {
        format!("{tracker_name}#{}", self.scoped_id)
    }
}

pub fn validate_title(title: &str) -> Result<(), CoreError> {
    let len = title.graphemes(true).count();
    if !(3..=2048).contains(&len) {
        return Err(CoreError::validation(
            "title",
            "Ticket title must be 3-2048 characters",
        ));
    }
    Ok(())
}

pub fn validate_description(description: &str) -> Result<(), CoreError> {
    if description.graphemes(true).count() > 16384 {
        return Err(CoreError::validation(
            "description",
            "Ticket description must be at most 16384 characters",
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
    fn title_length_bounds() {
        assert_err!(validate_title("ab"));
        assert_ok!(validate_title("abc"));
        assert_ok!(validate_title(&"a".repeat(2048)));
        assert_err!(validate_title(&"a".repeat(2049)));
    }

    #[test]
    fn description_length_bound() {
        assert_ok!(validate_description(&"a".repeat(16384)));
        assert_err!(validate_description(&"a".repeat(16385)));
    }

    #[test]
    fn status_round_trips() {
        for s in [
            TicketStatus::Reported,
            TicketStatus::Confirmed,
            TicketStatus::InProgress,
            TicketStatus::Pending,
            TicketStatus::Resolved,
        ] {
            assert_eq!(TicketStatus::parse(s.as_str()), Some(s));
        }
    }
}
