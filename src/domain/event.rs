use chrono::DateTime;
use chrono::Utc;

use super::TicketResolution;
use super::TicketStatus;

/// Kinds of activity an `Event` can represent, combinable because a single
/// `add_comment` call can both post a comment and change status in the same
/// event row (`spec.md` §3/§4.4, mirroring `original_source/types/event.py`'s
/// `EventType(IntFlag)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventTypeSet(i32);

impl EventTypeSet {
    pub const NONE: Self = Self(0);
    pub const CREATED: Self = Self(1 << 0);
    pub const COMMENT: Self = Self(1 << 1);
    pub const STATUS_CHANGE: Self = Self(1 << 2);
    pub const LABEL_ADDED: Self = Self(1 << 3);
    pub const LABEL_REMOVED: Self = Self(1 << 4);
    pub const ASSIGNED_USER: Self = Self(1 << 5);
    pub const UNASSIGNED_USER: Self = Self(1 << 6);
    pub const USER_MENTIONED: Self = Self(1 << 7);
    pub const TICKET_MENTIONED: Self = Self(1 << 8);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    pub fn as_i32(self) -> i32 {
        self.0
    }

    pub fn from_i32(value: i32) -> Self {
        Self(value)
    }

    /// Names of every flag set, in declaration order — the `event_type`
    /// string array shape used by the export document (§4.7).
    pub fn flag_names(self) -> Vec<&'static str> {
        const FLAGS: &[(EventTypeSet, &str)] = &[
            (EventTypeSet::CREATED, "created"),
            (EventTypeSet::COMMENT, "comment"),
            (EventTypeSet::STATUS_CHANGE, "status_change"),
            (EventTypeSet::LABEL_ADDED, "label_added"),
            (EventTypeSet::LABEL_REMOVED, "label_removed"),
            (EventTypeSet::ASSIGNED_USER, "assigned_user"),
            (EventTypeSet::UNASSIGNED_USER, "unassigned_user"),
            (EventTypeSet::USER_MENTIONED, "user_mentioned"),
            (EventTypeSet::TICKET_MENTIONED, "ticket_mentioned"),
        ];
        FLAGS
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }

    /// Inverse of `flag_names`'s per-name mapping; unknown names are a
    /// per-item import error (§4.7, §7), never a panic.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "created" => Some(Self::CREATED),
            "comment" => Some(Self::COMMENT),
            "status_change" => Some(Self::STATUS_CHANGE),
            "label_added" => Some(Self::LABEL_ADDED),
            "label_removed" => Some(Self::LABEL_REMOVED),
            "assigned_user" => Some(Self::ASSIGNED_USER),
            "unassigned_user" => Some(Self::UNASSIGNED_USER),
            "user_mentioned" => Some(Self::USER_MENTIONED),
            "ticket_mentioned" => Some(Self::TICKET_MENTIONED),
            _ => None,
        }
    }
}

impl std::ops::BitOr for EventTypeSet {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// A single unit of activity on a ticket — the append-only audit trail that
/// also drives notification fan-out (`spec.md` §4.4/§4.5).
#[derive(Debug, Clone)]
pub struct Event {
    pub id: i64,
    pub event_type: EventTypeSet,
    pub ticket_id: i64,
    pub user_id: i64,
    pub comment_id: Option<i64>,
    pub old_status: Option<TicketStatus>,
    pub new_status: Option<TicketStatus>,
    pub old_resolution: Option<TicketResolution>,
    pub new_resolution: Option<TicketResolution>,
    pub label_id: Option<i64>,
    pub assignee_id: Option<i64>,
    /// Populated when `event_type` contains `TICKET_MENTIONED` — the ticket
    /// the mention was made *from*; `ticket_id` is the one mentioned.
    pub from_ticket_id: Option<i64>,
    pub created: DateTime<Utc>,
}

/// Join row recording that `event_id` was (or is pending being) delivered to
/// `participant_id` — the notification half of an `Event` (`spec.md` §4.5).
#[derive(Debug, Clone)]
pub struct EventNotification {
    pub id: i64,
    pub event_id: i64,
    pub participant_id: i64,
    pub created: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_combine_and_test_independently() {
        let combined = EventTypeSet::COMMENT | EventTypeSet::STATUS_CHANGE;
        assert!(combined.contains(EventTypeSet::COMMENT));
        assert!(combined.contains(EventTypeSet::STATUS_CHANGE));
        assert!(!combined.contains(EventTypeSet::LABEL_ADDED));
    }

    #[test]
    fn flag_names_round_trip_through_from_name() {
        let combined = EventTypeSet::COMMENT | EventTypeSet::STATUS_CHANGE;
        let names = combined.flag_names();
        assert_eq!(names, vec!["comment", "status_change"]);
        let rebuilt = names
            .into_iter()
            .filter_map(EventTypeSet::from_name)
            .fold(EventTypeSet::NONE, |acc, f| acc | f);
        assert_eq!(rebuilt, combined);
    }

    #[test]
    fn from_name_rejects_unknown_names() {
        assert_eq!(EventTypeSet::from_name("not_a_real_event"), None);
    }
}
