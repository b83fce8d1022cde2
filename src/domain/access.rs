use chrono::DateTime;
use chrono::Utc;

/// Capability set: a subset of {browse, submit, comment, edit, triage}
/// (`spec.md` §4.2, GLOSSARY). Modeled as a plain integer bitset rather than
/// an ORM `IntFlag`-backed column, per `spec.md` §9 — the domain only ever
/// sees `AccessSet`; the integer representation lives at the repository
/// boundary (`crate::repo::tracker`, `crate::repo::access`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccessSet(i32);

impl AccessSet {
    pub const NONE: Self = Self(0);
    pub const BROWSE: Self = Self(1 << 0);
    pub const SUBMIT: Self = Self(1 << 1);
    pub const COMMENT: Self = Self(1 << 2);
    pub const EDIT: Self = Self(1 << 3);
    pub const TRIAGE: Self = Self(1 << 4);

    pub fn all() -> Self {
        Self(Self::BROWSE.0 | Self::SUBMIT.0 | Self::COMMENT.0 | Self::EDIT.0 | Self::TRIAGE.0)
    }

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
}

impl std::ops::BitOr for AccessSet {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl std::fmt::Display for AccessSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = [
            (Self::BROWSE, "browse"),
            (Self::SUBMIT, "submit"),
            (Self::COMMENT, "comment"),
            (Self::EDIT, "edit"),
            (Self::TRIAGE, "triage"),
        ];
        let parts: Vec<&str> = names
            .into_iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| name)
            .collect();
        write!(f, "{}", parts.join("|"))
    }
}

/// Per-(user, tracker) capability override. Precedes the tracker's
/// `default_access` in resolution order (`spec.md` §4.2).
#[derive(Debug, Clone)]
pub struct UserAccess {
    pub id: i64,
    pub tracker_id: i64,
    pub user_id: i64,
    pub permissions: AccessSet,
    pub created: DateTime<Utc>,
}
