//! Access resolver (`spec.md` §4.2). Pure function over already-loaded rows —
//! callers are responsible for fetching `tracker`/`user_access`/`ticket` via
//! `crate::repo` before calling in, mirroring `get_access`/`get_ticket` in
//! `original_source/access.py` but without the implicit current-user lookup
//! (the engine never reaches for an ambient session).

use crate::domain::AccessSet;
use crate::domain::Tracker;
use crate::domain::User;
use crate::domain::UserAccess;
use crate::domain::Visibility;

/// Resolves a viewer's capability set against a tracker, per the six-step
/// order in §4.2. `user_access` is the viewer's `UserAccess` row for this
/// tracker, if one was found by the caller.
pub fn resolve_tracker_access(
    tracker: &Tracker,
    viewer: Option<&User>,
    user_access: Option<&UserAccess>,
) -> AccessSet {
    let Some(viewer) = viewer else {
        return match tracker.visibility {
            Visibility::Private => AccessSet::NONE,
            _ => tracker.default_access,
        };
    };

    if viewer.id == tracker.owner_id {
        return AccessSet::all();
    }

    if let Some(user_access) = user_access {
        return user_access.permissions;
    }

    match tracker.visibility {
        Visibility::Private => AccessSet::NONE,
        _ => tracker.default_access,
    }
}

/// Applies the ticket-level override on top of a resolved tracker access:
/// the ticket's submitter always has at least `browse`.
pub fn resolve_ticket_access(
    tracker_access: AccessSet,
    viewer: Option<&User>,
    submitter_user_id: Option<i64>,
) -> AccessSet {
    match (viewer, submitter_user_id) {
        (Some(viewer), Some(submitter_id)) if viewer.id == submitter_id => {
            tracker_access | AccessSet::BROWSE
        }
        _ => tracker_access,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn tracker(owner_id: i64, visibility: Visibility, default_access: AccessSet) -> Tracker {
        Tracker {
            id: 1,
            owner_id,
            name: "bugs".into(),
            visibility,
            default_access,
            next_ticket_id: 1,
            import_in_progress: false,
            created: Utc::now(),
            updated: Utc::now(),
        }
    }

    fn user(id: i64) -> User {
        User {
            id,
            username: format!("user{id}"),
            notify_self: false,
            created: Utc::now(),
        }
    }

    #[test]
    fn anonymous_on_private_tracker_gets_none() {
        let t = tracker(1, Visibility::Private, AccessSet::all());
        assert_eq!(resolve_tracker_access(&t, None, None), AccessSet::NONE);
    }

    #[test]
    fn anonymous_on_public_tracker_gets_default() {
        let t = tracker(1, Visibility::Public, AccessSet::BROWSE);
        assert_eq!(
            resolve_tracker_access(&t, None, None),
            AccessSet::BROWSE
        );
    }

    #[test]
    fn owner_gets_all() {
        let t = tracker(1, Visibility::Private, AccessSet::NONE);
        let owner = user(1);
        assert_eq!(resolve_tracker_access(&t, Some(&owner), None), AccessSet::all());
    }

    #[test]
    fn acl_entry_overrides_default() {
        let t = tracker(1, Visibility::Public, AccessSet::BROWSE);
        let viewer = user(2);
        let ua = UserAccess {
            id: 1,
            tracker_id: t.id,
            user_id: viewer.id,
            permissions: AccessSet::BROWSE | AccessSet::TRIAGE,
            created: Utc::now(),
        };
        assert_eq!(
            resolve_tracker_access(&t, Some(&viewer), Some(&ua)),
            AccessSet::BROWSE | AccessSet::TRIAGE
        );
    }

    #[test]
    fn private_tracker_without_acl_denies_non_owner() {
        let t = tracker(1, Visibility::Private, AccessSet::all());
        let viewer = user(2);
        assert_eq!(resolve_tracker_access(&t, Some(&viewer), None), AccessSet::NONE);
    }

    #[test]
    fn submitter_always_gets_browse() {
        let viewer = user(2);
        let access = resolve_ticket_access(AccessSet::NONE, Some(&viewer), Some(2));
        assert!(access.contains(AccessSet::BROWSE));
    }

    #[test]
    fn non_submitter_unaffected() {
        let viewer = user(3);
        let access = resolve_ticket_access(AccessSet::NONE, Some(&viewer), Some(2));
        assert_eq!(access, AccessSet::NONE);
    }
}
