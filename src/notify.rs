//! Subscription & notification fan-out (`spec.md` §4.5). The functions here
//! are pure over already-loaded rows — `crate::lifecycle` is responsible for
//! loading subscribers and calling `crate::dispatch` with the result, the
//! same separation the teacher draws between `issue_delivery_queue` rows and
//! `delivery::try_send_email`.

use crate::domain::Event;
use crate::domain::EventTypeSet;
use crate::domain::Participant;
use crate::domain::ParticipantKind;
use crate::domain::SubscriptionScope;
use crate::domain::TicketSubscription;

/// Subscribers of a ticket: the union of its tracker's and its own
/// subscriptions, deduplicated by participant id.
pub fn resolve_subscribers(
    tracker_subs: &[TicketSubscription],
    ticket_subs: &[TicketSubscription],
) -> Vec<i64> {
    let mut seen = std::collections::HashSet::new();
    tracker_subs
        .iter()
        .chain(ticket_subs.iter())
        .map(|s| s.participant_id)
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Decides which participants get an `EventNotification` row: only the
/// `user`-variant subscribers, per §4.5.
pub fn user_notification_targets<'a>(
    subscribers: &'a [Participant],
) -> impl Iterator<Item = &'a Participant> {
    subscribers.iter().filter(|p| p.is_user())
}

/// Whether `participant` should receive an outbound email for `event`,
/// originated by `actor`. Skips the actor unless they opted into
/// self-notification and the event wasn't sourced from an inbound email.
pub fn should_email(
    participant: &Participant,
    actor: &Participant,
    actor_notify_self: bool,
    from_email: bool,
) -> bool {
    if participant.id != actor.id {
        return true;
    }
    actor_notify_self && !from_email
}

/// Email envelope fields the core hands to the external mail subsystem
/// (§4.5). Rendering and transport happen outside the core.
#[derive(Debug, Clone)]
pub struct EmailEnvelope {
    pub from_display_name: String,
    pub from_address: String,
    pub subject: String,
    pub message_id: String,
    pub in_reply_to: Option<String>,
    pub reply_to: String,
    pub list_unsubscribe: String,
}

pub struct EnvelopeContext<'a> {
    pub posting_domain: &'a str,
    pub notify_from: &'a str,
    pub tracker_owner: &'a str,
    pub tracker_name: &'a str,
    pub scoped_id: i64,
    pub title: &'a str,
    pub is_reply: bool,
    pub subscription_scope: SubscriptionScope,
}

impl EmailEnvelope {
    pub fn build(actor_display_name: &str, ctx: &EnvelopeContext<'_>) -> Self {
        let subject = if ctx.is_reply {
            format!(
                "Re: ~{}/{}#{}: {}",
                ctx.tracker_owner, ctx.tracker_name, ctx.scoped_id, ctx.title
            )
        } else {
            format!(
                "~{}/{}#{}: {}",
                ctx.tracker_owner, ctx.tracker_name, ctx.scoped_id, ctx.title
            )
        };
        let message_id = format!(
            "<{}/{}/{}@{}>",
            ctx.tracker_owner, ctx.tracker_name, ctx.scoped_id, ctx.posting_domain
        );
        let reply_to = format!(
            "{}+{}.{}@{}",
            ctx.tracker_name, ctx.tracker_owner, ctx.scoped_id, ctx.posting_domain
        );
        let list_unsubscribe = match ctx.subscription_scope {
            SubscriptionScope::Tracker(id) => {
                format!("mailto:unsubscribe+tracker-{id}@{}", ctx.posting_domain)
            }
            SubscriptionScope::Ticket(id) => {
                format!("mailto:unsubscribe+ticket-{id}@{}", ctx.posting_domain)
            }
        };
        Self {
            from_display_name: actor_display_name.to_string(),
            from_address: ctx.notify_from.to_string(),
            subject,
            message_id,
            in_reply_to: if ctx.is_reply {
                Some(format!(
                    "<{}/{}/{}@{}>",
                    ctx.tracker_owner, ctx.tracker_name, ctx.scoped_id, ctx.posting_domain
                ))
            } else {
                None
            },
            reply_to,
            list_unsubscribe,
        }
    }
}

/// True if `event` warrants driving fan-out at all — a no-op lifecycle call
/// (§4.4 step 4) never reaches this, but import replay and defensive callers
/// benefit from the same check.
pub fn is_notifiable(event: &Event) -> bool {
    event.event_type.contains(EventTypeSet::COMMENT)
        || event.event_type.contains(EventTypeSet::STATUS_CHANGE)
        || event.event_type.contains(EventTypeSet::CREATED)
}

pub fn participant_display_name(participant: &Participant) -> String {
    match &participant.kind {
        ParticipantKind::User(user) => user.canonical_name(),
        ParticipantKind::Email { address, display_name } => {
            display_name.clone().unwrap_or_else(|| address.clone())
        }
        ParticipantKind::External { external_id, .. } => external_id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user_participant(id: i64) -> Participant {
        Participant {
            id,
            kind: ParticipantKind::User(crate::domain::User {
                id,
                username: format!("user{id}"),
                notify_self: false,
                created: Utc::now(),
            }),
            created: Utc::now(),
        }
    }

    #[test]
    fn subscribers_deduped_across_scopes() {
        let p = user_participant(1);
        let tracker_subs = vec![TicketSubscription {
            id: 1,
            participant_id: p.id,
            scope: SubscriptionScope::Tracker(1),
            created: Utc::now(),
        }];
        let ticket_subs = vec![TicketSubscription {
            id: 2,
            participant_id: p.id,
            scope: SubscriptionScope::Ticket(5),
            created: Utc::now(),
        }];
        let result = resolve_subscribers(&tracker_subs, &ticket_subs);
        assert_eq!(result, vec![1]);
    }

    #[test]
    fn actor_skipped_unless_notify_self_and_not_from_email() {
        let actor = user_participant(1);
        assert!(!should_email(&actor, &actor, false, false));
        assert!(should_email(&actor, &actor, true, false));
        assert!(!should_email(&actor, &actor, true, true));
    }

    #[test]
    fn other_participant_always_notified() {
        let actor = user_participant(1);
        let other = user_participant(2);
        assert!(should_email(&other, &actor, false, false));
    }

    #[test]
    fn reply_subject_gets_re_prefix() {
        let ctx = EnvelopeContext {
            posting_domain: "posts.example.org",
            notify_from: "notify@example.org",
            tracker_owner: "alice",
            tracker_name: "bugs",
            scoped_id: 7,
            title: "crash on launch",
            is_reply: true,
            subscription_scope: SubscriptionScope::Ticket(7),
        };
        let envelope = EmailEnvelope::build("~alice", &ctx);
        assert_eq!(envelope.subject, "Re: ~alice/bugs#7: crash on launch");
        assert!(envelope.in_reply_to.is_some());
    }

    #[test]
    fn new_event_subject_carries_tracker_owner() {
        let ctx = EnvelopeContext {
            posting_domain: "posts.example.org",
            notify_from: "notify@example.org",
            tracker_owner: "foo",
            tracker_name: "bar",
            scoped_id: 1,
            title: "I have a problem",
            is_reply: false,
            subscription_scope: SubscriptionScope::Ticket(1),
        };
        let envelope = EmailEnvelope::build("~foo", &ctx);
        assert_eq!(envelope.subject, "~foo/bar#1: I have a problem");
        assert!(envelope.in_reply_to.is_none());
    }
}
