use chrono::DateTime;
use chrono::Utc;

/// A subscription is scoped to exactly one of a tracker or a ticket
/// (`spec.md` §3, mirroring `original_source/types/ticketsubscription.py`'s
/// one-of `ticket`/`tracker` columns).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionScope {
    Tracker(i64),
    Ticket(i64),
}

#[derive(Debug, Clone)]
pub struct TicketSubscription {
    pub id: i64,
    pub participant_id: i64,
    pub scope: SubscriptionScope,
    pub created: DateTime<Utc>,
}
