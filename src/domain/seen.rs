use chrono::DateTime;
use chrono::Utc;

/// Per-(user, ticket) last-viewed timestamp, supplemented from
/// `original_source/tickets.py`'s `TicketSeen`/`mark_seen`. Lets a caller
/// compute "has unread activity" without building a full read-receipt
/// system.
#[derive(Debug, Clone)]
pub struct TicketSeen {
    pub id: i64,
    pub user_id: i64,
    pub ticket_id: i64,
    pub last_view: DateTime<Utc>,
}
