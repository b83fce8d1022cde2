use chrono::DateTime;
use chrono::Utc;

/// Records that `assignee_id` is assigned to a ticket, and who did it
/// (`spec.md` §3/§4.4 `assign`/`unassign`).
#[derive(Debug, Clone)]
pub struct TicketAssignee {
    pub id: i64,
    pub ticket_id: i64,
    pub assignee_id: i64,
    pub assigner_id: i64,
    pub created: DateTime<Utc>,
}
