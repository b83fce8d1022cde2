use sqlx::Postgres;
use sqlx::Transaction;

use crate::domain::Event;
use crate::domain::EventTypeSet;
use crate::domain::TicketResolution;
use crate::domain::TicketStatus;
use crate::error::CoreError;

/// Fields of a new `Event` row (`spec.md` §3). All optional fields default
/// to `None` via `Default`.
#[derive(Debug, Clone, Default)]
pub struct NewEvent {
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
    pub from_ticket_id: Option<i64>,
    pub created: Option<chrono::DateTime<chrono::Utc>>,
}

#[tracing::instrument(skip(tx, new))]
pub async fn insert(
    tx: &mut Transaction<'static, Postgres>,
    new: NewEvent,
) -> Result<Event, CoreError> {
    let r = sqlx::query!(
        r#"
        INSERT INTO events
            (event_type, ticket_id, user_id, comment_id, old_status, new_status,
             old_resolution, new_resolution, label_id, assignee_id, from_ticket_id, created)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, COALESCE($12, now()))
        RETURNING id, event_type, ticket_id, user_id, comment_id, old_status, new_status,
                  old_resolution, new_resolution, label_id, assignee_id, from_ticket_id, created
        "#,
        new.event_type.as_i32(),
        new.ticket_id,
        new.user_id,
        new.comment_id,
        new.old_status.map(TicketStatus::as_str),
        new.new_status.map(TicketStatus::as_str),
        new.old_resolution.map(TicketResolution::as_str),
        new.new_resolution.map(TicketResolution::as_str),
        new.label_id,
        new.assignee_id,
        new.from_ticket_id,
        new.created,
    )
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("inserting event")))?;

    Ok(Event {
        id: r.id,
        event_type: EventTypeSet::from_i32(r.event_type),
        ticket_id: r.ticket_id,
        user_id: r.user_id,
        comment_id: r.comment_id,
        old_status: r.old_status.as_deref().and_then(TicketStatus::parse),
        new_status: r.new_status.as_deref().and_then(TicketStatus::parse),
        old_resolution: r.old_resolution.as_deref().and_then(TicketResolution::parse),
        new_resolution: r.new_resolution.as_deref().and_then(TicketResolution::parse),
        label_id: r.label_id,
        assignee_id: r.assignee_id,
        from_ticket_id: r.from_ticket_id,
        created: r.created,
    })
}

/// All events for a ticket, strictly ordered by `id` (§5 ordering guarantee).
#[tracing::instrument(skip(pool))]
pub async fn fetch_for_ticket(
    pool: &sqlx::PgPool,
    ticket_id: i64,
) -> Result<Vec<Event>, CoreError> {
    let rows = sqlx::query!(
        r#"
        SELECT id, event_type, ticket_id, user_id, comment_id, old_status, new_status,
               old_resolution, new_resolution, label_id, assignee_id, from_ticket_id, created
        FROM events
        WHERE ticket_id = $1
        ORDER BY id ASC
        "#,
        ticket_id
    )
    .fetch_all(pool)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("fetching events")))?;

    Ok(rows
        .into_iter()
        .map(|r| Event {
            id: r.id,
            event_type: EventTypeSet::from_i32(r.event_type),
            ticket_id: r.ticket_id,
            user_id: r.user_id,
            comment_id: r.comment_id,
            old_status: r.old_status.as_deref().and_then(TicketStatus::parse),
            new_status: r.new_status.as_deref().and_then(TicketStatus::parse),
            old_resolution: r.old_resolution.as_deref().and_then(TicketResolution::parse),
            new_resolution: r.new_resolution.as_deref().and_then(TicketResolution::parse),
            label_id: r.label_id,
            assignee_id: r.assignee_id,
            from_ticket_id: r.from_ticket_id,
            created: r.created,
        })
        .collect())
}
