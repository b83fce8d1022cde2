use sqlx::Postgres;
use sqlx::Transaction;

use crate::domain::TicketAssignee;
use crate::error::CoreError;

#[tracing::instrument(skip(pool))]
pub async fn fetch_for_ticket(
    pool: &sqlx::PgPool,
    ticket_id: i64,
) -> Result<Vec<TicketAssignee>, CoreError> {
    sqlx::query_as!(
        TicketAssignee,
        r#"SELECT id, ticket_id, assignee_id, assigner_id, created
           FROM ticket_assignees WHERE ticket_id = $1"#,
        ticket_id
    )
    .fetch_all(pool)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("fetching assignees")))
}

/// Idempotent insert: `assign(t, u, by)` called twice yields one row (§8).
#[tracing::instrument(skip(tx))]
pub async fn assign(
    tx: &mut Transaction<'static, Postgres>,
    ticket_id: i64,
    assignee_id: i64,
    assigner_id: i64,
) -> Result<Option<TicketAssignee>, CoreError> {
    sqlx::query_as!(
        TicketAssignee,
        r#"
        INSERT INTO ticket_assignees (ticket_id, assignee_id, assigner_id)
        VALUES ($1, $2, $3)
        ON CONFLICT (ticket_id, assignee_id) DO NOTHING
        RETURNING id, ticket_id, assignee_id, assigner_id, created
        "#,
        ticket_id,
        assignee_id,
        assigner_id,
    )
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("assigning ticket")))
}

#[tracing::instrument(skip(tx))]
pub async fn unassign(
    tx: &mut Transaction<'static, Postgres>,
    ticket_id: i64,
    assignee_id: i64,
) -> Result<bool, CoreError> {
    let result = sqlx::query!(
        r#"DELETE FROM ticket_assignees WHERE ticket_id = $1 AND assignee_id = $2"#,
        ticket_id,
        assignee_id,
    )
    .execute(&mut **tx)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("unassigning ticket")))?;
    Ok(result.rows_affected() > 0)
}
