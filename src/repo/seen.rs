//! `mark_seen`/`get_last_seen_times` (`original_source/tickets.py`).

use std::collections::HashMap;

use chrono::DateTime;
use chrono::Utc;
use sqlx::PgPool;

use crate::domain::TicketSeen;
use crate::error::CoreError;

#[tracing::instrument(skip(pool))]
pub async fn mark_seen(pool: &PgPool, user_id: i64, ticket_id: i64) -> Result<TicketSeen, CoreError> {
    let r = sqlx::query!(
        r#"
        INSERT INTO ticket_seen (user_id, ticket_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id, ticket_id) DO UPDATE SET last_view = now()
        RETURNING id, user_id, ticket_id, last_view
        "#,
        user_id,
        ticket_id,
    )
    .fetch_one(pool)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("marking ticket seen")))?;

    Ok(TicketSeen {
        id: r.id,
        user_id: r.user_id,
        ticket_id: r.ticket_id,
        last_view: r.last_view,
    })
}

/// Last-viewed timestamp per ticket id, for the given user, restricted to
/// `ticket_ids`.
#[tracing::instrument(skip(pool, ticket_ids))]
pub async fn last_seen_times(
    pool: &PgPool,
    user_id: i64,
    ticket_ids: &[i64],
) -> Result<HashMap<i64, DateTime<Utc>>, CoreError> {
    let rows = sqlx::query!(
        r#"
        SELECT ticket_id, last_view
        FROM ticket_seen
        WHERE user_id = $1 AND ticket_id = ANY($2)
        "#,
        user_id,
        ticket_ids,
    )
    .fetch_all(pool)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("fetching last seen times")))?;

    Ok(rows.into_iter().map(|r| (r.ticket_id, r.last_view)).collect())
}
