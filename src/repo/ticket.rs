use sqlx::PgPool;
use sqlx::Postgres;
use sqlx::Transaction;

use crate::domain::Ticket;
use crate::domain::TicketAuthenticity;
use crate::domain::TicketResolution;
use crate::domain::TicketStatus;
use crate::error::CoreError;

#[allow(clippy::too_many_arguments)]
fn row_to_ticket(
    id: i64,
    tracker_id: i64,
    scoped_id: i64,
    submitter_id: i64,
    title: String,
    description: Option<String>,
    status: String,
    resolution: String,
    authenticity: String,
    comment_count: i64,
    created: chrono::DateTime<chrono::Utc>,
    updated: chrono::DateTime<chrono::Utc>,
) -> Result<Ticket, CoreError> {
    Ok(Ticket {
        id,
        tracker_id,
        scoped_id,
        submitter_id,
        title,
        description,
        status: TicketStatus::parse(&status)
            .ok_or_else(|| CoreError::Internal(anyhow::anyhow!("unknown status {status:?} in row")))?,
        resolution: TicketResolution::parse(&resolution).ok_or_else(|| {
            CoreError::Internal(anyhow::anyhow!("unknown resolution {resolution:?} in row"))
        })?,
        authenticity: TicketAuthenticity::parse(&authenticity).ok_or_else(|| {
            CoreError::Internal(anyhow::anyhow!("unknown authenticity {authenticity:?} in row"))
        })?,
        comment_count,
        created,
        updated,
    })
}

#[tracing::instrument(skip(tx))]
#[allow(clippy::too_many_arguments)]
pub async fn insert(
    tx: &mut Transaction<'static, Postgres>,
    tracker_id: i64,
    scoped_id: i64,
    submitter_id: i64,
    title: &str,
    description: Option<&str>,
    authenticity: TicketAuthenticity,
    created: Option<chrono::DateTime<chrono::Utc>>,
) -> Result<Ticket, CoreError> {
    let r = sqlx::query!(
        r#"
        INSERT INTO tickets
            (tracker_id, scoped_id, submitter_id, title, description, status,
             resolution, authenticity, comment_count, created, updated)
        VALUES
            ($1, $2, $3, $4, $5, 'reported', 'unresolved', $6, 0,
             COALESCE($7, now()), COALESCE($7, now()))
        RETURNING id, tracker_id, scoped_id, submitter_id, title, description,
                  status, resolution, authenticity, comment_count, created, updated
        "#,
        tracker_id,
        scoped_id,
        submitter_id,
        title,
        description,
        authenticity.as_str(),
        created,
    )
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| crate::error::from_sqlx_unique(e, "scoped_id"))?;

    row_to_ticket(
        r.id,
        r.tracker_id,
        r.scoped_id,
        r.submitter_id,
        r.title,
        r.description,
        r.status,
        r.resolution,
        r.authenticity,
        r.comment_count,
        r.created,
        r.updated,
    )
}

#[tracing::instrument(skip(pool))]
pub async fn fetch_by_scoped_id(
    pool: &PgPool,
    tracker_id: i64,
    scoped_id: i64,
) -> Result<Option<Ticket>, CoreError> {
    let row = sqlx::query!(
        r#"
        SELECT id, tracker_id, scoped_id, submitter_id, title, description,
               status, resolution, authenticity, comment_count, created, updated
        FROM tickets
        WHERE tracker_id = $1 AND scoped_id = $2
        "#,
        tracker_id,
        scoped_id
    )
    .fetch_optional(pool)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("fetching ticket")))?;

    row.map(|r| {
        row_to_ticket(
            r.id,
            r.tracker_id,
            r.scoped_id,
            r.submitter_id,
            r.title,
            r.description,
            r.status,
            r.resolution,
            r.authenticity,
            r.comment_count,
            r.created,
            r.updated,
        )
    })
    .transpose()
}

/// All tickets of a tracker, ordered by `scoped_id` — the order `export`
/// walks the tracker in (§4.7).
#[tracing::instrument(skip(pool))]
pub async fn fetch_for_tracker_ordered(
    pool: &PgPool,
    tracker_id: i64,
) -> Result<Vec<Ticket>, CoreError> {
    let rows = sqlx::query!(
        r#"
        SELECT id, tracker_id, scoped_id, submitter_id, title, description,
               status, resolution, authenticity, comment_count, created, updated
        FROM tickets
        WHERE tracker_id = $1
        ORDER BY scoped_id ASC
        "#,
        tracker_id
    )
    .fetch_all(pool)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("fetching tracker tickets")))?;

    rows.into_iter()
        .map(|r| {
            row_to_ticket(
                r.id,
                r.tracker_id,
                r.scoped_id,
                r.submitter_id,
                r.title,
                r.description,
                r.status,
                r.resolution,
                r.authenticity,
                r.comment_count,
                r.created,
                r.updated,
            )
        })
        .collect()
}

/// Transaction-scoped lookup by `scoped_id` — used by import replay to make
/// re-running an interrupted import a no-op per ticket (§4.7). Unlike
/// `fetch_by_scoped_id`, this sees the transaction's own uncommitted writes,
/// which matters once earlier tickets in the same dump have been inserted
/// but not yet committed.
#[tracing::instrument(skip(tx))]
pub async fn fetch_by_scoped_id_tx(
    tx: &mut Transaction<'static, Postgres>,
    tracker_id: i64,
    scoped_id: i64,
) -> Result<Option<Ticket>, CoreError> {
    let row = sqlx::query!(
        r#"
        SELECT id, tracker_id, scoped_id, submitter_id, title, description,
               status, resolution, authenticity, comment_count, created, updated
        FROM tickets
        WHERE tracker_id = $1 AND scoped_id = $2
        "#,
        tracker_id,
        scoped_id
    )
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("fetching ticket in transaction")))?;

    row.map(|r| {
        row_to_ticket(
            r.id,
            r.tracker_id,
            r.scoped_id,
            r.submitter_id,
            r.title,
            r.description,
            r.status,
            r.resolution,
            r.authenticity,
            r.comment_count,
            r.created,
            r.updated,
        )
    })
    .transpose()
}

#[tracing::instrument(skip(tx))]
pub async fn fetch_for_update(
    tx: &mut Transaction<'static, Postgres>,
    ticket_id: i64,
) -> Result<Ticket, CoreError> {
    let r = sqlx::query!(
        r#"
        SELECT id, tracker_id, scoped_id, submitter_id, title, description,
               status, resolution, authenticity, comment_count, created, updated
        FROM tickets
        WHERE id = $1
        FOR UPDATE
        "#,
        ticket_id
    )
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("locking ticket")))?
    .ok_or(CoreError::NotFound)?;

    row_to_ticket(
        r.id,
        r.tracker_id,
        r.scoped_id,
        r.submitter_id,
        r.title,
        r.description,
        r.status,
        r.resolution,
        r.authenticity,
        r.comment_count,
        r.created,
        r.updated,
    )
}

#[tracing::instrument(skip(tx))]
pub async fn set_status(
    tx: &mut Transaction<'static, Postgres>,
    ticket_id: i64,
    status: TicketStatus,
    resolution: TicketResolution,
) -> Result<(), CoreError> {
    sqlx::query!(
        r#"UPDATE tickets SET status = $2, resolution = $3 WHERE id = $1"#,
        ticket_id,
        status.as_str(),
        resolution.as_str(),
    )
    .execute(&mut **tx)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("updating ticket status")))?;
    Ok(())
}

#[tracing::instrument(skip(tx))]
pub async fn increment_comment_count(
    tx: &mut Transaction<'static, Postgres>,
    ticket_id: i64,
) -> Result<(), CoreError> {
    sqlx::query!(
        r#"UPDATE tickets SET comment_count = comment_count + 1 WHERE id = $1"#,
        ticket_id
    )
    .execute(&mut **tx)
    .await
    .map_err(|e| {
        CoreError::Internal(anyhow::Error::new(e).context("incrementing ticket.comment_count"))
    })?;
    Ok(())
}

/// Overwrites `comment_count` outright — used by import replay to
/// reconcile the aggregate after comments have been replayed (§4.7), unlike
/// `increment_comment_count`'s delta-based use during normal lifecycle
/// operations.
#[tracing::instrument(skip(tx))]
pub async fn set_comment_count(
    tx: &mut Transaction<'static, Postgres>,
    ticket_id: i64,
    count: i64,
) -> Result<(), CoreError> {
    sqlx::query!(
        r#"UPDATE tickets SET comment_count = $2 WHERE id = $1"#,
        ticket_id,
        count
    )
    .execute(&mut **tx)
    .await
    .map_err(|e| {
        CoreError::Internal(anyhow::Error::new(e).context("setting ticket.comment_count"))
    })?;
    Ok(())
}

/// Overwrites `updated` with an exact timestamp carried over from an import
/// dump (§4.7: "`created`/`updated` are taken from the dump"), unlike
/// `touch_updated`'s now()-based bump used by ordinary lifecycle writes.
#[tracing::instrument(skip(tx))]
pub async fn set_updated(
    tx: &mut Transaction<'static, Postgres>,
    ticket_id: i64,
    updated: chrono::DateTime<chrono::Utc>,
) -> Result<(), CoreError> {
    sqlx::query!(
        r#"UPDATE tickets SET updated = $2 WHERE id = $1"#,
        ticket_id,
        updated
    )
    .execute(&mut **tx)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("setting ticket.updated")))?;
    Ok(())
}

#[tracing::instrument(skip(tx))]
pub async fn touch_updated(
    tx: &mut Transaction<'static, Postgres>,
    ticket_id: i64,
    no_autoupdate: bool,
) -> Result<(), CoreError> {
    if no_autoupdate {
        return Ok(());
    }
    sqlx::query!(
        r#"UPDATE tickets SET updated = now() WHERE id = $1"#,
        ticket_id
    )
    .execute(&mut **tx)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("touching ticket.updated")))?;
    Ok(())
}
