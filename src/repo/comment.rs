use sqlx::PgPool;
use sqlx::Postgres;
use sqlx::Transaction;

use crate::domain::TicketAuthenticity;
use crate::domain::TicketComment;
use crate::error::CoreError;

#[tracing::instrument(skip(tx))]
pub async fn insert(
    tx: &mut Transaction<'static, Postgres>,
    ticket_id: i64,
    submitter_id: i64,
    text: &str,
    authenticity: TicketAuthenticity,
    created: Option<chrono::DateTime<chrono::Utc>>,
) -> Result<TicketComment, CoreError> {
    let r = sqlx::query!(
        r#"
        INSERT INTO ticket_comments (ticket_id, submitter_id, text, authenticity, created)
        VALUES ($1, $2, $3, $4, COALESCE($5, now()))
        RETURNING id, ticket_id, submitter_id, text, authenticity, superceeded_by_id, created
        "#,
        ticket_id,
        submitter_id,
        text,
        authenticity.as_str(),
        created,
    )
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("inserting comment")))?;

    Ok(TicketComment {
        id: r.id,
        ticket_id: r.ticket_id,
        submitter_id: r.submitter_id,
        text: r.text,
        authenticity: TicketAuthenticity::parse(&r.authenticity).ok_or_else(|| {
            CoreError::Internal(anyhow::anyhow!("unknown authenticity {:?} in row", r.authenticity))
        })?,
        superceeded_by_id: r.superceeded_by_id,
        created: r.created,
    })
}

/// Read-only lookup, unlike `fetch_for_update` — export walks comment text
/// without needing to hold the row lock (§4.7).
#[tracing::instrument(skip(pool))]
pub async fn fetch_by_id(pool: &PgPool, comment_id: i64) -> Result<Option<TicketComment>, CoreError> {
    let row = sqlx::query!(
        r#"
        SELECT id, ticket_id, submitter_id, text, authenticity, superceeded_by_id, created
        FROM ticket_comments
        WHERE id = $1
        "#,
        comment_id
    )
    .fetch_optional(pool)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("fetching comment")))?;

    row.map(|r| {
        Ok(TicketComment {
            id: r.id,
            ticket_id: r.ticket_id,
            submitter_id: r.submitter_id,
            text: r.text,
            authenticity: TicketAuthenticity::parse(&r.authenticity).ok_or_else(|| {
                CoreError::Internal(anyhow::anyhow!(
                    "unknown authenticity {:?} in row",
                    r.authenticity
                ))
            })?,
            superceeded_by_id: r.superceeded_by_id,
            created: r.created,
        })
    })
    .transpose()
}

#[tracing::instrument(skip(tx))]
pub async fn fetch_for_update(
    tx: &mut Transaction<'static, Postgres>,
    comment_id: i64,
) -> Result<TicketComment, CoreError> {
    let r = sqlx::query!(
        r#"
        SELECT id, ticket_id, submitter_id, text, authenticity, superceeded_by_id, created
        FROM ticket_comments
        WHERE id = $1
        FOR UPDATE
        "#,
        comment_id
    )
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("locking comment")))?
    .ok_or(CoreError::NotFound)?;

    Ok(TicketComment {
        id: r.id,
        ticket_id: r.ticket_id,
        submitter_id: r.submitter_id,
        text: r.text,
        authenticity: TicketAuthenticity::parse(&r.authenticity).ok_or_else(|| {
            CoreError::Internal(anyhow::anyhow!("unknown authenticity {:?} in row", r.authenticity))
        })?,
        superceeded_by_id: r.superceeded_by_id,
        created: r.created,
    })
}

/// Marks `old_id` as superceeded by `new_id` — the non-destructive edit
/// contract (§4.4).
#[tracing::instrument(skip(tx))]
pub async fn set_superceeded_by(
    tx: &mut Transaction<'static, Postgres>,
    old_id: i64,
    new_id: i64,
) -> Result<(), CoreError> {
    sqlx::query!(
        r#"UPDATE ticket_comments SET superceeded_by_id = $2 WHERE id = $1"#,
        old_id,
        new_id
    )
    .execute(&mut **tx)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("superceeding comment")))?;
    Ok(())
}

/// Count of non-superceeded comments — used to keep `ticket.comment_count`
/// honest during import replay (§4.7).
#[tracing::instrument(skip(tx))]
pub async fn count_current(
    tx: &mut Transaction<'static, Postgres>,
    ticket_id: i64,
) -> Result<i64, CoreError> {
    let r = sqlx::query!(
        r#"
        SELECT count(*) AS "count!"
        FROM ticket_comments
        WHERE ticket_id = $1 AND superceeded_by_id IS NULL
        "#,
        ticket_id
    )
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("counting comments")))?;
    Ok(r.count)
}
