use sqlx::PgPool;
use sqlx::Postgres;
use sqlx::Transaction;

use crate::domain::Label;
use crate::domain::TicketLabel;
use crate::error::CoreError;

#[tracing::instrument(skip(pool))]
pub async fn fetch_for_tracker(pool: &PgPool, tracker_id: i64) -> Result<Vec<Label>, CoreError> {
    let rows = sqlx::query_as!(
        Label,
        r#"SELECT id, tracker_id, name, color, text_color, created
           FROM labels WHERE tracker_id = $1 ORDER BY name"#,
        tracker_id
    )
    .fetch_all(pool)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("fetching labels")))?;
    Ok(rows)
}

#[tracing::instrument(skip(pool))]
pub async fn create(
    pool: &PgPool,
    tracker_id: i64,
    name: &str,
    color: &str,
    text_color: &str,
) -> Result<Label, CoreError> {
    sqlx::query_as!(
        Label,
        r#"
        INSERT INTO labels (tracker_id, name, color, text_color)
        VALUES ($1, $2, $3, $4)
        RETURNING id, tracker_id, name, color, text_color, created
        "#,
        tracker_id,
        name,
        color,
        text_color,
    )
    .fetch_one(pool)
    .await
    .map_err(|e| crate::error::from_sqlx_unique(e, "name"))
}

#[tracing::instrument(skip(pool))]
pub async fn delete(pool: &PgPool, tracker_id: i64, label_id: i64) -> Result<(), CoreError> {
    let result = sqlx::query!(
        r#"DELETE FROM labels WHERE id = $1 AND tracker_id = $2"#,
        label_id,
        tracker_id
    )
    .execute(pool)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("deleting label")))?;
    if result.rows_affected() == 0 {
        return Err(CoreError::NotFound);
    }
    Ok(())
}

#[tracing::instrument(skip(pool))]
pub async fn fetch_for_ticket(pool: &PgPool, ticket_id: i64) -> Result<Vec<TicketLabel>, CoreError> {
    let rows = sqlx::query_as!(
        TicketLabel,
        r#"SELECT ticket_id, label_id, user_id, created FROM ticket_labels WHERE ticket_id = $1"#,
        ticket_id
    )
    .fetch_all(pool)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("fetching ticket labels")))?;
    Ok(rows)
}

/// Idempotent: applying an already-applied label is a no-op (mirrors
/// `assign`'s idempotence contract for the equivalent `TicketAssignee`
/// association, §8).
#[tracing::instrument(skip(tx))]
pub async fn add(
    tx: &mut Transaction<'static, Postgres>,
    ticket_id: i64,
    label_id: i64,
    user_id: i64,
) -> Result<bool, CoreError> {
    let result = sqlx::query!(
        r#"
        INSERT INTO ticket_labels (ticket_id, label_id, user_id)
        VALUES ($1, $2, $3)
        ON CONFLICT (ticket_id, label_id) DO NOTHING
        "#,
        ticket_id,
        label_id,
        user_id,
    )
    .execute(&mut **tx)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("adding label")))?;
    Ok(result.rows_affected() > 0)
}

#[tracing::instrument(skip(tx))]
pub async fn remove(
    tx: &mut Transaction<'static, Postgres>,
    ticket_id: i64,
    label_id: i64,
) -> Result<bool, CoreError> {
    let result = sqlx::query!(
        r#"DELETE FROM ticket_labels WHERE ticket_id = $1 AND label_id = $2"#,
        ticket_id,
        label_id,
    )
    .execute(&mut **tx)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("removing label")))?;
    Ok(result.rows_affected() > 0)
}
