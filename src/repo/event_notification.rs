//! Audit/dedup trail for notification fan-out (`spec.md` §4.5): one row per
//! (event, participant) pair the engine decided to target, independent of
//! whether an email was actually queued for it.

use sqlx::PgPool;

use crate::domain::EventNotification;
use crate::error::CoreError;

#[tracing::instrument(skip(pool))]
pub async fn insert(
    pool: &PgPool,
    event_id: i64,
    participant_id: i64,
) -> Result<EventNotification, CoreError> {
    let r = sqlx::query!(
        r#"
        INSERT INTO event_notifications (event_id, participant_id)
        VALUES ($1, $2)
        ON CONFLICT (event_id, participant_id) DO UPDATE SET event_id = excluded.event_id
        RETURNING id, event_id, participant_id, created
        "#,
        event_id,
        participant_id,
    )
    .fetch_one(pool)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("inserting event notification")))?;

    Ok(EventNotification {
        id: r.id,
        event_id: r.event_id,
        participant_id: r.participant_id,
        created: r.created,
    })
}

#[tracing::instrument(skip(pool))]
pub async fn fetch_for_event(
    pool: &PgPool,
    event_id: i64,
) -> Result<Vec<EventNotification>, CoreError> {
    let rows = sqlx::query!(
        r#"
        SELECT id, event_id, participant_id, created
        FROM event_notifications
        WHERE event_id = $1
        "#,
        event_id
    )
    .fetch_all(pool)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("fetching event notifications")))?;

    Ok(rows
        .into_iter()
        .map(|r| EventNotification {
            id: r.id,
            event_id: r.event_id,
            participant_id: r.participant_id,
            created: r.created,
        })
        .collect())
}
