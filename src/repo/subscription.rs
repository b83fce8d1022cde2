use sqlx::PgPool;
use sqlx::Postgres;
use sqlx::Transaction;

use crate::domain::SubscriptionScope;
use crate::domain::TicketSubscription;
use crate::error::CoreError;

fn row_to_subscription(
    id: i64,
    participant_id: i64,
    tracker_id: Option<i64>,
    ticket_id: Option<i64>,
    created: chrono::DateTime<chrono::Utc>,
) -> Result<TicketSubscription, CoreError> {
    let scope = match (tracker_id, ticket_id) {
        (Some(t), None) => SubscriptionScope::Tracker(t),
        (None, Some(t)) => SubscriptionScope::Ticket(t),
        _ => {
            return Err(CoreError::Internal(anyhow::anyhow!(
                "subscription row must have exactly one of tracker_id/ticket_id"
            )))
        }
    };
    Ok(TicketSubscription {
        id,
        participant_id,
        scope,
        created,
    })
}

#[tracing::instrument(skip(pool))]
pub async fn fetch_for_tracker(
    pool: &PgPool,
    tracker_id: i64,
) -> Result<Vec<TicketSubscription>, CoreError> {
    let rows = sqlx::query!(
        r#"
        SELECT id, participant_id, tracker_id, ticket_id, created
        FROM ticket_subscriptions
        WHERE tracker_id = $1
        "#,
        tracker_id
    )
    .fetch_all(pool)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("fetching tracker subscriptions")))?;

    rows.into_iter()
        .map(|r| row_to_subscription(r.id, r.participant_id, r.tracker_id, r.ticket_id, r.created))
        .collect()
}

#[tracing::instrument(skip(pool))]
pub async fn fetch_for_ticket(
    pool: &PgPool,
    ticket_id: i64,
) -> Result<Vec<TicketSubscription>, CoreError> {
    let rows = sqlx::query!(
        r#"
        SELECT id, participant_id, tracker_id, ticket_id, created
        FROM ticket_subscriptions
        WHERE ticket_id = $1
        "#,
        ticket_id
    )
    .fetch_all(pool)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("fetching ticket subscriptions")))?;

    rows.into_iter()
        .map(|r| row_to_subscription(r.id, r.participant_id, r.tracker_id, r.ticket_id, r.created))
        .collect()
}

#[tracing::instrument(skip(tx))]
pub async fn exists(
    tx: &mut Transaction<'static, Postgres>,
    participant_id: i64,
    scope: SubscriptionScope,
) -> Result<bool, CoreError> {
    let found = match scope {
        SubscriptionScope::Tracker(tracker_id) => sqlx::query!(
            r#"SELECT id FROM ticket_subscriptions WHERE participant_id = $1 AND tracker_id = $2"#,
            participant_id,
            tracker_id
        )
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("checking subscription")))?,
        SubscriptionScope::Ticket(ticket_id) => sqlx::query!(
            r#"SELECT id FROM ticket_subscriptions WHERE participant_id = $1 AND ticket_id = $2"#,
            participant_id,
            ticket_id
        )
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("checking subscription")))?,
    };
    Ok(found.is_some())
}

#[tracing::instrument(skip(tx))]
pub async fn insert(
    tx: &mut Transaction<'static, Postgres>,
    participant_id: i64,
    scope: SubscriptionScope,
) -> Result<TicketSubscription, CoreError> {
    let (tracker_id, ticket_id) = match scope {
        SubscriptionScope::Tracker(id) => (Some(id), None),
        SubscriptionScope::Ticket(id) => (None, Some(id)),
    };
    let r = sqlx::query!(
        r#"
        INSERT INTO ticket_subscriptions (participant_id, tracker_id, ticket_id)
        VALUES ($1, $2, $3)
        RETURNING id, participant_id, tracker_id, ticket_id, created
        "#,
        participant_id,
        tracker_id,
        ticket_id,
    )
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("inserting subscription")))?;

    row_to_subscription(r.id, r.participant_id, r.tracker_id, r.ticket_id, r.created)
}

/// `get_or_create_subscription` from `original_source/tickets.py`: skips
/// the insert if a row already exists at this scope for this participant.
pub async fn get_or_create(
    tx: &mut Transaction<'static, Postgres>,
    participant_id: i64,
    scope: SubscriptionScope,
) -> Result<Option<TicketSubscription>, CoreError> {
    if exists(tx, participant_id, scope).await? {
        return Ok(None);
    }
    insert(tx, participant_id, scope).await.map(Some)
}
