//! Webhook subscription CRUD and matching (`spec.md` §6 "webhook
//! subscription CRUD at user, tracker, and ticket scope"; §4.4 step 8
//! "enqueue per-event webhooks to matching tracker and ticket
//! subscriptions"). Grounded on `original_source/webhooks.py`'s three
//! `CeleryWebhook` subclasses, collapsed into one table discriminated by
//! which of `user_id`/`tracker_id`/`ticket_id` is set.

use secrecy::ExposeSecret;
use secrecy::Secret;
use sqlx::PgPool;

use crate::domain::WebhookEvent;
use crate::domain::WebhookScope;
use crate::domain::WebhookSubscription;
use crate::error::CoreError;

fn row_to_subscription(
    id: i64,
    user_id: Option<i64>,
    tracker_id: Option<i64>,
    ticket_id: Option<i64>,
    url: String,
    secret: String,
    events: Vec<String>,
    created: chrono::DateTime<chrono::Utc>,
) -> Result<WebhookSubscription, CoreError> {
    let scope = match (user_id, tracker_id, ticket_id) {
        (Some(id), None, None) => WebhookScope::User(id),
        (None, Some(id), None) => WebhookScope::Tracker(id),
        (None, None, Some(id)) => WebhookScope::Ticket(id),
        _ => {
            return Err(CoreError::Internal(anyhow::anyhow!(
                "webhook subscription row must have exactly one scope column set"
            )))
        }
    };
    let events = events
        .iter()
        .map(|e| {
            WebhookEvent::parse(e).ok_or_else(|| {
                CoreError::Internal(anyhow::anyhow!("unknown webhook event {e:?} in row"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(WebhookSubscription {
        id,
        scope,
        url,
        secret: Secret::new(secret),
        events,
        created,
    })
}

#[tracing::instrument(skip(pool, url, secret, events))]
pub async fn create(
    pool: &PgPool,
    scope: WebhookScope,
    url: &str,
    secret: &Secret<String>,
    events: &[WebhookEvent],
) -> Result<WebhookSubscription, CoreError> {
    crate::domain::webhook_subscription::validate_events(scope, events)?;

    let (user_id, tracker_id, ticket_id) = match scope {
        WebhookScope::User(id) => (Some(id), None, None),
        WebhookScope::Tracker(id) => (None, Some(id), None),
        WebhookScope::Ticket(id) => (None, None, Some(id)),
    };
    let event_names: Vec<&str> = events.iter().map(|e| e.as_str()).collect();

    let r = sqlx::query!(
        r#"
        INSERT INTO webhook_subscriptions (user_id, tracker_id, ticket_id, url, secret, events)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, user_id, tracker_id, ticket_id, url, secret, events, created
        "#,
        user_id,
        tracker_id,
        ticket_id,
        url,
        secret.expose_secret(),
        &event_names as &[&str],
    )
    .fetch_one(pool)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("creating webhook subscription")))?;

    row_to_subscription(
        r.id,
        r.user_id,
        r.tracker_id,
        r.ticket_id,
        r.url,
        r.secret,
        r.events,
        r.created,
    )
}

#[tracing::instrument(skip(pool))]
pub async fn delete(pool: &PgPool, id: i64) -> Result<(), CoreError> {
    let result = sqlx::query!(r#"DELETE FROM webhook_subscriptions WHERE id = $1"#, id)
        .execute(pool)
        .await
        .map_err(|e| {
            CoreError::Internal(anyhow::Error::new(e).context("deleting webhook subscription"))
        })?;
    if result.rows_affected() == 0 {
        return Err(CoreError::NotFound);
    }
    Ok(())
}

/// Subscriptions registered on `tracker_id` that fire on `event`.
#[tracing::instrument(skip(pool))]
pub async fn fetch_matching_tracker(
    pool: &PgPool,
    tracker_id: i64,
    event: WebhookEvent,
) -> Result<Vec<WebhookSubscription>, CoreError> {
    let rows = sqlx::query!(
        r#"
        SELECT id, user_id, tracker_id, ticket_id, url, secret, events, created
        FROM webhook_subscriptions
        WHERE tracker_id = $1 AND $2 = ANY(events)
        "#,
        tracker_id,
        event.as_str(),
    )
    .fetch_all(pool)
    .await
    .map_err(|e| {
        CoreError::Internal(anyhow::Error::new(e).context("fetching tracker webhook subscriptions"))
    })?;

    rows.into_iter()
        .map(|r| {
            row_to_subscription(r.id, r.user_id, r.tracker_id, r.ticket_id, r.url, r.secret, r.events, r.created)
        })
        .collect()
}

/// Subscriptions registered on `ticket_id` that fire on `event`.
#[tracing::instrument(skip(pool))]
pub async fn fetch_matching_ticket(
    pool: &PgPool,
    ticket_id: i64,
    event: WebhookEvent,
) -> Result<Vec<WebhookSubscription>, CoreError> {
    let rows = sqlx::query!(
        r#"
        SELECT id, user_id, tracker_id, ticket_id, url, secret, events, created
        FROM webhook_subscriptions
        WHERE ticket_id = $1 AND $2 = ANY(events)
        "#,
        ticket_id,
        event.as_str(),
    )
    .fetch_all(pool)
    .await
    .map_err(|e| {
        CoreError::Internal(anyhow::Error::new(e).context("fetching ticket webhook subscriptions"))
    })?;

    rows.into_iter()
        .map(|r| {
            row_to_subscription(r.id, r.user_id, r.tracker_id, r.ticket_id, r.url, r.secret, r.events, r.created)
        })
        .collect()
}

/// Subscriptions registered on `user_id` (the owner of a tracker) that fire
/// on `event` — used for `tracker:{create,update,delete}`/`ticket:create`.
#[tracing::instrument(skip(pool))]
pub async fn fetch_matching_user(
    pool: &PgPool,
    user_id: i64,
    event: WebhookEvent,
) -> Result<Vec<WebhookSubscription>, CoreError> {
    let rows = sqlx::query!(
        r#"
        SELECT id, user_id, tracker_id, ticket_id, url, secret, events, created
        FROM webhook_subscriptions
        WHERE user_id = $1 AND $2 = ANY(events)
        "#,
        user_id,
        event.as_str(),
    )
    .fetch_all(pool)
    .await
    .map_err(|e| {
        CoreError::Internal(anyhow::Error::new(e).context("fetching user webhook subscriptions"))
    })?;

    rows.into_iter()
        .map(|r| {
            row_to_subscription(r.id, r.user_id, r.tracker_id, r.ticket_id, r.url, r.secret, r.events, r.created)
        })
        .collect()
}
