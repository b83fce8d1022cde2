//! Tracker administration: create/update/delete, label CRUD, ACL grants
//! (`spec.md` §6 `trackers.{create,update,delete}` / `labels.{...}`). Also
//! carries `get_recent_users`, supplemented from
//! `original_source/trackers.py` — useful for populating an assignee
//! picker, dropped from `spec.md`'s distillation but cheap to keep given
//! the event log already exists.

use sqlx::PgPool;

use secrecy::Secret;

use crate::domain::label::contrasting_text_color;
use crate::domain::label::validate_label_name;
use crate::domain::tracker::validate_tracker_name;
use crate::domain::AccessSet;
use crate::domain::Label;
use crate::domain::Tracker;
use crate::domain::UserAccess;
use crate::domain::Visibility;
use crate::domain::WebhookEvent;
use crate::domain::WebhookScope;
use crate::domain::WebhookSubscription;
use crate::error::CoreError;
use crate::repo;

#[tracing::instrument(skip(pool))]
pub async fn create_tracker(
    pool: &PgPool,
    owner_id: i64,
    name: &str,
    visibility: Visibility,
    default_access: AccessSet,
) -> Result<Tracker, CoreError> {
    validate_tracker_name(name)?;
    repo::tracker::create(
        pool,
        repo::tracker::NewTracker {
            owner_id,
            name,
            visibility,
            default_access,
        },
    )
    .await
}

/// Renames, re-visibilities, or changes the default access of a tracker.
/// Whether this touches `tracker.updated` is governed by
/// `admin_edits_touch_tracker_updated` (§9 open question — see DESIGN.md).
#[tracing::instrument(skip(pool))]
pub async fn update_tracker(
    pool: &PgPool,
    tracker_id: i64,
    visibility: Option<Visibility>,
    default_access: Option<AccessSet>,
    touch_updated: bool,
) -> Result<(), CoreError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("beginning tracker update")))?;

    if let Some(visibility) = visibility {
        sqlx::query!(
            r#"UPDATE trackers SET visibility = $2 WHERE id = $1"#,
            tracker_id,
            visibility.as_str(),
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("updating visibility")))?;
    }

    if let Some(default_access) = default_access {
        sqlx::query!(
            r#"UPDATE trackers SET default_access = $2 WHERE id = $1"#,
            tracker_id,
            default_access.as_i32(),
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("updating default_access")))?;
    }

    repo::tracker::touch_updated(&mut tx, tracker_id, !touch_updated).await?;

    tx.commit()
        .await
        .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("committing tracker update")))?;
    Ok(())
}

#[tracing::instrument(skip(pool))]
pub async fn delete_tracker(pool: &PgPool, tracker_id: i64) -> Result<(), CoreError> {
    let result = sqlx::query!(r#"DELETE FROM trackers WHERE id = $1"#, tracker_id)
        .execute(pool)
        .await
        .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("deleting tracker")))?;
    if result.rows_affected() == 0 {
        return Err(CoreError::NotFound);
    }
    Ok(())
}

#[tracing::instrument(skip(pool))]
pub async fn grant_access(
    pool: &PgPool,
    tracker_id: i64,
    user_id: i64,
    permissions: AccessSet,
) -> Result<UserAccess, CoreError> {
    repo::access::upsert(pool, tracker_id, user_id, permissions).await
}

#[tracing::instrument(skip(pool))]
pub async fn create_label(
    pool: &PgPool,
    tracker_id: i64,
    name: &str,
    color: &str,
) -> Result<Label, CoreError> {
    validate_label_name(name)?;
    let text_color = contrasting_text_color(color)?;
    repo::label::create(pool, tracker_id, name, color, text_color).await
}

#[tracing::instrument(skip(pool))]
pub async fn delete_label(pool: &PgPool, tracker_id: i64, label_id: i64) -> Result<(), CoreError> {
    repo::label::delete(pool, tracker_id, label_id).await
}

/// The last 20 users (by most recent event) who interacted with a tracker —
/// grounded on `get_recent_users` in `original_source/trackers.py`.
#[tracing::instrument(skip(pool))]
pub async fn recent_users(pool: &PgPool, tracker_id: i64, limit: i64) -> Result<Vec<i64>, CoreError> {
    let rows = sqlx::query!(
        r#"
        SELECT user_id AS "user_id!"
        FROM (
            SELECT e.user_id, e.created
            FROM events e
            JOIN tickets t ON t.id = e.ticket_id
            WHERE t.tracker_id = $1
            ORDER BY e.created DESC
            LIMIT $2
        ) recent
        GROUP BY user_id
        ORDER BY max(created) DESC
        "#,
        tracker_id,
        limit,
    )
    .fetch_all(pool)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("fetching recent users")))?;

    Ok(rows.into_iter().map(|r| r.user_id).collect())
}

/// Webhook subscription CRUD at user/tracker/ticket scope (§6). Each scope
/// only accepts its own subset of events — `repo::webhook_subscription::create`
/// enforces this before the row is written.
#[tracing::instrument(skip(pool, url, secret, events))]
pub async fn create_webhook_subscription(
    pool: &PgPool,
    scope: WebhookScope,
    url: &str,
    secret: Secret<String>,
    events: &[WebhookEvent],
) -> Result<WebhookSubscription, CoreError> {
    repo::webhook_subscription::create(pool, scope, url, &secret, events).await
}

#[tracing::instrument(skip(pool))]
pub async fn delete_webhook_subscription(pool: &PgPool, id: i64) -> Result<(), CoreError> {
    repo::webhook_subscription::delete(pool, id).await
}
