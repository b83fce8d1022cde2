use sqlx::PgPool;

use crate::domain::AccessSet;
use crate::domain::UserAccess;
use crate::error::CoreError;

#[tracing::instrument(skip(pool))]
pub async fn fetch_user_access(
    pool: &PgPool,
    tracker_id: i64,
    user_id: i64,
) -> Result<Option<UserAccess>, CoreError> {
    let row = sqlx::query!(
        r#"
        SELECT id, tracker_id, user_id, permissions, created
        FROM user_access
        WHERE tracker_id = $1 AND user_id = $2
        "#,
        tracker_id,
        user_id
    )
    .fetch_optional(pool)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("fetching user_access")))?;

    Ok(row.map(|r| UserAccess {
        id: r.id,
        tracker_id: r.tracker_id,
        user_id: r.user_id,
        permissions: AccessSet::from_i32(r.permissions),
        created: r.created,
    }))
}

#[tracing::instrument(skip(pool))]
pub async fn upsert(
    pool: &PgPool,
    tracker_id: i64,
    user_id: i64,
    permissions: AccessSet,
) -> Result<UserAccess, CoreError> {
    let r = sqlx::query!(
        r#"
        INSERT INTO user_access (tracker_id, user_id, permissions)
        VALUES ($1, $2, $3)
        ON CONFLICT (tracker_id, user_id) DO UPDATE SET permissions = excluded.permissions
        RETURNING id, tracker_id, user_id, permissions, created
        "#,
        tracker_id,
        user_id,
        permissions.as_i32(),
    )
    .fetch_one(pool)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("upserting user_access")))?;

    Ok(UserAccess {
        id: r.id,
        tracker_id: r.tracker_id,
        user_id: r.user_id,
        permissions: AccessSet::from_i32(r.permissions),
        created: r.created,
    })
}
