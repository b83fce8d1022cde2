use sqlx::PgPool;

use crate::domain::User;
use crate::error::CoreError;

#[tracing::instrument(skip(pool))]
pub async fn fetch_by_id(pool: &PgPool, user_id: i64) -> Result<Option<User>, CoreError> {
    let row = sqlx::query!(
        r#"SELECT id, username, notify_self, created FROM users WHERE id = $1"#,
        user_id
    )
    .fetch_optional(pool)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("fetching user by id")))?;

    Ok(row.map(|r| User {
        id: r.id,
        username: r.username,
        notify_self: r.notify_self,
        created: r.created,
    }))
}

#[tracing::instrument(skip(pool))]
pub async fn fetch_by_username(pool: &PgPool, username: &str) -> Result<Option<User>, CoreError> {
    let row = sqlx::query!(
        r#"SELECT id, username, notify_self, created FROM users WHERE username = $1"#,
        username
    )
    .fetch_optional(pool)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("fetching user by username")))?;

    Ok(row.map(|r| User {
        id: r.id,
        username: r.username,
        notify_self: r.notify_self,
        created: r.created,
    }))
}
