use sqlx::PgPool;
use sqlx::Postgres;
use sqlx::Transaction;

use crate::domain::AccessSet;
use crate::domain::Tracker;
use crate::domain::Visibility;
use crate::error::CoreError;

fn row_to_tracker(
    id: i64,
    owner_id: i64,
    name: String,
    visibility: String,
    default_access: i32,
    next_ticket_id: i64,
    import_in_progress: bool,
    created: chrono::DateTime<chrono::Utc>,
    updated: chrono::DateTime<chrono::Utc>,
) -> Result<Tracker, CoreError> {
    let visibility = Visibility::parse(&visibility).ok_or_else(|| {
        CoreError::Internal(anyhow::anyhow!("unknown tracker visibility {visibility:?} in row"))
    })?;
    Ok(Tracker {
        id,
        owner_id,
        name,
        visibility,
        default_access: AccessSet::from_i32(default_access),
        next_ticket_id,
        import_in_progress,
        created,
        updated,
    })
}

#[tracing::instrument(skip(pool))]
pub async fn fetch_by_owner_and_name(
    pool: &PgPool,
    owner_id: i64,
    name: &str,
) -> Result<Option<Tracker>, CoreError> {
    let row = sqlx::query!(
        r#"
        SELECT id, owner_id, name, visibility, default_access, next_ticket_id,
               import_in_progress, created, updated
        FROM trackers
        WHERE owner_id = $1 AND name = $2
        "#,
        owner_id,
        name
    )
    .fetch_optional(pool)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("fetching tracker")))?;

    row.map(|r| {
        row_to_tracker(
            r.id,
            r.owner_id,
            r.name,
            r.visibility,
            r.default_access,
            r.next_ticket_id,
            r.import_in_progress,
            r.created,
            r.updated,
        )
    })
    .transpose()
}

#[tracing::instrument(skip(pool))]
pub async fn fetch_by_id(pool: &PgPool, tracker_id: i64) -> Result<Option<Tracker>, CoreError> {
    let row = sqlx::query!(
        r#"
        SELECT id, owner_id, name, visibility, default_access, next_ticket_id,
               import_in_progress, created, updated
        FROM trackers
        WHERE id = $1
        "#,
        tracker_id
    )
    .fetch_optional(pool)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("fetching tracker by id")))?;

    row.map(|r| {
        row_to_tracker(
            r.id,
            r.owner_id,
            r.name,
            r.visibility,
            r.default_access,
            r.next_ticket_id,
            r.import_in_progress,
            r.created,
            r.updated,
        )
    })
    .transpose()
}

/// Locks the tracker row for the duration of the transaction — the only
/// lock point besides edit-order for comments (§5).
#[tracing::instrument(skip(tx))]
pub async fn fetch_for_update(
    tx: &mut Transaction<'static, Postgres>,
    tracker_id: i64,
) -> Result<Tracker, CoreError> {
    let r = sqlx::query!(
        r#"
        SELECT id, owner_id, name, visibility, default_access, next_ticket_id,
               import_in_progress, created, updated
        FROM trackers
        WHERE id = $1
        FOR UPDATE
        "#,
        tracker_id
    )
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("locking tracker")))?
    .ok_or(CoreError::NotFound)?;

    row_to_tracker(
        r.id,
        r.owner_id,
        r.name,
        r.visibility,
        r.default_access,
        r.next_ticket_id,
        r.import_in_progress,
        r.created,
        r.updated,
    )
}

/// Allocates the next `scoped_id` and advances the counter. Caller must
/// already hold the row lock from `fetch_for_update`.
#[tracing::instrument(skip(tx))]
pub async fn allocate_next_ticket_id(
    tx: &mut Transaction<'static, Postgres>,
    tracker_id: i64,
) -> Result<i64, CoreError> {
    let r = sqlx::query!(
        r#"
        UPDATE trackers
        SET next_ticket_id = next_ticket_id + 1
        WHERE id = $1
        RETURNING next_ticket_id - 1 AS "scoped_id!"
        "#,
        tracker_id
    )
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("allocating scoped_id")))?;

    Ok(r.scoped_id)
}

/// Sets `updated = now()` unless `no_autoupdate` suppresses it for a bulk
/// import in progress (§4.3 step 7, §9 open question on admin edits).
#[tracing::instrument(skip(tx))]
pub async fn touch_updated(
    tx: &mut Transaction<'static, Postgres>,
    tracker_id: i64,
    no_autoupdate: bool,
) -> Result<(), CoreError> {
    if no_autoupdate {
        return Ok(());
    }
    sqlx::query!(
        r#"UPDATE trackers SET updated = now() WHERE id = $1"#,
        tracker_id
    )
    .execute(&mut **tx)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("touching tracker.updated")))?;
    Ok(())
}

#[tracing::instrument(skip(tx))]
pub async fn set_import_in_progress(
    tx: &mut Transaction<'static, Postgres>,
    tracker_id: i64,
    in_progress: bool,
) -> Result<(), CoreError> {
    sqlx::query!(
        r#"UPDATE trackers SET import_in_progress = $2 WHERE id = $1"#,
        tracker_id,
        in_progress
    )
    .execute(&mut **tx)
    .await
    .map_err(|e| {
        CoreError::Internal(anyhow::Error::new(e).context("updating tracker import_in_progress"))
    })?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct NewTracker<'a> {
    pub owner_id: i64,
    pub name: &'a str,
    pub visibility: Visibility,
    pub default_access: AccessSet,
}

#[tracing::instrument(skip(pool, new))]
pub async fn create(pool: &PgPool, new: NewTracker<'_>) -> Result<Tracker, CoreError> {
    let r = sqlx::query!(
        r#"
        INSERT INTO trackers (owner_id, name, visibility, default_access, next_ticket_id)
        VALUES ($1, $2, $3, $4, 1)
        RETURNING id, owner_id, name, visibility, default_access, next_ticket_id,
                  import_in_progress, created, updated
        "#,
        new.owner_id,
        new.name,
        new.visibility.as_str(),
        new.default_access.as_i32(),
    )
    .fetch_one(pool)
    .await
    .map_err(|e| crate::error::from_sqlx_unique(e, "name"))?;

    row_to_tracker(
        r.id,
        r.owner_id,
        r.name,
        r.visibility,
        r.default_access,
        r.next_ticket_id,
        r.import_in_progress,
        r.created,
        r.updated,
    )
}
