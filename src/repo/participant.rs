//! Participant resolver (`spec.md` §4.1). Each entry point is an idempotent
//! upsert keyed on the natural unique column, matching the invariant in
//! `spec.md` §8 ("`for_user(u)` called twice yields the same Participant
//! row").

use sqlx::PgPool;

use crate::domain::Participant;
use crate::domain::ParticipantKind;
use crate::domain::User;
use crate::error::CoreError;

fn row_to_participant(
    id: i64,
    kind: String,
    user: Option<User>,
    email_address: Option<String>,
    email_display_name: Option<String>,
    external_id: Option<String>,
    external_url: Option<String>,
    created: chrono::DateTime<chrono::Utc>,
) -> Result<Participant, CoreError> {
    let kind = match kind.as_str() {
        "user" => ParticipantKind::User(user.ok_or_else(|| {
            CoreError::Internal(anyhow::anyhow!("participant row marked user but user_id is null"))
        })?),
        "email" => ParticipantKind::Email {
            address: email_address.ok_or_else(|| {
                CoreError::Internal(anyhow::anyhow!("email participant missing address"))
            })?,
            display_name: email_display_name,
        },
        "external" => ParticipantKind::External {
            external_id: external_id.ok_or_else(|| {
                CoreError::Internal(anyhow::anyhow!("external participant missing external_id"))
            })?,
            external_url: external_url.ok_or_else(|| {
                CoreError::Internal(anyhow::anyhow!("external participant missing external_url"))
            })?,
        },
        other => {
            return Err(CoreError::Internal(anyhow::anyhow!(
                "unknown participant kind {other:?} in row"
            )))
        }
    };
    Ok(Participant { id, kind, created })
}

#[tracing::instrument(skip(pool, user))]
pub async fn for_user(pool: &PgPool, user: &User) -> Result<Participant, CoreError> {
    let r = sqlx::query!(
        r#"
        INSERT INTO participants (kind, user_id)
        VALUES ('user', $1)
        ON CONFLICT (user_id) WHERE kind = 'user' DO UPDATE SET user_id = excluded.user_id
        RETURNING id, created
        "#,
        user.id
    )
    .fetch_one(pool)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("resolving user participant")))?;

    Ok(Participant {
        id: r.id,
        kind: ParticipantKind::User(user.clone()),
        created: r.created,
    })
}

/// Promotes to a user participant if `address` matches a known user's
/// email, per §4.1.
#[tracing::instrument(skip(pool))]
pub async fn for_email(
    pool: &PgPool,
    address: &str,
    display_name: Option<&str>,
) -> Result<Participant, CoreError> {
    crate::domain::participant::validate_email(address)?;

    if let Some(user) = sqlx::query!(
        r#"SELECT id, username, notify_self, created FROM users WHERE email = $1"#,
        address
    )
    .fetch_optional(pool)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("checking user email")))?
    {
        return for_user(
            pool,
            &User {
                id: user.id,
                username: user.username,
                notify_self: user.notify_self,
                created: user.created,
            },
        )
        .await;
    }

    let r = sqlx::query!(
        r#"
        INSERT INTO participants (kind, email_address, email_display_name)
        VALUES ('email', $1, $2)
        ON CONFLICT (email_address) WHERE kind = 'email' DO UPDATE SET email_display_name = excluded.email_display_name
        RETURNING id, created
        "#,
        address,
        display_name,
    )
    .fetch_one(pool)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("resolving email participant")))?;

    Ok(Participant {
        id: r.id,
        kind: ParticipantKind::Email {
            address: address.to_string(),
            display_name: display_name.map(str::to_string),
        },
        created: r.created,
    })
}

#[tracing::instrument(skip(pool))]
pub async fn for_external(
    pool: &PgPool,
    external_id: &str,
    external_url: &str,
) -> Result<Participant, CoreError> {
    let r = sqlx::query!(
        r#"
        INSERT INTO participants (kind, external_id, external_url)
        VALUES ('external', $1, $2)
        ON CONFLICT (external_id) WHERE kind = 'external' DO UPDATE SET external_url = excluded.external_url
        RETURNING id, created
        "#,
        external_id,
        external_url,
    )
    .fetch_one(pool)
    .await
    .map_err(|e| {
        CoreError::Internal(anyhow::Error::new(e).context("resolving external participant"))
    })?;

    Ok(Participant {
        id: r.id,
        kind: ParticipantKind::External {
            external_id: external_id.to_string(),
            external_url: external_url.to_string(),
        },
        created: r.created,
    })
}

#[tracing::instrument(skip(pool))]
pub async fn fetch_by_id(pool: &PgPool, participant_id: i64) -> Result<Option<Participant>, CoreError> {
    let row = sqlx::query!(
        r#"
        SELECT p.id, p.kind, p.email_address, p.email_display_name,
               p.external_id, p.external_url, p.created,
               u.id as "user_id?", u.username as "username?",
               u.notify_self as "notify_self?", u.created as "user_created?"
        FROM participants p
        LEFT JOIN users u ON u.id = p.user_id
        WHERE p.id = $1
        "#,
        participant_id
    )
    .fetch_optional(pool)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("fetching participant")))?;

    row.map(|r| {
        let user = match (r.user_id, r.username, r.notify_self, r.user_created) {
            (Some(id), Some(username), Some(notify_self), Some(created)) => Some(User {
                id,
                username,
                notify_self,
                created,
            }),
            _ => None,
        };
        row_to_participant(
            r.id,
            r.kind,
            user,
            r.email_address,
            r.email_display_name,
            r.external_id,
            r.external_url,
            r.created,
        )
    })
    .transpose()
}
