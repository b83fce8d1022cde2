//! Error kinds surfaced by the engine (`spec.md` §7).
//!
//! Repository code wraps infrastructure failures with `anyhow::Context` (the
//! same idiom the teacher uses in `authentication::get_stored_credentials`
//! and `idempotency::persistence`), then this module's `From<anyhow::Error>`
//! collapses them to `CoreError::Internal` at the boundary the caller sees.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed or out-of-range input: name/title length, unknown enum
    /// value, bad search term. Never retried.
    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    /// Entity missing, or the viewer lacks `browse` — collapsed to `NotFound`
    /// so that a caller's HTTP layer returns 404 rather than 403 and leaks
    /// existence (§4.2).
    #[error("not found")]
    NotFound,

    /// Viewer has `browse` but not the capability the operation requires.
    #[error("permission denied: requires {required}")]
    PermissionDenied { required: String },

    /// Unique-constraint violation on `scoped_id` during ticket submission,
    /// after retries with a fresh lock were exhausted.
    #[error("conflict allocating ticket id after {attempts} attempts")]
    Conflict { attempts: u32 },

    /// Unique-constraint violation on a user-supplied key (label name,
    /// participant natural key) surfaced back to the user as a validation
    /// problem.
    #[error("{field}: {message}")]
    Integrity { field: String, message: String },

    /// Malformed dump, unknown event type name, or missing required field
    /// during import. The caller continues with the next ticket in the
    /// dump; this variant never aborts the whole import (§4.7, §7).
    #[error("import error: {0}")]
    Import(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CoreError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn integrity(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Integrity {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn permission_denied(required: impl Into<String>) -> Self {
        Self::PermissionDenied {
            required: required.into(),
        }
    }
}

/// Maps a raw `sqlx::Error` to a `CoreError`, recognizing unique-constraint
/// violations by Postgres SQLSTATE `23505` and routing them to `Integrity`
/// rather than the generic `Internal` bucket. `context` names the field the
/// violated constraint is keyed on, for a user-facing message.
pub fn from_sqlx_unique(err: sqlx::Error, field: &str) -> CoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            return CoreError::integrity(field, format!("{field} is already in use"));
        }
    }
    CoreError::Internal(anyhow::Error::new(err).context(format!("querying {field}")))
}

pub type CoreResult<T> = Result<T, CoreError>;
