//! Import/export (`spec.md` §4.7). Export produces a gzipped JSON document
//! with detached HMAC signatures over a fixed field subset; import verifies
//! those signatures to assign `TicketAuthenticity`. Grounded on
//! `original_source/export.py` and `original_source/tracker_import.py` for
//! shape, but the exact signed-field order here follows the spec's
//! canonicalization rather than the original's, which differs from it.
//!
//! Signing reuses the teacher's existing `hmac`+`sha2` dependencies (already
//! pulled in for password hashing elsewhere in the pack) rather than adding
//! `ed25519-dalek`; gzip framing is `flate2`, grounded on its use in the
//! distribution/storage crates elsewhere in the example pack.

use std::collections::HashMap;
use std::io::Read;
use std::io::Write;

use chrono::DateTime;
use chrono::Utc;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use hmac::Hmac;
use hmac::Mac;
use secrecy::ExposeSecret;
use secrecy::Secret;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;
use sqlx::PgPool;
use sqlx::Postgres;
use sqlx::Transaction;

use crate::domain::EventTypeSet;
use crate::domain::Participant;
use crate::domain::TicketAuthenticity;
use crate::domain::TicketResolution;
use crate::domain::TicketStatus;
use crate::domain::Tracker;
use crate::error::CoreError;
use crate::repo;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Serialize)]
struct TicketSignaturePayload<'a> {
    tracker_id: i64,
    ticket_id: i64,
    subject: &'a str,
    body: &'a str,
    submitter_id: i64,
    upstream: &'a str,
}

#[derive(Debug, Serialize)]
struct CommentSignaturePayload<'a> {
    tracker_id: i64,
    ticket_id: i64,
    comment: &'a str,
    author_id: i64,
    upstream: &'a str,
}

fn sign(payload: &impl Serialize, key: &Secret<String>) -> Result<String, CoreError> {
    let canonical = serde_json::to_vec(payload)
        .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("canonicalizing signature payload")))?;
    let mut mac = HmacSha256::new_from_slice(key.expose_secret().as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(&canonical);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn verify(payload: &impl Serialize, signature_hex: &str, key: &Secret<String>) -> bool {
    let Ok(expected) = sign(payload, key) else {
        return false;
    };
    // Constant-time-ish via length check first; hex digests are fixed-width
    // so an early return here leaks nothing beyond what comparing the whole
    // string already would.
    expected.len() == signature_hex.len() && expected == signature_hex
}

pub fn sign_ticket(
    tracker_id: i64,
    ticket_id: i64,
    subject: &str,
    body: &str,
    submitter_id: i64,
    upstream: &str,
    key: &Secret<String>,
) -> Result<String, CoreError> {
    sign(
        &TicketSignaturePayload {
            tracker_id,
            ticket_id,
            subject,
            body,
            submitter_id,
            upstream,
        },
        key,
    )
}

pub fn verify_ticket_signature(
    tracker_id: i64,
    ticket_id: i64,
    subject: &str,
    body: &str,
    submitter_id: i64,
    upstream: &str,
    signature: &str,
    key: &Secret<String>,
) -> bool {
    verify(
        &TicketSignaturePayload {
            tracker_id,
            ticket_id,
            subject,
            body,
            submitter_id,
            upstream,
        },
        signature,
        key,
    )
}

pub fn sign_comment_event(
    tracker_id: i64,
    ticket_id: i64,
    comment: &str,
    author_id: i64,
    upstream: &str,
    key: &Secret<String>,
) -> Result<String, CoreError> {
    sign(
        &CommentSignaturePayload {
            tracker_id,
            ticket_id,
            comment,
            author_id,
            upstream,
        },
        key,
    )
}

pub fn verify_comment_signature(
    tracker_id: i64,
    ticket_id: i64,
    comment: &str,
    author_id: i64,
    upstream: &str,
    signature: &str,
    key: &Secret<String>,
) -> bool {
    verify(
        &CommentSignaturePayload {
            tracker_id,
            ticket_id,
            comment,
            author_id,
            upstream,
        },
        signature,
        key,
    )
}

/// Resolves the authenticity a verified/absent/invalid signature implies
/// (§4.7 import rules).
pub fn authenticity_for_signature(signature: Option<bool>) -> TicketAuthenticity {
    match signature {
        None => TicketAuthenticity::Unauthenticated,
        Some(true) => TicketAuthenticity::Authentic,
        Some(false) => TicketAuthenticity::Tampered,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantExport {
    pub kind: String,
    /// Bare `username` for the `user` kind (never the `~`-prefixed
    /// canonical form) so import can look it up directly via
    /// `repo::user::fetch_by_username`; the address/external id otherwise.
    pub identifier: String,
    pub display_name: Option<String>,
    /// The exporting system's local numeric id, present only for the `user`
    /// kind. Carried solely so a signature can be reconstructed byte-for-byte
    /// at verify time — import identity resolution always goes through
    /// `identifier`, never this field.
    pub raw_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventExport {
    pub event_type: Vec<String>,
    pub comment: Option<String>,
    pub old_status: Option<TicketStatus>,
    pub new_status: Option<TicketStatus>,
    pub old_resolution: Option<TicketResolution>,
    pub new_resolution: Option<TicketResolution>,
    pub author: Option<ParticipantExport>,
    pub upstream: String,
    pub signature: Option<String>,
    pub created: DateTime<Utc>,
    /// Raw originating-system ticket id for a `ticket_mentioned` event — the
    /// ticket the mention was made *from*.
    pub from_ticket_id: Option<i64>,
    /// Name-keyed label reference for `label_added`/`label_removed`, mirroring
    /// the name-keyed label dictionary import builds up.
    pub label_name: Option<String>,
    /// The participant being (un)assigned, for `assigned_user`/`unassigned_user`.
    pub assignee: Option<ParticipantExport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketExport {
    /// Raw originating-system ticket id, carried only for signature
    /// reconstruction and `ticket_mentioned` cross-referencing.
    pub id: i64,
    pub scoped_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: TicketStatus,
    pub resolution: TicketResolution,
    pub submitter: ParticipantExport,
    pub upstream: String,
    pub signature: Option<String>,
    pub events: Vec<EventExport>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelExport {
    pub name: String,
    pub color: String,
    pub text_color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerExport {
    /// Raw originating-system tracker id, carried only for signature
    /// reconstruction.
    pub tracker_id: i64,
    pub owner: String,
    pub name: String,
    pub labels: Vec<LabelExport>,
    pub tickets: Vec<TicketExport>,
}

/// Serializes and gzips a `TrackerExport` document.
pub fn encode_export(doc: &TrackerExport) -> Result<Vec<u8>, CoreError> {
    let json = serde_json::to_vec(doc)
        .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("serializing export")))?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&json)
        .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("gzipping export")))?;
    encoder
        .finish()
        .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("finishing gzip stream")))
}

/// Ungzips and parses a dump produced by `encode_export`. Malformed input is
/// an `Import` error, not `Internal` — §4.7/§7 treat a bad dump as a
/// user-visible problem, never a crash.
pub fn decode_export(bytes: &[u8]) -> Result<TrackerExport, CoreError> {
    let mut decoder = GzDecoder::new(bytes);
    let mut json = Vec::new();
    decoder
        .read_to_end(&mut json)
        .map_err(|e| CoreError::Import(format!("not a gzip stream: {e}")))?;
    serde_json::from_slice(&json).map_err(|e| CoreError::Import(format!("malformed dump: {e}")))
}

fn user_participant_export(user: &crate::domain::User) -> ParticipantExport {
    ParticipantExport {
        kind: "user".to_string(),
        identifier: user.username.clone(),
        display_name: None,
        raw_id: Some(user.id),
    }
}

/// Builds a `TrackerExport` document from a tracker's current state —
/// tickets ordered by `scoped_id`, each carrying its events in order, each
/// signable row signed over the canonical field subset (§4.7).
#[tracing::instrument(skip(pool, signing_key))]
pub async fn export_tracker(
    pool: &PgPool,
    tracker_id: i64,
    origin: &str,
    signing_key: &Secret<String>,
) -> Result<TrackerExport, CoreError> {
    let tracker = repo::tracker::fetch_by_id(pool, tracker_id)
        .await?
        .ok_or(CoreError::NotFound)?;
    let owner = repo::user::fetch_by_id(pool, tracker.owner_id)
        .await?
        .ok_or_else(|| CoreError::Internal(anyhow::anyhow!("tracker owner missing")))?;

    let labels = repo::label::fetch_for_tracker(pool, tracker_id).await?;
    let label_names: HashMap<i64, String> = labels.iter().map(|l| (l.id, l.name.clone())).collect();

    let tickets = repo::ticket::fetch_for_tracker_ordered(pool, tracker_id).await?;
    let mut ticket_exports = Vec::with_capacity(tickets.len());

    for ticket in &tickets {
        let submitter = repo::user::fetch_by_id(pool, ticket.submitter_id)
            .await?
            .ok_or_else(|| CoreError::Internal(anyhow::anyhow!("ticket submitter missing")))?;

        let ticket_signature = sign_ticket(
            tracker_id,
            ticket.id,
            &ticket.title,
            ticket.description.as_deref().unwrap_or(""),
            ticket.submitter_id,
            origin,
            signing_key,
        )?;

        let events = repo::event::fetch_for_ticket(pool, ticket.id).await?;
        let mut event_exports = Vec::with_capacity(events.len());
        for event in &events {
            let author = repo::user::fetch_by_id(pool, event.user_id)
                .await?
                .ok_or_else(|| CoreError::Internal(anyhow::anyhow!("event author missing")))?;

            let comment_text = match event.comment_id {
                Some(comment_id) => repo::comment::fetch_by_id(pool, comment_id).await?.map(|c| c.text),
                None => None,
            };

            let signature = if event.event_type.contains(EventTypeSet::COMMENT) {
                comment_text
                    .as_deref()
                    .map(|text| sign_comment_event(tracker_id, event.ticket_id, text, event.user_id, origin, signing_key))
                    .transpose()?
            } else {
                None
            };

            let assignee = match event.assignee_id {
                Some(assignee_id) => repo::user::fetch_by_id(pool, assignee_id)
                    .await?
                    .map(|u| user_participant_export(&u)),
                None => None,
            };

            event_exports.push(EventExport {
                event_type: event.event_type.flag_names().into_iter().map(str::to_string).collect(),
                comment: comment_text,
                old_status: event.old_status,
                new_status: event.new_status,
                old_resolution: event.old_resolution,
                new_resolution: event.new_resolution,
                author: Some(user_participant_export(&author)),
                upstream: origin.to_string(),
                signature,
                created: event.created,
                from_ticket_id: event.from_ticket_id,
                label_name: event.label_id.and_then(|id| label_names.get(&id).cloned()),
                assignee,
            });
        }

        ticket_exports.push(TicketExport {
            id: ticket.id,
            scoped_id: ticket.scoped_id,
            title: ticket.title.clone(),
            description: ticket.description.clone(),
            status: ticket.status,
            resolution: ticket.resolution,
            submitter: user_participant_export(&submitter),
            upstream: origin.to_string(),
            signature: Some(ticket_signature),
            events: event_exports,
            created: ticket.created,
            updated: ticket.updated,
        });
    }

    Ok(TrackerExport {
        tracker_id,
        owner: owner.canonical_name(),
        name: tracker.name,
        labels: labels
            .iter()
            .map(|l| LabelExport {
                name: l.name.clone(),
                color: l.color.clone(),
                text_color: l.text_color.clone(),
            })
            .collect(),
        tickets: ticket_exports,
    })
}

/// Resolves a dump's participant sub-object into a local `Participant`
/// (§4.1/§4.7): `user` entries whose `upstream` matches our own origin are
/// looked up as local users; everything else becomes an `external`
/// participant keyed on the dump's identifier.
async fn resolve_import_participant(
    pool: &PgPool,
    participant: &ParticipantExport,
    item_upstream: &str,
    our_origin: &str,
) -> Result<Participant, CoreError> {
    match participant.kind.as_str() {
        "user" => {
            if item_upstream == our_origin {
                if let Some(user) = repo::user::fetch_by_username(pool, &participant.identifier).await? {
                    return repo::participant::for_user(pool, &user).await;
                }
            }
            repo::participant::for_external(pool, &participant.identifier, item_upstream).await
        }
        "email" => repo::participant::for_email(pool, &participant.identifier, participant.display_name.as_deref()).await,
        "external" => repo::participant::for_external(pool, &participant.identifier, item_upstream).await,
        other => Err(CoreError::Import(format!("unknown participant kind {other:?}"))),
    }
}

/// Outcome of an `import_dump` call — how many of the dump's tickets landed
/// versus were skipped (already present, or resolved to content this
/// schema cannot attribute — see DESIGN.md).
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportSummary {
    pub tickets_imported: usize,
    pub tickets_skipped: usize,
}

/// Replays a dump into `target_tracker`, which must already be flagged
/// `import_in_progress` (§4.7). The flag is cleared unconditionally — on
/// success and on failure — so the operation is observable as finished
/// either way.
#[tracing::instrument(skip(pool, doc, signing_key))]
pub async fn import_dump(
    pool: &PgPool,
    target_tracker: &Tracker,
    doc: &TrackerExport,
    origin: &str,
    signing_key: &Secret<String>,
) -> Result<ImportSummary, CoreError> {
    if !target_tracker.import_in_progress {
        return Err(CoreError::Import(
            "target tracker is not flagged import_in_progress".to_string(),
        ));
    }

    let result = run_import(pool, target_tracker, doc, origin, signing_key).await;

    let mut clear_tx = pool.begin().await.map_err(|e| {
        CoreError::Internal(anyhow::Error::new(e).context("beginning import-flag-clear transaction"))
    })?;
    repo::tracker::set_import_in_progress(&mut clear_tx, target_tracker.id, false).await?;
    clear_tx.commit().await.map_err(|e| {
        CoreError::Internal(anyhow::Error::new(e).context("clearing tracker.import_in_progress"))
    })?;

    result
}

async fn run_import(
    pool: &PgPool,
    target_tracker: &Tracker,
    doc: &TrackerExport,
    origin: &str,
    signing_key: &Secret<String>,
) -> Result<ImportSummary, CoreError> {
    let mut tx = pool.begin().await.map_err(|e| {
        CoreError::Internal(anyhow::Error::new(e).context("beginning import transaction"))
    })?;

    let mut label_ids: HashMap<String, i64> = repo::label::fetch_for_tracker(pool, target_tracker.id)
        .await?
        .into_iter()
        .map(|l| (l.name, l.id))
        .collect();
    for label in &doc.labels {
        if label_ids.contains_key(&label.name) {
            continue;
        }
        let created =
            repo::label::create(pool, target_tracker.id, &label.name, &label.color, &label.text_color).await?;
        label_ids.insert(label.name.clone(), created.id);
    }

    let mut sorted_tickets: Vec<&TicketExport> = doc.tickets.iter().collect();
    sorted_tickets.sort_by_key(|t| t.scoped_id);

    let mut imported_raw_to_local: HashMap<i64, i64> = HashMap::new();
    let mut summary = ImportSummary::default();

    for ticket_export in sorted_tickets {
        match import_one_ticket(
            pool,
            &mut tx,
            target_tracker.id,
            doc.tracker_id,
            ticket_export,
            origin,
            signing_key,
            &label_ids,
            &imported_raw_to_local,
        )
        .await
        {
            Ok(local_ticket_id) => {
                imported_raw_to_local.insert(ticket_export.id, local_ticket_id);
                summary.tickets_imported += 1;
            }
            Err(CoreError::Import(message)) => {
                tracing::warn!(scoped_id = ticket_export.scoped_id, %message, "skipping ticket during import");
                summary.tickets_skipped += 1;
            }
            Err(other) => return Err(other),
        }
    }

    tx.commit().await.map_err(|e| {
        CoreError::Internal(anyhow::Error::new(e).context("committing import transaction"))
    })?;

    Ok(summary)
}

#[allow(clippy::too_many_arguments)]
async fn import_one_ticket(
    pool: &PgPool,
    tx: &mut Transaction<'static, Postgres>,
    target_tracker_id: i64,
    export_tracker_id: i64,
    ticket_export: &TicketExport,
    origin: &str,
    signing_key: &Secret<String>,
    label_ids: &HashMap<String, i64>,
    imported_raw_to_local: &HashMap<i64, i64>,
) -> Result<i64, CoreError> {
    if let Some(existing) =
        repo::ticket::fetch_by_scoped_id_tx(tx, target_tracker_id, ticket_export.scoped_id).await?
    {
        return Ok(existing.id);
    }

    let submitter_participant = resolve_import_participant(pool, &ticket_export.submitter, &ticket_export.upstream, origin).await?;
    let Some(submitter_user) = submitter_participant.as_user() else {
        return Err(CoreError::Import(format!(
            "ticket {} submitter resolved to a non-local participant, which this schema cannot attribute tickets to",
            ticket_export.scoped_id
        )));
    };

    let ticket_authenticity = match &ticket_export.signature {
        None => TicketAuthenticity::Unauthenticated,
        Some(sig) => {
            let submitter_raw_id = ticket_export.submitter.raw_id.unwrap_or(submitter_user.id);
            let ok = verify_ticket_signature(
                export_tracker_id,
                ticket_export.id,
                &ticket_export.title,
                ticket_export.description.as_deref().unwrap_or(""),
                submitter_raw_id,
                &ticket_export.upstream,
                sig,
                signing_key,
            );
            authenticity_for_signature(Some(ok))
        }
    };

    let new_ticket = repo::ticket::insert(
        tx,
        target_tracker_id,
        ticket_export.scoped_id,
        submitter_user.id,
        &ticket_export.title,
        ticket_export.description.as_deref(),
        ticket_authenticity,
        Some(ticket_export.created),
    )
    .await?;
    repo::ticket::set_status(tx, new_ticket.id, ticket_export.status, ticket_export.resolution).await?;
    repo::ticket::set_updated(tx, new_ticket.id, ticket_export.updated).await?;

    for event_export in &ticket_export.events {
        import_one_event(
            pool,
            tx,
            new_ticket.id,
            export_tracker_id,
            event_export,
            origin,
            signing_key,
            label_ids,
            imported_raw_to_local,
        )
        .await;
    }

    let comment_count = repo::comment::count_current(tx, new_ticket.id).await?;
    repo::ticket::set_comment_count(tx, new_ticket.id, comment_count).await?;

    Ok(new_ticket.id)
}

/// Replays one event onto an already-inserted ticket. Per-event problems
/// (unknown event type, missing label, an assignee/author this schema
/// cannot attribute) are logged and skipped — they never fail the
/// surrounding ticket (§4.7, §7).
#[allow(clippy::too_many_arguments)]
async fn import_one_event(
    pool: &PgPool,
    tx: &mut Transaction<'static, Postgres>,
    local_ticket_id: i64,
    export_tracker_id: i64,
    event_export: &EventExport,
    origin: &str,
    signing_key: &Secret<String>,
    label_ids: &HashMap<String, i64>,
    imported_raw_to_local: &HashMap<i64, i64>,
) {
    if let Err(message) = try_import_one_event(
        pool,
        tx,
        local_ticket_id,
        export_tracker_id,
        event_export,
        origin,
        signing_key,
        label_ids,
        imported_raw_to_local,
    )
    .await
    {
        tracing::warn!(%message, "skipping event during import");
    }
}

#[allow(clippy::too_many_arguments)]
async fn try_import_one_event(
    pool: &PgPool,
    tx: &mut Transaction<'static, Postgres>,
    local_ticket_id: i64,
    export_tracker_id: i64,
    event_export: &EventExport,
    origin: &str,
    signing_key: &Secret<String>,
    label_ids: &HashMap<String, i64>,
    imported_raw_to_local: &HashMap<i64, i64>,
) -> Result<(), String> {
    let mut event_type = EventTypeSet::NONE;
    for name in &event_export.event_type {
        match EventTypeSet::from_name(name) {
            Some(flag) => event_type = event_type | flag,
            None => return Err(format!("unknown event type {name:?}")),
        }
    }
    if event_type.is_none() {
        return Err("event carries no recognized event type".to_string());
    }

    if event_type.contains(EventTypeSet::USER_MENTIONED) {
        return Ok(()); // derived notion, never imported (§4.7)
    }

    let mut from_ticket_id = None;
    if event_type.contains(EventTypeSet::TICKET_MENTIONED) {
        let Some(raw_from) = event_export.from_ticket_id else {
            return Err("ticket_mentioned event missing from_ticket_id".to_string());
        };
        match imported_raw_to_local.get(&raw_from) {
            Some(&local_id) => from_ticket_id = Some(local_id),
            None => return Ok(()), // referenced ticket not yet imported — drop (§4.7)
        }
    }

    let author = event_export
        .author
        .as_ref()
        .ok_or_else(|| "event missing author".to_string())?;
    let author_participant = resolve_import_participant(pool, author, &event_export.upstream, origin)
        .await
        .map_err(|e| e.to_string())?;
    let Some(author_user) = author_participant.as_user() else {
        return Err("event author resolved to a non-local participant".to_string());
    };

    let mut label_id = None;
    if event_type.contains(EventTypeSet::LABEL_ADDED) || event_type.contains(EventTypeSet::LABEL_REMOVED) {
        let Some(name) = &event_export.label_name else {
            return Err("label event missing label_name".to_string());
        };
        let Some(&id) = label_ids.get(name) else {
            return Err(format!("label {name:?} not found in imported label set"));
        };
        label_id = Some(id);
    }

    let mut assignee_id = None;
    if event_type.contains(EventTypeSet::ASSIGNED_USER) || event_type.contains(EventTypeSet::UNASSIGNED_USER) {
        let Some(assignee_export) = &event_export.assignee else {
            return Err("assignment event missing assignee".to_string());
        };
        let assignee_participant = resolve_import_participant(pool, assignee_export, &event_export.upstream, origin)
            .await
            .map_err(|e| e.to_string())?;
        let Some(assignee_user) = assignee_participant.as_user() else {
            return Err("assignee resolved to a non-local participant".to_string());
        };
        assignee_id = Some(assignee_user.id);
    }

    let comment_id = if event_type.contains(EventTypeSet::COMMENT) {
        let text = event_export
            .comment
            .as_deref()
            .ok_or_else(|| "comment event missing text".to_string())?;
        let authenticity = match &event_export.signature {
            None => TicketAuthenticity::Unauthenticated,
            Some(sig) => {
                let author_raw_id = author.raw_id.unwrap_or(author_user.id);
                let ok = verify_comment_signature(
                    export_tracker_id,
                    local_ticket_id,
                    text,
                    author_raw_id,
                    &event_export.upstream,
                    sig,
                    signing_key,
                );
                authenticity_for_signature(Some(ok))
            }
        };
        let comment = repo::comment::insert(
            tx,
            local_ticket_id,
            author_user.id,
            text,
            authenticity,
            Some(event_export.created),
        )
        .await
        .map_err(|e| e.to_string())?;
        Some(comment.id)
    } else {
        None
    };

    if label_id.is_some() {
        if event_type.contains(EventTypeSet::LABEL_ADDED) {
            repo::label::add(tx, local_ticket_id, label_id.expect("checked above"), author_user.id)
                .await
                .map_err(|e| e.to_string())?;
        } else {
            repo::label::remove(tx, local_ticket_id, label_id.expect("checked above"))
                .await
                .map_err(|e| e.to_string())?;
        }
    }

    if let Some(assignee_id) = assignee_id {
        if event_type.contains(EventTypeSet::ASSIGNED_USER) {
            repo::assignee::assign(tx, local_ticket_id, assignee_id, author_user.id)
                .await
                .map_err(|e| e.to_string())?;
        } else {
            repo::assignee::unassign(tx, local_ticket_id, assignee_id)
                .await
                .map_err(|e| e.to_string())?;
        }
    }

    repo::event::insert(
        tx,
        repo::event::NewEvent {
            event_type,
            ticket_id: local_ticket_id,
            user_id: author_user.id,
            comment_id,
            old_status: event_export.old_status,
            new_status: event_export.new_status,
            old_resolution: event_export.old_resolution,
            new_resolution: event_export.new_resolution,
            label_id,
            assignee_id,
            from_ticket_id,
            created: Some(event_export.created),
        },
    )
    .await
    .map_err(|e| e.to_string())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> Secret<String> {
        Secret::new("test-signing-key".to_string())
    }

    #[test]
    fn ticket_signature_round_trips() {
        let k = key();
        let sig = sign_ticket(1, 2, "crash on launch", "steps to repro", 7, "https://example.org", &k)
            .unwrap();
        assert!(verify_ticket_signature(
            1,
            2,
            "crash on launch",
            "steps to repro",
            7,
            "https://example.org",
            &sig,
            &k
        ));
    }

    #[test]
    fn tampering_any_field_invalidates_signature() {
        let k = key();
        let sig = sign_ticket(1, 2, "title", "body", 7, "https://example.org", &k).unwrap();
        assert!(!verify_ticket_signature(
            1,
            2,
            "a different title",
            "body",
            7,
            "https://example.org",
            &sig,
            &k
        ));
    }

    #[test]
    fn comment_signature_round_trips() {
        let k = key();
        let sig = sign_comment_event(1, 2, "looks good", 9, "https://example.org", &k).unwrap();
        assert!(verify_comment_signature(
            1,
            2,
            "looks good",
            9,
            "https://example.org",
            &sig,
            &k
        ));
    }

    #[test]
    fn authenticity_mapping() {
        assert_eq!(authenticity_for_signature(None), TicketAuthenticity::Unauthenticated);
        assert_eq!(authenticity_for_signature(Some(true)), TicketAuthenticity::Authentic);
        assert_eq!(authenticity_for_signature(Some(false)), TicketAuthenticity::Tampered);
    }

    #[test]
    fn gzip_round_trips() {
        let doc = TrackerExport {
            tracker_id: 1,
            owner: "~alice".into(),
            name: "bugs".into(),
            labels: vec![],
            tickets: vec![],
        };
        let encoded = encode_export(&doc).unwrap();
        let decoded = decode_export(&encoded).unwrap();
        assert_eq!(decoded.name, "bugs");
    }

    #[test]
    fn malformed_dump_is_import_error_not_panic() {
        let err = decode_export(b"not gzip at all").unwrap_err();
        assert!(matches!(err, CoreError::Import(_)));
    }

    #[test]
    fn user_participant_export_carries_raw_id() {
        let user = crate::domain::User {
            id: 42,
            username: "alice".into(),
            notify_self: true,
            created: Utc::now(),
        };
        let exported = user_participant_export(&user);
        assert_eq!(exported.kind, "user");
        assert_eq!(exported.identifier, "alice");
        assert_eq!(exported.raw_id, Some(42));
    }
}
