//! Outbound email & webhook dispatch interface (`spec.md` §1, §4.5, §5 —
//! "outbound email transport and webhook HTTP delivery worker" are
//! explicitly out of scope). The core only enqueues; a separate worker
//! process dequeues and delivers, mirroring the teacher's
//! `issue_delivery_queue` / `delivery::try_send_email` split in
//! `src/delivery.rs`, generalized to two outbox tables and without the
//! dequeue/send half (that half lives outside this crate).

use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::Event;
use crate::domain::Ticket;
use crate::domain::WebhookEvent;
use crate::error::CoreError;
use crate::notify::EmailEnvelope;

/// A queued outbound email. `template` names the transport-side template;
/// the core never renders HTML/text bodies itself (§4.5: "does not render
/// or transport email").
#[derive(Debug, Clone, Serialize)]
pub struct EmailOutboxItem {
    pub participant_id: i64,
    pub event_id: i64,
    pub envelope: EmailEnvelopeDto,
    pub template: String,
}

/// `serde`-friendly mirror of `EmailEnvelope` (outbox rows store it as
/// `jsonb`; the domain type itself carries no `Serialize` derive since
/// nothing else in the core needs it serialized).
#[derive(Debug, Clone, Serialize)]
pub struct EmailEnvelopeDto {
    pub from_display_name: String,
    pub from_address: String,
    pub subject: String,
    pub message_id: String,
    pub in_reply_to: Option<String>,
    pub reply_to: String,
    pub list_unsubscribe: String,
}

impl From<&EmailEnvelope> for EmailEnvelopeDto {
    fn from(e: &EmailEnvelope) -> Self {
        Self {
            from_display_name: e.from_display_name.clone(),
            from_address: e.from_address.clone(),
            subject: e.subject.clone(),
            message_id: e.message_id.clone(),
            in_reply_to: e.in_reply_to.clone(),
            reply_to: e.reply_to.clone(),
            list_unsubscribe: e.list_unsubscribe.clone(),
        }
    }
}

/// A queued outbound webhook delivery for one subscription.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookOutboxItem {
    pub subscription_id: i64,
    pub event_id: i64,
    pub payload: serde_json::Value,
}

/// `serde`-friendly mirror of `Ticket` for webhook payloads (§6 "the JSON
/// form of the primary entity changed").
#[derive(Debug, Clone, Serialize)]
pub struct TicketDto {
    pub id: i64,
    pub tracker_id: i64,
    pub scoped_id: i64,
    pub submitter_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: crate::domain::TicketStatus,
    pub resolution: crate::domain::TicketResolution,
    pub comment_count: i64,
}

impl From<&Ticket> for TicketDto {
    fn from(t: &Ticket) -> Self {
        Self {
            id: t.id,
            tracker_id: t.tracker_id,
            scoped_id: t.scoped_id,
            submitter_id: t.submitter_id,
            title: t.title.clone(),
            description: t.description.clone(),
            status: t.status,
            resolution: t.resolution,
            comment_count: t.comment_count,
        }
    }
}

/// Builds the JSON payload for a ticket-scoped webhook delivery: the
/// changed ticket plus the per-subscription event enum indicating the
/// trigger (§6 "delivery is at-least-once; consumers must tolerate
/// duplicates keyed by delivery UUID" — the UUID itself lives on the
/// outbox row, not the payload).
pub fn build_ticket_webhook_payload(webhook_event: WebhookEvent, ticket: &Ticket, event: &Event) -> serde_json::Value {
    serde_json::json!({
        "event": webhook_event.as_str(),
        "ticket": TicketDto::from(ticket),
        "event_id": event.id,
    })
}

/// Enqueues one email delivery task. Called **after** the lifecycle
/// transaction commits (§5 ordering guarantee) — takes a bare `&PgPool`,
/// never a `Transaction`, so a crash between commit and enqueue is visible
/// as a gap rather than a silently-rolled-back side effect.
#[tracing::instrument(skip_all, fields(participant_id = item.participant_id, event_id = item.event_id))]
pub async fn enqueue_email(pool: &PgPool, item: &EmailOutboxItem) -> Result<Uuid, CoreError> {
    let id = Uuid::new_v4();
    let envelope = serde_json::to_value(&item.envelope)
        .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("serializing envelope")))?;
    sqlx::query!(
        r#"
        INSERT INTO email_outbox (id, participant_id, event_id, envelope, template)
        VALUES ($1, $2, $3, $4, $5)
        "#,
        id,
        item.participant_id,
        item.event_id,
        envelope,
        item.template,
    )
    .execute(pool)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("enqueuing email")))?;
    Ok(id)
}

/// Enqueues one webhook delivery task.
#[tracing::instrument(skip_all, fields(subscription_id = item.subscription_id, event_id = item.event_id))]
pub async fn enqueue_webhook(pool: &PgPool, item: &WebhookOutboxItem) -> Result<Uuid, CoreError> {
    let id = Uuid::new_v4();
    sqlx::query!(
        r#"
        INSERT INTO webhook_outbox (id, subscription_id, event_id, payload)
        VALUES ($1, $2, $3, $4)
        "#,
        id,
        item.subscription_id,
        item.event_id,
        item.payload,
    )
    .execute(pool)
    .await
    .map_err(|e| CoreError::Internal(anyhow::Error::new(e).context("enqueuing webhook")))?;
    Ok(id)
}
