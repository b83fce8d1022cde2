//! Ticket lifecycle engine (`spec.md` §4.4 — "the single most important
//! contract"). One public operation, `apply`, plus the closely related
//! `submit_ticket`/`assign`/`unassign`/`set_labels`/`edit_comment`
//! operations the original groups in the same module
//! (`original_source/tickets.py`). Callers are responsible for the access
//! check (§4.2) before calling in — this module trusts its `actor`
//! parameter.

use sqlx::PgPool;

use crate::domain::comment::validate_text;
use crate::domain::Event;
use crate::domain::EventTypeSet;
use crate::domain::Participant;
use crate::domain::SubscriptionScope;
use crate::domain::Ticket;
use crate::domain::TicketAssignee;
use crate::domain::TicketAuthenticity;
use crate::domain::TicketComment;
use crate::domain::TicketResolution;
use crate::domain::TicketStatus;
use crate::domain::Tracker;
use crate::domain::User;
use crate::domain::WebhookEvent;
use crate::dispatch;
use crate::dispatch::EmailOutboxItem;
use crate::dispatch::WebhookOutboxItem;
use crate::error::CoreError;
use crate::mentions;
use crate::mentions::TicketMentionRef;
use crate::notify;
use crate::notify::EmailEnvelope;
use crate::notify::EnvelopeContext;
use crate::repo;
use crate::repo::event::NewEvent;

/// Runtime configuration the engine needs to build notification envelopes;
/// a narrowed view of `crate::configuration::Settings`.
#[derive(Debug, Clone)]
pub struct EngineContext<'a> {
    pub pool: &'a PgPool,
    pub origin: &'a str,
    pub posting_domain: &'a str,
    pub notify_from: &'a str,
}

#[derive(Debug, Clone, Default)]
pub struct ApplyInput {
    pub text: Option<String>,
    pub resolve: bool,
    pub resolution: Option<TicketResolution>,
    pub reopen: bool,
    pub from_email: bool,
}

#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    pub event: Event,
    pub comment: Option<TicketComment>,
    pub emails: Vec<EmailOutboxItem>,
}

fn validate_apply_input(input: &ApplyInput) -> Result<(), CoreError> {
    if input.text.is_none() && !input.resolve && !input.reopen {
        return Err(CoreError::validation(
            "input",
            "one of text, resolve, reopen must be set",
        ));
    }
    if input.resolve && input.reopen {
        return Err(CoreError::validation(
            "input",
            "resolve and reopen are mutually exclusive",
        ));
    }
    if input.resolve && input.resolution.is_none() {
        return Err(CoreError::validation(
            "resolution",
            "resolution is required when resolve is set",
        ));
    }
    if let Some(text) = &input.text {
        validate_text(text)?;
    }
    Ok(())
}

/// The central operation: comment, status transition, event emission,
/// notification fan-out, and mention handling in one transaction (§4.4
/// steps 1-7); webhook/email enqueue happens after commit (step 8).
#[tracing::instrument(skip(ctx, actor, tracker, ticket, input))]
pub async fn apply(
    ctx: &EngineContext<'_>,
    actor: &User,
    tracker: &Tracker,
    ticket: &Ticket,
    input: ApplyInput,
) -> Result<Option<ApplyOutcome>, CoreError> {
    validate_apply_input(&input)?;

    let mut tx = ctx.pool.begin().await.map_err(|e| {
        CoreError::Internal(anyhow::Error::new(e).context("beginning apply transaction"))
    })?;

    let locked_ticket = repo::ticket::fetch_for_update(&mut tx, ticket.id).await?;

    let comment = if let Some(text) = &input.text {
        let comment = repo::comment::insert(
            &mut tx,
            locked_ticket.id,
            actor.id,
            text,
            TicketAuthenticity::Authentic,
            None,
        )
        .await?;
        repo::ticket::increment_comment_count(&mut tx, locked_ticket.id).await?;
        Some(comment)
    } else {
        None
    };

    let old_status = locked_ticket.status;
    let old_resolution = locked_ticket.resolution;
    let (new_status, new_resolution) = if input.resolve {
        (TicketStatus::Resolved, input.resolution.expect("validated above"))
    } else if input.reopen {
        (TicketStatus::Reported, old_resolution)
    } else {
        (old_status, old_resolution)
    };

    let status_changed = (new_status, new_resolution) != (old_status, old_resolution);
    if status_changed {
        repo::ticket::set_status(&mut tx, locked_ticket.id, new_status, new_resolution).await?;
    }

    let mut event_type = EventTypeSet::NONE;
    if comment.is_some() {
        event_type = event_type | EventTypeSet::COMMENT;
    }
    if status_changed {
        event_type = event_type | EventTypeSet::STATUS_CHANGE;
    }

    if event_type.is_none() {
        tx.rollback().await.map_err(|e| {
            CoreError::Internal(anyhow::Error::new(e).context("rolling back no-op apply"))
        })?;
        return Ok(None);
    }

    let event = repo::event::insert(
        &mut tx,
        NewEvent {
            event_type,
            ticket_id: locked_ticket.id,
            user_id: actor.id,
            comment_id: comment.as_ref().map(|c| c.id),
            old_status: status_changed.then_some(old_status),
            new_status: status_changed.then_some(new_status),
            old_resolution: status_changed.then_some(old_resolution),
            new_resolution: status_changed.then_some(new_resolution),
            ..Default::default()
        },
    )
    .await?;

    let no_autoupdate = tracker.import_in_progress;
    repo::ticket::touch_updated(&mut tx, locked_ticket.id, no_autoupdate).await?;
    repo::tracker::touch_updated(&mut tx, tracker.id, no_autoupdate).await?;

    let actor_participant = repo::participant::for_user(ctx.pool, actor).await?;

    // Auto-subscribe the actor if they aren't already a subscriber.
    repo::subscription::get_or_create(&mut tx, actor_participant.id, SubscriptionScope::Ticket(locked_ticket.id))
        .await?;

    let mention_refs = comment
        .as_ref()
        .map(|c| mentions::parse_mentions(&c.text, ctx.origin))
        .unwrap_or_default();

    let mut mention_events = Vec::new();
    for username in &mention_refs.usernames {
        let Some(mentioned_user) = repo::user::fetch_by_username(ctx.pool, username).await? else {
            continue;
        };
        if mentioned_user.id == actor.id && !mentioned_user.notify_self {
            continue;
        }
        let mentioned_participant = repo::participant::for_user(ctx.pool, &mentioned_user).await?;
        let already_subscribed = repo::subscription::exists(
            &mut tx,
            mentioned_participant.id,
            SubscriptionScope::Ticket(locked_ticket.id),
        )
        .await?
            || repo::subscription::exists(
                &mut tx,
                mentioned_participant.id,
                SubscriptionScope::Tracker(tracker.id),
            )
            .await?;
        if !already_subscribed {
            repo::subscription::insert(
                &mut tx,
                mentioned_participant.id,
                SubscriptionScope::Ticket(locked_ticket.id),
            )
            .await?;
        }
        let mention_event = repo::event::insert(
            &mut tx,
            NewEvent {
                event_type: EventTypeSet::USER_MENTIONED,
                ticket_id: locked_ticket.id,
                user_id: mentioned_user.id,
                comment_id: comment.as_ref().map(|c| c.id),
                ..Default::default()
            },
        )
        .await?;
        mention_events.push(mention_event);
    }

    for ticket_ref in &mention_refs.tickets {
        let Some(resolved) = resolve_ticket_mention(ctx.pool, tracker, ticket_ref).await? else {
            continue;
        };
        if resolved.id == locked_ticket.id {
            continue;
        }
        let mention_event = repo::event::insert(
            &mut tx,
            NewEvent {
                event_type: EventTypeSet::TICKET_MENTIONED,
                ticket_id: resolved.id,
                user_id: actor.id,
                from_ticket_id: Some(locked_ticket.id),
                ..Default::default()
            },
        )
        .await?;
        mention_events.push(mention_event);
    }

    tx.commit().await.map_err(|e| {
        CoreError::Internal(anyhow::Error::new(e).context("committing apply transaction"))
    })?;

    let emails = fan_out_notifications(
        ctx,
        tracker,
        &locked_ticket,
        &event,
        &actor_participant,
        comment.is_some(),
        input.from_email,
    )
    .await?;

    for email in &emails {
        dispatch::enqueue_email(ctx.pool, email).await?;
    }
    fan_out_webhooks(ctx, tracker, &locked_ticket, &event, WebhookEvent::EventCreate).await?;

    Ok(Some(ApplyOutcome {
        event,
        comment,
        emails,
    }))
}

async fn resolve_ticket_mention(
    pool: &PgPool,
    current_tracker: &Tracker,
    reference: &TicketMentionRef,
) -> Result<Option<Ticket>, CoreError> {
    match reference {
        TicketMentionRef::Bare { scoped_id } => {
            repo::ticket::fetch_by_scoped_id(pool, current_tracker.id, *scoped_id).await
        }
        TicketMentionRef::Named { tracker_name, scoped_id } => {
            let Some(sibling) = repo::tracker::fetch_by_owner_and_name(
                pool,
                current_tracker.owner_id,
                tracker_name,
            )
            .await?
            else {
                return Ok(None);
            };
            repo::ticket::fetch_by_scoped_id(pool, sibling.id, *scoped_id).await
        }
        TicketMentionRef::Qualified {
            username,
            tracker_name,
            scoped_id,
        } => {
            let Some(owner) = repo::user::fetch_by_username(pool, username).await? else {
                return Ok(None);
            };
            let Some(target_tracker) =
                repo::tracker::fetch_by_owner_and_name(pool, owner.id, tracker_name).await?
            else {
                return Ok(None);
            };
            repo::ticket::fetch_by_scoped_id(pool, target_tracker.id, *scoped_id).await
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn fan_out_notifications(
    ctx: &EngineContext<'_>,
    tracker: &Tracker,
    ticket: &Ticket,
    event: &Event,
    actor: &Participant,
    is_reply: bool,
    from_email: bool,
) -> Result<Vec<EmailOutboxItem>, CoreError> {
    if !notify::is_notifiable(event) {
        return Ok(Vec::new());
    }

    let tracker_subs = repo::subscription::fetch_for_tracker(ctx.pool, tracker.id).await?;
    let ticket_subs = repo::subscription::fetch_for_ticket(ctx.pool, ticket.id).await?;
    let subscriber_ids = notify::resolve_subscribers(&tracker_subs, &ticket_subs);

    let tracker_owner = repo::user::fetch_by_id(ctx.pool, tracker.owner_id)
        .await?
        .ok_or_else(|| CoreError::Internal(anyhow::anyhow!("tracker owner missing")))?;

    let mut emails = Vec::new();
    for participant_id in subscriber_ids {
        let Some(participant) = repo::participant::fetch_by_id(ctx.pool, participant_id).await? else {
            continue;
        };
        if participant.as_user().is_some() {
            repo::event_notification::insert(ctx.pool, event.id, participant.id).await?;
        }
        let actor_notify_self = participant
            .as_user()
            .map(|u| u.notify_self)
            .unwrap_or(false);
        if !notify::should_email(&participant, actor, actor_notify_self, from_email) {
            continue;
        }
        let envelope = EmailEnvelope::build(
            &notify::participant_display_name(actor),
            &EnvelopeContext {
                posting_domain: ctx.posting_domain,
                notify_from: ctx.notify_from,
                tracker_owner: &tracker_owner.username,
                tracker_name: &tracker.name,
                scoped_id: ticket.scoped_id,
                title: &ticket.title,
                is_reply,
                subscription_scope: SubscriptionScope::Ticket(ticket.id),
            },
        );
        emails.push(EmailOutboxItem {
            participant_id: participant.id,
            event_id: event.id,
            envelope: (&envelope).into(),
            template: "ticket_event".to_string(),
        });
    }
    Ok(emails)
}

/// Enqueues one webhook delivery per subscription registered on `tracker`
/// or `ticket` that matches `webhook_event` (§4.4 step 8). Unlike email
/// fan-out, webhook matching needs no subscriber resolution — the
/// `webhook_subscriptions` row names its own trigger events directly.
#[tracing::instrument(skip(ctx, tracker, ticket, event))]
async fn fan_out_webhooks(
    ctx: &EngineContext<'_>,
    tracker: &Tracker,
    ticket: &Ticket,
    event: &Event,
    webhook_event: WebhookEvent,
) -> Result<(), CoreError> {
    let tracker_subs =
        repo::webhook_subscription::fetch_matching_tracker(ctx.pool, tracker.id, webhook_event).await?;
    let ticket_subs =
        repo::webhook_subscription::fetch_matching_ticket(ctx.pool, ticket.id, webhook_event).await?;

    for subscription in tracker_subs.into_iter().chain(ticket_subs) {
        let payload = dispatch::build_ticket_webhook_payload(webhook_event, ticket, event);
        dispatch::enqueue_webhook(
            ctx.pool,
            &WebhookOutboxItem {
                subscription_id: subscription.id,
                event_id: event.id,
                payload,
            },
        )
        .await?;
    }
    Ok(())
}

/// Submits a new ticket (§4.4, "a separate operation with a similar
/// shape"). Retries scoped_id allocation on a unique-violation, which can
/// only happen if a concurrent submitter raced us between the row lock
/// being released by a prior transaction and our own lock acquisition.
#[tracing::instrument(skip(ctx, actor, tracker, title, description))]
pub async fn submit_ticket(
    ctx: &EngineContext<'_>,
    actor: &User,
    tracker: &Tracker,
    title: &str,
    description: Option<&str>,
) -> Result<Ticket, CoreError> {
    crate::domain::ticket::validate_title(title)?;
    if let Some(description) = description {
        crate::domain::ticket::validate_description(description)?;
    }

    const MAX_ATTEMPTS: u32 = 3;
    let mut attempts = 0;

    loop {
        attempts += 1;
        let mut tx = ctx.pool.begin().await.map_err(|e| {
            CoreError::Internal(anyhow::Error::new(e).context("beginning submit transaction"))
        })?;

        let _locked = repo::tracker::fetch_for_update(&mut tx, tracker.id).await?;
        let scoped_id = repo::tracker::allocate_next_ticket_id(&mut tx, tracker.id).await?;

        let insert_result = repo::ticket::insert(
            &mut tx,
            tracker.id,
            scoped_id,
            actor.id,
            title,
            description,
            TicketAuthenticity::Authentic,
            None,
        )
        .await;

        let ticket = match insert_result {
            Ok(ticket) => ticket,
            Err(CoreError::Integrity { .. }) if attempts < MAX_ATTEMPTS => {
                tx.rollback().await.ok();
                continue;
            }
            Err(CoreError::Integrity { .. }) => return Err(CoreError::Conflict { attempts }),
            Err(other) => return Err(other),
        };

        let event = repo::event::insert(
            &mut tx,
            NewEvent {
                event_type: EventTypeSet::CREATED,
                ticket_id: ticket.id,
                user_id: actor.id,
                ..Default::default()
            },
        )
        .await?;

        let actor_participant = repo::participant::for_user(ctx.pool, actor).await?;
        repo::subscription::get_or_create(
            &mut tx,
            actor_participant.id,
            SubscriptionScope::Tracker(tracker.id),
        )
        .await?;

        repo::tracker::touch_updated(&mut tx, tracker.id, tracker.import_in_progress).await?;

        tx.commit().await.map_err(|e| {
            CoreError::Internal(anyhow::Error::new(e).context("committing submit transaction"))
        })?;

        let emails = fan_out_notifications(
            ctx,
            tracker,
            &ticket,
            &event,
            &actor_participant,
            false,
            false,
        )
        .await?;
        for email in &emails {
            dispatch::enqueue_email(ctx.pool, email).await?;
        }
        fan_out_webhooks(ctx, tracker, &ticket, &event, WebhookEvent::TicketCreate).await?;
        let user_subs =
            repo::webhook_subscription::fetch_matching_user(ctx.pool, tracker.owner_id, WebhookEvent::TicketCreate)
                .await?;
        for subscription in user_subs {
            let payload = dispatch::build_ticket_webhook_payload(WebhookEvent::TicketCreate, &ticket, &event);
            dispatch::enqueue_webhook(
                ctx.pool,
                &WebhookOutboxItem {
                    subscription_id: subscription.id,
                    event_id: event.id,
                    payload,
                },
            )
            .await?;
        }

        return Ok(ticket);
    }
}

/// Idempotent: a repeated `assign` yields one `TicketAssignee` row and one
/// `assigned_user` event (§8).
#[tracing::instrument(skip(ctx))]
pub async fn assign(
    ctx: &EngineContext<'_>,
    ticket_id: i64,
    assignee: &User,
    assigner: &User,
) -> Result<Option<TicketAssignee>, CoreError> {
    let mut tx = ctx.pool.begin().await.map_err(|e| {
        CoreError::Internal(anyhow::Error::new(e).context("beginning assign transaction"))
    })?;

    let created = repo::assignee::assign(&mut tx, ticket_id, assignee.id, assigner.id).await?;
    if let Some(assignee_row) = &created {
        repo::event::insert(
            &mut tx,
            NewEvent {
                event_type: EventTypeSet::ASSIGNED_USER,
                ticket_id,
                user_id: assigner.id,
                assignee_id: Some(assignee_row.assignee_id),
                ..Default::default()
            },
        )
        .await?;
    }

    tx.commit().await.map_err(|e| {
        CoreError::Internal(anyhow::Error::new(e).context("committing assign transaction"))
    })?;

    Ok(created)
}

#[tracing::instrument(skip(ctx))]
pub async fn unassign(
    ctx: &EngineContext<'_>,
    ticket_id: i64,
    assignee: &User,
    actor: &User,
) -> Result<bool, CoreError> {
    let mut tx = ctx.pool.begin().await.map_err(|e| {
        CoreError::Internal(anyhow::Error::new(e).context("beginning unassign transaction"))
    })?;

    let removed = repo::assignee::unassign(&mut tx, ticket_id, assignee.id).await?;
    if removed {
        repo::event::insert(
            &mut tx,
            NewEvent {
                event_type: EventTypeSet::UNASSIGNED_USER,
                ticket_id,
                user_id: actor.id,
                assignee_id: Some(assignee.id),
                ..Default::default()
            },
        )
        .await?;
    }

    tx.commit().await.map_err(|e| {
        CoreError::Internal(anyhow::Error::new(e).context("committing unassign transaction"))
    })?;

    Ok(removed)
}

/// Records that `user` has viewed `ticket_id`, bumping `last_view` if a row
/// already exists (`original_source/tickets.py::mark_seen`). Not an
/// `Event`-producing operation — it's read state, not activity.
#[tracing::instrument(skip(ctx))]
pub async fn mark_seen(
    ctx: &EngineContext<'_>,
    ticket_id: i64,
    user: &User,
) -> Result<crate::domain::TicketSeen, CoreError> {
    repo::seen::mark_seen(ctx.pool, user.id, ticket_id).await
}

/// Diff-based label update (§6 "setting labels is diff-based"): the new set
/// replaces the old one, emitting `label_added`/`label_removed` events for
/// the difference.
#[tracing::instrument(skip(ctx, desired_label_ids))]
pub async fn set_labels(
    ctx: &EngineContext<'_>,
    ticket_id: i64,
    actor: &User,
    desired_label_ids: &[i64],
) -> Result<(), CoreError> {
    let current = repo::label::fetch_for_ticket(ctx.pool, ticket_id).await?;
    let current_ids: std::collections::HashSet<i64> = current.iter().map(|l| l.label_id).collect();
    let desired_ids: std::collections::HashSet<i64> = desired_label_ids.iter().copied().collect();

    let mut tx = ctx.pool.begin().await.map_err(|e| {
        CoreError::Internal(anyhow::Error::new(e).context("beginning set_labels transaction"))
    })?;

    for &label_id in desired_ids.difference(&current_ids) {
        if repo::label::add(&mut tx, ticket_id, label_id, actor.id).await? {
            repo::event::insert(
                &mut tx,
                NewEvent {
                    event_type: EventTypeSet::LABEL_ADDED,
                    ticket_id,
                    user_id: actor.id,
                    label_id: Some(label_id),
                    ..Default::default()
                },
            )
            .await?;
        }
    }

    for &label_id in current_ids.difference(&desired_ids) {
        if repo::label::remove(&mut tx, ticket_id, label_id).await? {
            repo::event::insert(
                &mut tx,
                NewEvent {
                    event_type: EventTypeSet::LABEL_REMOVED,
                    ticket_id,
                    user_id: actor.id,
                    label_id: Some(label_id),
                    ..Default::default()
                },
            )
            .await?;
        }
    }

    tx.commit().await.map_err(|e| {
        CoreError::Internal(anyhow::Error::new(e).context("committing set_labels transaction"))
    })?;

    Ok(())
}

/// Non-destructive comment edit (§4.4): inserts a new row, points the old
/// row's `superceeded_by_id` at it. If the editor isn't the original
/// submitter, the new comment's authenticity is `edited_by_other` rather
/// than carrying over the original's `authentic` state (§9 redesign note).
#[tracing::instrument(skip(ctx, new_text))]
pub async fn edit_comment(
    ctx: &EngineContext<'_>,
    comment_id: i64,
    editor: &User,
    new_text: &str,
) -> Result<TicketComment, CoreError> {
    validate_text(new_text)?;

    let mut tx = ctx.pool.begin().await.map_err(|e| {
        CoreError::Internal(anyhow::Error::new(e).context("beginning edit transaction"))
    })?;

    let original = repo::comment::fetch_for_update(&mut tx, comment_id).await?;
    let authenticity = if editor.id == original.submitter_id {
        TicketAuthenticity::Authentic
    } else {
        TicketAuthenticity::EditedByOther
    };

    let replacement = repo::comment::insert(
        &mut tx,
        original.ticket_id,
        editor.id,
        new_text,
        authenticity,
        None,
    )
    .await?;
    repo::comment::set_superceeded_by(&mut tx, original.id, replacement.id).await?;

    tx.commit().await.map_err(|e| {
        CoreError::Internal(anyhow::Error::new(e).context("committing edit transaction"))
    })?;

    Ok(replacement)
}
