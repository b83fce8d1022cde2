use tracker_core::domain::EventTypeSet;
use tracker_core::domain::TicketResolution;
use tracker_core::domain::TicketStatus;
use tracker_core::lifecycle;
use tracker_core::lifecycle::ApplyInput;
use tracker_core::lifecycle::EngineContext;

use crate::helpers::create_tracker;
use crate::helpers::insert_random_user;
use crate::helpers::insert_user;
use crate::helpers::test_pool;

fn ctx(pool: &sqlx::PgPool) -> EngineContext<'_> {
    EngineContext {
        pool,
        origin: "https://tracker.example.org",
        posting_domain: "tracker.example.org",
        notify_from: "notify@tracker.example.org",
    }
}

#[tokio::test]
async fn submitting_a_ticket_allocates_a_scoped_id_and_emits_a_created_event() {
    let pool = test_pool().await;
    let owner = insert_user(&pool, "owner").await;
    let tracker = create_tracker(&pool, &owner, "widgets").await;

    let ticket = lifecycle::submit_ticket(&ctx(&pool), &owner, &tracker, "Widgets are broken", None)
        .await
        .unwrap();

    assert_eq!(ticket.scoped_id, 1);
    assert_eq!(ticket.status, TicketStatus::Reported);
    assert_eq!(ticket.reference(&tracker.name), "widgets#1");
}

#[tokio::test]
async fn a_second_submission_allocates_the_next_scoped_id() {
    let pool = test_pool().await;
    let owner = insert_user(&pool, "owner").await;
    let tracker = create_tracker(&pool, &owner, "widgets").await;

    lifecycle::submit_ticket(&ctx(&pool), &owner, &tracker, "First", None)
        .await
        .unwrap();
    let second = lifecycle::submit_ticket(&ctx(&pool), &owner, &tracker, "Second", None)
        .await
        .unwrap();

    assert_eq!(second.scoped_id, 2);
}

#[tokio::test]
async fn resolving_a_ticket_sets_status_and_resolution_and_emits_one_event() {
    let pool = test_pool().await;
    let owner = insert_user(&pool, "owner").await;
    let tracker = create_tracker(&pool, &owner, "widgets").await;
    let ticket = lifecycle::submit_ticket(&ctx(&pool), &owner, &tracker, "Broken", None)
        .await
        .unwrap();

    let outcome = lifecycle::apply(
        &ctx(&pool),
        &owner,
        &tracker,
        &ticket,
        ApplyInput {
            resolve: true,
            resolution: Some(TicketResolution::Fixed),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .expect("status change is not a no-op");

    assert!(outcome.event.event_type.contains(EventTypeSet::STATUS_CHANGE));
    assert_eq!(outcome.event.new_status, Some(TicketStatus::Resolved));
    assert_eq!(outcome.event.new_resolution, Some(TicketResolution::Fixed));
    assert!(outcome.comment.is_none());
}

#[tokio::test]
async fn apply_with_no_text_and_no_status_change_is_a_no_op() {
    let pool = test_pool().await;
    let owner = insert_user(&pool, "owner").await;
    let tracker = create_tracker(&pool, &owner, "widgets").await;
    let ticket = lifecycle::submit_ticket(&ctx(&pool), &owner, &tracker, "Broken", None)
        .await
        .unwrap();

    // Re-confirming an already-`Reported` ticket flips no bits, so apply
    // returns `Ok(None)` rather than emitting an empty event (§4.4 step 4).
    let outcome = lifecycle::apply(
        &ctx(&pool),
        &owner,
        &tracker,
        &ticket,
        ApplyInput {
            reopen: true,
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert!(outcome.is_none());
}

#[tokio::test]
async fn commenting_with_a_user_mention_emits_a_mention_event() {
    let pool = test_pool().await;
    let owner = insert_user(&pool, "owner").await;
    let bystander = insert_random_user(&pool).await;
    let tracker = create_tracker(&pool, &owner, "widgets").await;
    let ticket = lifecycle::submit_ticket(&ctx(&pool), &owner, &tracker, "Broken", None)
        .await
        .unwrap();

    let outcome = lifecycle::apply(
        &ctx(&pool),
        &owner,
        &tracker,
        &ticket,
        ApplyInput {
            text: Some(format!("cc ~{}", bystander.username)),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .expect("a comment is never a no-op");

    assert!(outcome.comment.is_some());
    // The mention fan-out emits its own `user_mentioned` event in addition
    // to the `comment` event returned directly (§4.4 step 6).
    let mention_events = sqlx::query!(
        r#"SELECT id FROM events WHERE ticket_id = $1 AND event_type & $2 != 0"#,
        ticket.id,
        EventTypeSet::USER_MENTIONED.as_i32(),
    )
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(mention_events.len(), 1);
}

#[tokio::test]
async fn assigning_a_ticket_is_idempotent() {
    let pool = test_pool().await;
    let owner = insert_user(&pool, "owner").await;
    let assignee = insert_user(&pool, "dev").await;
    let tracker = create_tracker(&pool, &owner, "widgets").await;
    let ticket = lifecycle::submit_ticket(&ctx(&pool), &owner, &tracker, "Broken", None)
        .await
        .unwrap();

    let first = lifecycle::assign(&ctx(&pool), ticket.id, &assignee, &owner)
        .await
        .unwrap();
    assert!(first.is_some());

    let second = lifecycle::assign(&ctx(&pool), ticket.id, &assignee, &owner)
        .await
        .unwrap();
    assert!(second.is_none(), "re-assigning the same user must not emit a second event");
}

#[tokio::test]
async fn marking_a_ticket_seen_twice_updates_rather_than_duplicates() {
    let pool = test_pool().await;
    let owner = insert_user(&pool, "owner").await;
    let tracker = create_tracker(&pool, &owner, "widgets").await;
    let ticket = lifecycle::submit_ticket(&ctx(&pool), &owner, &tracker, "Broken", None)
        .await
        .unwrap();

    let first = lifecycle::mark_seen(&ctx(&pool), ticket.id, &owner).await.unwrap();
    let second = lifecycle::mark_seen(&ctx(&pool), ticket.id, &owner).await.unwrap();

    assert_eq!(first.id, second.id);
    assert!(second.last_view >= first.last_view);
}
