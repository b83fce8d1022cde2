use secrecy::Secret;
use tracker_core::admin;
use tracker_core::domain::WebhookEvent;
use tracker_core::domain::WebhookScope;
use tracker_core::lifecycle;

use crate::helpers::create_tracker;
use crate::helpers::insert_user;
use crate::helpers::test_pool;

fn ctx(pool: &sqlx::PgPool) -> lifecycle::EngineContext<'_> {
    lifecycle::EngineContext {
        pool,
        origin: "https://tracker.example.org",
        posting_domain: "tracker.example.org",
        notify_from: "notify@tracker.example.org",
    }
}

#[tokio::test]
async fn submitting_a_ticket_enqueues_a_matching_tracker_webhook() {
    let pool = test_pool().await;
    let owner = insert_user(&pool, "owner").await;
    let tracker = create_tracker(&pool, &owner, "widgets").await;
    admin::create_webhook_subscription(
        &pool,
        WebhookScope::Tracker(tracker.id),
        "https://hooks.example.org/widgets",
        Secret::new("shh".to_string()),
        &[WebhookEvent::TicketCreate],
    )
    .await
    .unwrap();

    lifecycle::submit_ticket(&ctx(&pool), &owner, &tracker, "Widgets are broken", None)
        .await
        .unwrap();

    let queued = sqlx::query!(r#"SELECT count(*) AS "count!" FROM webhook_outbox"#)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(queued.count, 1);
}

#[tokio::test]
async fn registering_a_mismatched_event_is_rejected() {
    let pool = test_pool().await;
    let owner = insert_user(&pool, "owner").await;

    let err = admin::create_webhook_subscription(
        &pool,
        WebhookScope::User(owner.id),
        "https://hooks.example.org/me",
        Secret::new("shh".to_string()),
        &[WebhookEvent::LabelCreate],
    )
    .await
    .unwrap_err();

    assert!(matches!(err, tracker_core::error::CoreError::Validation { .. }));
}

#[tokio::test]
async fn commenting_enqueues_a_matching_ticket_webhook() {
    let pool = test_pool().await;
    let owner = insert_user(&pool, "owner").await;
    let tracker = create_tracker(&pool, &owner, "widgets").await;
    let ticket = lifecycle::submit_ticket(&ctx(&pool), &owner, &tracker, "Broken", None)
        .await
        .unwrap();
    admin::create_webhook_subscription(
        &pool,
        WebhookScope::Ticket(ticket.id),
        "https://hooks.example.org/ticket",
        Secret::new("shh".to_string()),
        &[WebhookEvent::EventCreate],
    )
    .await
    .unwrap();

    lifecycle::apply(
        &ctx(&pool),
        &owner,
        &tracker,
        &ticket,
        lifecycle::ApplyInput {
            text: Some("still broken".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let queued = sqlx::query!(
        r#"SELECT count(*) AS "count!" FROM webhook_outbox wo
           JOIN webhook_subscriptions ws ON ws.id = wo.subscription_id
           WHERE ws.ticket_id = $1"#,
        ticket.id,
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(queued.count, 1);
}
