//! Order admission pipeline tests against in-memory repositories.

#![allow(clippy::unwrap_used)]

use chrono::TimeDelta;
use serde_json::json;

use group_order_core::{LineItem, OrderStatus, Schedule};
use group_order_integration_tests::{TestContext, item, submission, taipei};
use group_order_server::services::OrderError;
use group_order_server::services::orders::ItemInput;

const TOKEN: &str = "token-alice";

/// Monday 2026-10-19 10:00 in Taipei.
fn monday_morning() -> TestContext {
    TestContext::new(taipei(2026, 10, 19, 10, 0))
}

fn with_alice(ctx: &TestContext) {
    ctx.add_member(TOKEN, "Alice Chen", "0912345678");
}

// =============================================================================
// Submission
// =============================================================================

#[tokio::test]
async fn test_submit_persists_order_with_server_total() {
    let ctx = monday_morning();
    let alice = ctx.add_member(TOKEN, "Alice Chen", "0912345678");

    let order_id = ctx
        .service
        .submit_order(submission(TOKEN, "submit-1"))
        .await
        .unwrap();

    let order = ctx
        .service
        .lookup_order(Some(TOKEN), &order_id.to_string())
        .await
        .unwrap();

    assert_eq!(order.id, order_id);
    assert_eq!(order.member_id, alice);
    assert_eq!(order.total_amount, 2 * 45 + 120);
    assert_eq!(order.customer_name, "Alice Chen");
    assert_eq!(order.phone, "0912345678");
    assert_eq!(order.delivery_location, "Lobby B");
    assert_eq!(order.note, "Less ice");
    assert_eq!(order.status, OrderStatus::Open);
    assert_eq!(order.batch_id, "2026-W43");
    assert_eq!(
        order.order_items,
        vec![
            LineItem {
                product_name: "Oolong tea".to_string(),
                unit_price: 45,
                quantity: 2,
            },
            LineItem {
                product_name: "Cheesecake".to_string(),
                unit_price: 120,
                quantity: 1,
            },
        ]
    );
}

#[tokio::test]
async fn test_text_fields_are_trimmed_and_bounded() {
    let ctx = monday_morning();
    with_alice(&ctx);

    let mut request = submission(TOKEN, "  trimmed-key  ");
    request.delivery_location = format!("  {}  ", "L".repeat(80));
    request.note = "n".repeat(500);

    ctx.service.submit_order(request).await.unwrap();

    let order = &ctx.store.orders()[0];
    assert_eq!(order.delivery_location, "L".repeat(50));
    assert_eq!(order.note.len(), 200);
}

// =============================================================================
// Authentication and profile
// =============================================================================

#[tokio::test]
async fn test_unknown_or_missing_credential_is_unauthenticated() {
    let ctx = monday_morning();
    with_alice(&ctx);

    let err = ctx
        .service
        .submit_order(submission("token-mallory", "k"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::Unauthenticated));

    let mut request = submission(TOKEN, "k");
    request.credential = Some("   ".to_string());
    let err = ctx.service.submit_order(request).await.unwrap_err();
    assert!(matches!(err, OrderError::Unauthenticated));

    assert_eq!(ctx.store.order_count(), 0);
    assert!(ctx.store.rate_limit_keys().is_empty());
}

#[tokio::test]
async fn test_identity_outage_is_unauthenticated() {
    let ctx = monday_morning();
    with_alice(&ctx);
    ctx.identity.set_unavailable(true);

    let err = ctx
        .service
        .submit_order(submission(TOKEN, "k"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::Unauthenticated));
}

#[tokio::test]
async fn test_missing_profile_is_rejected_before_rate_limit() {
    let ctx = monday_morning();
    ctx.add_member_without_profile(TOKEN);

    let err = ctx
        .service
        .submit_order(submission(TOKEN, "k"))
        .await
        .unwrap_err();

    assert!(matches!(err, OrderError::ProfileRequired));
    assert!(ctx.store.rate_limit_keys().is_empty());
}

// =============================================================================
// Item validation
// =============================================================================

#[tokio::test]
async fn test_blank_named_items_are_dropped() {
    let ctx = monday_morning();
    with_alice(&ctx);

    let mut request = submission(TOKEN, "k");
    request.items = vec![
        item("   ", 999, 9),
        item("Milk tea", 60, 1),
        ItemInput::default(),
    ];
    ctx.service.submit_order(request).await.unwrap();

    let order = &ctx.store.orders()[0];
    assert_eq!(order.order_items.len(), 1);
    assert_eq!(order.order_items[0].product_name, "Milk tea");
    assert_eq!(order.total_amount, 60);
}

#[tokio::test]
async fn test_only_blank_names_is_empty_order() {
    let ctx = monday_morning();
    with_alice(&ctx);

    let mut request = submission(TOKEN, "k");
    request.items = vec![item("", 10, 1), item("  ", 20, 2)];
    let err = ctx.service.submit_order(request).await.unwrap_err();

    assert!(matches!(err, OrderError::EmptyOrder));
    assert_eq!(ctx.store.order_count(), 0);
}

#[tokio::test]
async fn test_negative_price_fails_whole_request() {
    let ctx = monday_morning();
    with_alice(&ctx);

    let mut request = submission(TOKEN, "k");
    request.items.push(item("Discount", -1, 1));
    let err = ctx.service.submit_order(request).await.unwrap_err();

    assert!(matches!(err, OrderError::InvalidItem(_)));
    assert_eq!(ctx.store.order_count(), 0);
    assert!(ctx.store.rate_limit_keys().is_empty());
}

#[tokio::test]
async fn test_fractional_values_are_floored() {
    let ctx = monday_morning();
    with_alice(&ctx);

    let mut request = submission(TOKEN, "k");
    request.items = vec![ItemInput {
        product_name: "Tea".to_string(),
        unit_price: Some(json!(45.8)),
        quantity: Some(json!("2.9")),
    }];
    ctx.service.submit_order(request).await.unwrap();

    assert_eq!(ctx.store.orders()[0].total_amount, 90);
}

#[tokio::test]
async fn test_missing_fields_are_invalid_input() {
    let ctx = monday_morning();
    with_alice(&ctx);

    let mut request = submission(TOKEN, "k");
    request.device_id = String::new();
    let err = ctx.service.submit_order(request).await.unwrap_err();
    assert!(matches!(err, OrderError::InvalidInput(ref msg) if msg == "Missing required fields"));

    let mut request = submission(TOKEN, "k");
    request.items.clear();
    let err = ctx.service.submit_order(request).await.unwrap_err();
    assert!(matches!(err, OrderError::InvalidInput(ref msg) if msg == "Items required"));
}

// =============================================================================
// Idempotency
// =============================================================================

#[tokio::test]
async fn test_resubmit_same_token_returns_same_order() {
    let ctx = monday_morning();
    with_alice(&ctx);

    let first = ctx
        .service
        .submit_order(submission(TOKEN, "retry-me"))
        .await
        .unwrap();

    // A retry after the cooldown reaches the store and is de-duplicated there.
    ctx.clock.advance(TimeDelta::seconds(121));
    let second = ctx
        .service
        .submit_order(submission(TOKEN, "retry-me"))
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(ctx.store.order_count(), 1);
}

#[tokio::test]
async fn test_retry_within_cooldown_returns_same_order() {
    let ctx = monday_morning();
    with_alice(&ctx);

    let first = ctx
        .service
        .submit_order(submission(TOKEN, "double-click"))
        .await
        .unwrap();
    // Same device, same instant: the limiter rejects, the token resolves it.
    let second = ctx
        .service
        .submit_order(submission(TOKEN, "double-click"))
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(ctx.store.order_count(), 1);
}

#[tokio::test]
async fn test_other_members_token_within_cooldown_is_not_revealed() {
    let ctx = monday_morning();
    with_alice(&ctx);
    ctx.add_member("token-bob", "Bob Lin", "0987654321");

    let alices = ctx
        .service
        .submit_order(submission(TOKEN, "alices-key"))
        .await
        .unwrap();
    ctx.service
        .submit_order(submission("token-bob", "bobs-key"))
        .await
        .unwrap();

    // Bob is inside his own cooldown and replays Alice's token.
    let err = ctx
        .service
        .submit_order(submission("token-bob", "alices-key"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::RateLimited { .. }));
    assert!(!err.to_string().contains(&alices.to_string()));
    assert_eq!(ctx.store.order_count(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_same_token_same_device_creates_one_order() {
    let ctx = monday_morning();
    with_alice(&ctx);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = ctx.service.clone();
            let request = submission(TOKEN, "hammered");
            tokio::spawn(async move { service.submit_order(request).await })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(id) => ids.push(id),
            // Lost the race before the winner's order was committed.
            Err(OrderError::RateLimited { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert!(!ids.is_empty());
    assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(ctx.store.order_count(), 1);

    // Once settled, a retry inside the cooldown resolves to the same order.
    let retried = ctx
        .service
        .submit_order(submission(TOKEN, "hammered"))
        .await
        .unwrap();
    assert_eq!(retried, ids[0]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_same_token_creates_one_order() {
    let ctx = monday_morning();
    with_alice(&ctx);

    let handles: Vec<_> = (0..8)
        .map(|n| {
            let service = ctx.service.clone();
            // Distinct devices so every request clears the rate limiter.
            let mut request = submission(TOKEN, "double-tap");
            request.device_id = format!("device-{n}");
            tokio::spawn(async move { service.submit_order(request).await })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap());
    }

    assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(ctx.store.order_count(), 1);
}

#[tokio::test]
async fn test_token_reused_by_other_member_is_duplicate() {
    let ctx = monday_morning();
    with_alice(&ctx);
    ctx.add_member("token-bob", "Bob Lin", "0987654321");

    ctx.service
        .submit_order(submission(TOKEN, "shared-key"))
        .await
        .unwrap();
    let err = ctx
        .service
        .submit_order(submission("token-bob", "shared-key"))
        .await
        .unwrap_err();

    assert!(matches!(err, OrderError::DuplicateSubmission));
    assert_eq!(ctx.store.order_count(), 1);
}

#[tokio::test]
async fn test_failed_create_can_be_retried_with_same_token() {
    let ctx = monday_morning();
    with_alice(&ctx);

    ctx.store.set_fail_creates(true);
    let err = ctx
        .service
        .submit_order(submission(TOKEN, "flaky"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::Store { .. }));
    assert_eq!(err.to_string(), "Failed to create order");
    assert_eq!(ctx.store.order_count(), 0);

    ctx.store.set_fail_creates(false);
    ctx.clock.advance(TimeDelta::seconds(120));
    ctx.service
        .submit_order(submission(TOKEN, "flaky"))
        .await
        .unwrap();
    assert_eq!(ctx.store.order_count(), 1);
}

// =============================================================================
// Rate limiting
// =============================================================================

#[tokio::test]
async fn test_second_submission_within_cooldown_is_limited() {
    let ctx = monday_morning();
    with_alice(&ctx);

    ctx.service
        .submit_order(submission(TOKEN, "first"))
        .await
        .unwrap();

    ctx.clock.advance(TimeDelta::seconds(30));
    let err = ctx
        .service
        .submit_order(submission(TOKEN, "second"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::RateLimited { retry_after: 90 }));

    ctx.clock.advance(TimeDelta::seconds(90));
    ctx.service
        .submit_order(submission(TOKEN, "third"))
        .await
        .unwrap();
    assert_eq!(ctx.store.order_count(), 2);
}

#[tokio::test]
async fn test_retry_after_is_at_most_cooldown() {
    let ctx = monday_morning();
    with_alice(&ctx);

    ctx.service
        .submit_order(submission(TOKEN, "first"))
        .await
        .unwrap();
    let err = ctx
        .service
        .submit_order(submission(TOKEN, "second"))
        .await
        .unwrap_err();

    let retry_after = err.retry_after().unwrap();
    assert!((1..=120).contains(&retry_after));
    assert_eq!(retry_after, 120);
}

#[tokio::test]
async fn test_rate_limit_key_is_composite() {
    let ctx = monday_morning();
    with_alice(&ctx);

    ctx.service
        .submit_order(submission(TOKEN, "a"))
        .await
        .unwrap();

    let mut other_device = submission(TOKEN, "b");
    other_device.device_id = "device-2".to_string();
    ctx.service.submit_order(other_device).await.unwrap();

    let mut other_ip = submission(TOKEN, "c");
    other_ip.client_ip = "198.51.100.20".to_string();
    ctx.service.submit_order(other_ip).await.unwrap();

    assert_eq!(ctx.store.order_count(), 3);
    let mut keys = ctx.store.rate_limit_keys();
    keys.sort();
    assert_eq!(keys.len(), 3);
    assert!(keys.iter().all(|k| k.contains("|0912345678|")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_same_key_admits_exactly_one() {
    let ctx = monday_morning();
    with_alice(&ctx);

    let handles: Vec<_> = (0..10)
        .map(|n| {
            let service = ctx.service.clone();
            let request = submission(TOKEN, &format!("burst-{n}"));
            tokio::spawn(async move { service.submit_order(request).await })
        })
        .collect();

    let mut admitted = 0;
    let mut limited = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => admitted += 1,
            Err(OrderError::RateLimited { .. }) => limited += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(admitted, 1);
    assert_eq!(limited, 9);
    assert_eq!(ctx.store.order_count(), 1);
}

// =============================================================================
// Schedule gate
// =============================================================================

fn weekday_window() -> Schedule {
    // Monday 09:00 through Monday 17:59
    Schedule::new(1, 9, 1, 17, false).unwrap()
}

#[tokio::test]
async fn test_window_close_hour_is_inclusive() {
    let ctx = TestContext::new(taipei(2026, 10, 19, 17, 59));
    with_alice(&ctx);
    ctx.store.set_schedule(Some(weekday_window()));

    ctx.service
        .submit_order(submission(TOKEN, "last-minute"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_window_closed_after_close_hour() {
    let ctx = TestContext::new(taipei(2026, 10, 19, 18, 0));
    with_alice(&ctx);
    ctx.store.set_schedule(Some(weekday_window()));

    let err = ctx
        .service
        .submit_order(submission(TOKEN, "too-late"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::OrderingClosed));
    assert_eq!(ctx.store.order_count(), 0);
}

#[tokio::test]
async fn test_wrapping_window_open_early_sunday() {
    // Saturday 20:00 through Sunday 02:59
    let wrap = Schedule::new(6, 20, 0, 2, false).unwrap();

    let ctx = TestContext::new(taipei(2026, 10, 18, 1, 0));
    with_alice(&ctx);
    ctx.store.set_schedule(Some(wrap));
    ctx.service
        .submit_order(submission(TOKEN, "night-owl"))
        .await
        .unwrap();

    let ctx = TestContext::new(taipei(2026, 10, 18, 3, 0));
    with_alice(&ctx);
    ctx.store.set_schedule(Some(wrap));
    let err = ctx
        .service
        .submit_order(submission(TOKEN, "too-late"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::OrderingClosed));
}

#[tokio::test]
async fn test_closed_window_still_spends_cooldown() {
    // One minute before opening.
    let ctx = TestContext::new(taipei(2026, 10, 19, 8, 59));
    with_alice(&ctx);
    ctx.store.set_schedule(Some(weekday_window()));

    let err = ctx
        .service
        .submit_order(submission(TOKEN, "early"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::OrderingClosed));

    ctx.clock.advance(TimeDelta::seconds(61));
    let err = ctx
        .service
        .submit_order(submission(TOKEN, "early"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::RateLimited { retry_after: 59 }));
}

#[tokio::test]
async fn test_missing_schedule_fails_closed() {
    let ctx = monday_morning();
    with_alice(&ctx);
    ctx.store.set_schedule(None);

    let err = ctx
        .service
        .submit_order(submission(TOKEN, "k"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::OrderingClosed));

    // The display path fails open.
    let status = ctx.service.schedule_status().await;
    assert!(status.open);
    assert_eq!(status.window, None);
}

#[tokio::test]
async fn test_schedule_read_failure_is_store_error() {
    let ctx = monday_morning();
    with_alice(&ctx);
    ctx.store.set_fail_schedule(true);

    let err = ctx
        .service
        .submit_order(submission(TOKEN, "k"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::Store { .. }));
    assert_eq!(err.to_string(), "Schedule check failed");
    assert_eq!(ctx.store.order_count(), 0);
}

// =============================================================================
// Batches
// =============================================================================

#[tokio::test]
async fn test_batch_follows_taipei_iso_week() {
    let ctx = TestContext::new(taipei(2026, 10, 18, 23, 59));
    with_alice(&ctx);

    ctx.service
        .submit_order(submission(TOKEN, "sunday"))
        .await
        .unwrap();

    // One minute later it is Monday in Taipei: a new ISO week.
    ctx.clock.advance(TimeDelta::seconds(121));
    ctx.service
        .submit_order(submission(TOKEN, "monday"))
        .await
        .unwrap();

    // Still Monday's week on Friday.
    ctx.clock.set(taipei(2026, 10, 23, 12, 0));
    ctx.service
        .submit_order(submission(TOKEN, "friday"))
        .await
        .unwrap();

    let batches: Vec<_> = ctx
        .store
        .orders()
        .into_iter()
        .map(|o| o.batch_id)
        .collect();
    assert_eq!(batches, vec!["2026-W42", "2026-W43", "2026-W43"]);
}

// =============================================================================
// Lookup and history
// =============================================================================

#[tokio::test]
async fn test_lookup_of_other_members_order_is_not_found() {
    let ctx = monday_morning();
    with_alice(&ctx);
    ctx.add_member("token-bob", "Bob Lin", "0987654321");

    let order_id = ctx
        .service
        .submit_order(submission(TOKEN, "mine"))
        .await
        .unwrap();

    let err = ctx
        .service
        .lookup_order(Some("token-bob"), &order_id.to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::NotFound));
}

#[tokio::test]
async fn test_lookup_rejects_malformed_id() {
    let ctx = monday_morning();
    with_alice(&ctx);

    let err = ctx
        .service
        .lookup_order(Some(TOKEN), "../../orders")
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::InvalidId));

    let err = ctx
        .service
        .lookup_order(Some(TOKEN), "6f1c2a9e-3b7d-4e25-9a0c-5d8f1e2b3c4d")
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::NotFound));
}

#[tokio::test]
async fn test_lookup_requires_credential() {
    let ctx = monday_morning();
    let err = ctx
        .service
        .lookup_order(None, "6f1c2a9e-3b7d-4e25-9a0c-5d8f1e2b3c4d")
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::Unauthenticated));
}

#[tokio::test]
async fn test_history_is_own_orders_newest_first() {
    let ctx = monday_morning();
    with_alice(&ctx);
    ctx.add_member("token-bob", "Bob Lin", "0987654321");

    let first = ctx
        .service
        .submit_order(submission(TOKEN, "one"))
        .await
        .unwrap();
    ctx.service
        .submit_order(submission("token-bob", "bobs"))
        .await
        .unwrap();
    ctx.clock.advance(TimeDelta::seconds(300));
    let second = ctx
        .service
        .submit_order(submission(TOKEN, "two"))
        .await
        .unwrap();

    let history = ctx.service.list_orders(Some(TOKEN)).await.unwrap();
    let ids: Vec<_> = history.iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![second, first]);
}

// =============================================================================
// Schedule status
// =============================================================================

#[tokio::test]
async fn test_schedule_status_reports_window_and_batch() {
    let ctx = TestContext::new(taipei(2026, 10, 19, 18, 30));
    ctx.store.set_schedule(Some(weekday_window()));

    let status = ctx.service.schedule_status().await;

    assert!(!status.open);
    assert!(!status.always_open);
    assert_eq!(status.window.as_deref(), Some("Mon 09:00 to Mon 17:59"));
    assert_eq!(status.batch_id.as_str(), "2026-W43");
    assert_eq!(status.timezone, "Asia/Taipei");
}

#[tokio::test]
async fn test_schedule_status_survives_store_failure() {
    let ctx = monday_morning();
    ctx.store.set_fail_schedule(true);

    let status = ctx.service.schedule_status().await;
    assert!(status.open);
}
