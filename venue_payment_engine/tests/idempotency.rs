use std::sync::{
    atomic::{AtomicI32, Ordering},
    Arc,
};

use futures_util::{future::join_all, FutureExt};
use log::*;
use venue_payment_engine::{
    db_types::{Admission, MinorUnits},
    events::{EventHandlers, EventHooks},
    DeliveryOutcome,
    DispatchOutcome,
    LedgerManagement,
    SqliteDatabase,
    WebhookApi,
    WebhookApiError,
    WebhookEventManagement,
};

use crate::support::{
    payloads,
    prepare_env::{prepare_test_env, seed_account, tear_down},
};

mod support;

#[derive(Default, Clone)]
struct HookCalled {
    called: Arc<AtomicI32>,
}

impl HookCalled {
    fn called(&self) {
        self.called.fetch_add(1, Ordering::SeqCst);
    }

    fn count(&self) -> i32 {
        self.called.load(Ordering::SeqCst)
    }
}

/// Builds the webhook API with hooks that count charge recordings and handler runs.
fn counted_api(db: &SqliteDatabase, charges: &HookCalled, runs: &HookCalled) -> WebhookApi<SqliteDatabase> {
    let mut hooks = EventHooks::default();
    let charges = charges.clone();
    let runs = runs.clone();
    hooks
        .on_charge_recorded(move |ev| {
            info!("🪝️ Charge recorded: {}", ev.charge.id);
            charges.called();
            async {}.boxed()
        })
        .on_webhook_processed(move |ev| {
            info!("🪝️ Webhook processed: {}", ev.event_id);
            runs.called();
            async {}.boxed()
        });
    let handlers = EventHandlers::new(64, hooks);
    let producers = handlers.producers();
    tokio::spawn(handlers.start_handlers());
    WebhookApi::new(db.clone(), producers)
}

async fn settle() {
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
}

#[tokio::test]
async fn concurrent_duplicate_deliveries_run_handlers_once() {
    let db = prepare_test_env().await;
    seed_account(&db, "acct_1", "org_1").await;
    let charges = HookCalled::default();
    let runs = HookCalled::default();
    let api = counted_api(&db, &charges, &runs);
    let payload = payloads::charge("evt_dup", "charge.succeeded", "acct_1", "ch_dup", 5000);

    let deliveries = (0..12).map(|_| api.process_delivery(&payload));
    let outcomes = join_all(deliveries).await;
    let processed = outcomes
        .iter()
        .filter(|o| matches!(o, Ok(DeliveryOutcome::Processed { admission: Admission::FirstSeen, .. })))
        .count();
    let duplicates = outcomes.iter().filter(|o| matches!(o, Ok(DeliveryOutcome::Duplicate(_)))).count();
    assert_eq!(processed, 1);
    assert_eq!(duplicates, 11);
    settle().await;
    assert_eq!(charges.count(), 1);
    assert_eq!(runs.count(), 1);

    let record = db.fetch_event("evt_dup").await.unwrap().unwrap();
    assert!(record.processed);
    assert!(record.last_error.is_none());
    tear_down(db).await;
}

#[tokio::test]
async fn redelivery_with_mutated_payload_is_a_no_op() {
    let db = prepare_test_env().await;
    seed_account(&db, "acct_1", "org_1").await;
    let api = WebhookApi::new(db.clone(), Default::default());
    let original = payloads::charge("evt_m", "charge.succeeded", "acct_1", "ch_m", 5000);
    let outcome = api.process_delivery(&original).await.unwrap();
    assert_eq!(outcome, DeliveryOutcome::Processed { admission: Admission::FirstSeen, outcome: DispatchOutcome::Applied });

    let mutated = payloads::charge("evt_m", "charge.succeeded", "acct_1", "ch_m", 9999);
    let outcome = api.process_delivery(&mutated).await.unwrap();
    assert_eq!(outcome, DeliveryOutcome::Duplicate(Admission::AlreadyProcessed));

    let charge = db.fetch_charge_by_external_id("ch_m").await.unwrap().unwrap();
    assert_eq!(charge.amount, MinorUnits::from(5000));
    let record = db.fetch_event("evt_m").await.unwrap().unwrap();
    assert_eq!(record.payload, original);
    tear_down(db).await;
}

#[tokio::test]
async fn unknown_event_types_close_the_event() {
    let db = prepare_test_env().await;
    let api = WebhookApi::new(db.clone(), Default::default());
    let payload = payloads::envelope("evt_u", "customer.created", None, serde_json::json!({ "id": "cus_1" }));
    let outcome = api.process_delivery(&payload).await.unwrap();
    assert!(matches!(outcome, DeliveryOutcome::Processed { outcome: DispatchOutcome::Ignored(_), .. }));
    assert!(db.fetch_event("evt_u").await.unwrap().unwrap().processed);
    tear_down(db).await;
}

#[tokio::test]
async fn malformed_payloads_never_reach_the_gate() {
    let db = prepare_test_env().await;
    let api = WebhookApi::new(db.clone(), Default::default());
    let err = api.process_delivery("{ not json").await.unwrap_err();
    assert!(matches!(err, WebhookApiError::Parse(_)));
    // A known type with the wrong object shape
    let payload = payloads::envelope("evt_bad", "charge.succeeded", Some("acct_1"), serde_json::json!({ "id": 7 }));
    let err = api.process_delivery(&payload).await.unwrap_err();
    assert!(matches!(err, WebhookApiError::Parse(_)));
    assert!(db.fetch_event("evt_bad").await.unwrap().is_none());
    tear_down(db).await;
}

#[tokio::test]
async fn failed_handlers_leave_the_event_for_replay() {
    let db = prepare_test_env().await;
    seed_account(&db, "acct_1", "org_1").await;
    let charges = HookCalled::default();
    let runs = HookCalled::default();
    let api = counted_api(&db, &charges, &runs);
    // Without the fee settings the platform fee cannot be resolved, and the charge must not be recorded with 0%.
    sqlx::query("ALTER TABLE org_fee_overrides RENAME TO org_fee_overrides_offline").execute(db.pool()).await.unwrap();

    let payload = payloads::charge("evt_f", "charge.succeeded", "acct_1", "ch_f", 5000);
    let outcome = api.process_delivery(&payload).await.unwrap();
    assert!(outcome.is_failure());
    assert!(db.fetch_charge_by_external_id("ch_f").await.unwrap().is_none());
    let record = db.fetch_event("evt_f").await.unwrap().unwrap();
    assert!(!record.processed);
    assert!(record.last_error.as_deref().unwrap_or_default().contains("Fee policy unavailable"));
    let pending = api.pending_events(10).await.unwrap();
    assert_eq!(pending.len(), 1);

    sqlx::query("ALTER TABLE org_fee_overrides_offline RENAME TO org_fee_overrides").execute(db.pool()).await.unwrap();
    let outcome = api.replay_event("evt_f").await.unwrap();
    assert_eq!(outcome, DeliveryOutcome::Processed { admission: Admission::RetryPending, outcome: DispatchOutcome::Applied });
    let charge = db.fetch_charge_by_external_id("ch_f").await.unwrap().unwrap();
    assert_eq!(charge.platform_fee, MinorUnits::from(150));
    let record = db.fetch_event("evt_f").await.unwrap().unwrap();
    assert!(record.processed);
    assert_eq!(record.attempts, 1);

    // Replaying a processed event does nothing
    let outcome = api.replay_event("evt_f").await.unwrap();
    assert_eq!(outcome, DeliveryOutcome::Duplicate(Admission::AlreadyProcessed));
    assert!(matches!(api.replay_event("evt_nope").await, Err(WebhookApiError::EventNotFound(_))));
    settle().await;
    assert_eq!(charges.count(), 1);
    assert_eq!(runs.count(), 1);
    tear_down(db).await;
}

#[tokio::test]
async fn unattributable_events_are_closed() {
    let db = prepare_test_env().await;
    let api = WebhookApi::new(db.clone(), Default::default());
    // The account is not known yet, so the charge is ignored and the event closes
    let payload = payloads::charge("evt_r", "charge.succeeded", "acct_late", "ch_r", 1000);
    let outcome = api.process_delivery(&payload).await.unwrap();
    assert!(matches!(outcome, DeliveryOutcome::Processed { outcome: DispatchOutcome::Ignored(_), .. }));
    seed_account(&db, "acct_late", "org_1").await;
    let outcome = api.process_delivery(&payload).await.unwrap();
    assert_eq!(outcome, DeliveryOutcome::Duplicate(Admission::AlreadyProcessed));
    assert!(db.fetch_charge_by_external_id("ch_r").await.unwrap().is_none());
    tear_down(db).await;
}
