use std::time::Duration;

use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig, HttpMessage};
use serde_json::json;
use venue_payment_engine::{
    db_types::Admission,
    events::EventProducers,
    traits::{LedgerError, WebhookEventError},
    WebhookApi,
};
use vpg_common::Secret;

use super::{
    helpers::{send_request, signed_webhook, SIGNING_SECRET},
    mocks::{store_with, MockStore},
};
use crate::{
    middleware::{SignatureMiddlewareFactory, SIGNATURE_HEADER},
    routes::WebhookRoute,
};

fn configure(store: MockStore, signature_checks: bool) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let api = WebhookApi::new(store, EventProducers::default());
        let secret = Secret::new(SIGNING_SECRET.to_string());
        let scope = web::scope("/webhooks")
            .wrap(SignatureMiddlewareFactory::new(secret, Duration::from_secs(300), signature_checks))
            .service(WebhookRoute::<MockStore>::new());
        cfg.app_data(web::Data::new(api)).service(scope);
    }
}

fn customer_created(id: &str) -> String {
    json!({
        "id": id,
        "type": "customer.created",
        "created": 1_717_000_000,
        "data": { "object": { "id": "cus_Q8sL2", "object": "customer" } },
    })
    .to_string()
}

fn account_updated(id: &str) -> String {
    json!({
        "id": id,
        "type": "account.updated",
        "created": 1_717_000_000,
        "account": "acct_1PbX",
        "data": { "object": {
            "id": "acct_1PbX",
            "object": "account",
            "charges_enabled": true,
            "payouts_enabled": true,
            "details_submitted": true,
            "business_profile": { "name": "Harbour Lights Theatre" },
            "country": "GB",
            "default_currency": "gbp",
            "metadata": {},
        }},
    })
    .to_string()
}

fn first_delivery(store: &mut MockStore) {
    store.expect_claim_event().returning(|_, _| Ok(Admission::FirstSeen));
    store.expect_mark_event_processed().returning(|_| Ok(()));
}

#[actix_web::test]
async fn unhandled_event_types_are_acknowledged() {
    let _ = env_logger::try_init().ok();
    let req = signed_webhook("/webhooks/stripe", &customer_created("evt_1"));
    let (status, body) = send_request(req, configure(store_with(first_delivery), true)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"received":true}"#);
}

#[actix_web::test]
async fn duplicate_deliveries_are_acknowledged() {
    let _ = env_logger::try_init().ok();
    // No handler or ledger expectations: running them would panic
    let store = store_with(|store| {
        store.expect_claim_event().returning(|_, _| Ok(Admission::AlreadyProcessed));
    });
    let req = signed_webhook("/webhooks/stripe", &account_updated("evt_2"));
    let (status, body) = send_request(req, configure(store, true)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"received":true}"#);
}

#[actix_web::test]
async fn handler_failures_are_recorded_and_acknowledged() {
    let _ = env_logger::try_init().ok();
    let store = store_with(|store| {
        store.expect_claim_event().returning(|_, _| Ok(Admission::FirstSeen));
        store.expect_upsert_account().returning(|_| Err(LedgerError::DatabaseError("database is locked".into())));
        store
            .expect_record_event_failure()
            .withf(|id, error| id == "evt_3" && error.contains("database is locked"))
            .returning(|_, _| Ok(()));
    });
    let req = signed_webhook("/webhooks/stripe", &account_updated("evt_3"));
    let (status, body) = send_request(req, configure(store, true)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"received":true}"#);
}

#[actix_web::test]
async fn missing_signature() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::post().uri("/webhooks/stripe").set_payload(customer_created("evt_4"));
    let (status, body) = send_request(req, configure(store_with(|_| {}), true)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, r#"{"error":"Webhook signature rejected. No signature found."}"#);
}

#[actix_web::test]
async fn tampered_payload() {
    let _ = env_logger::try_init().ok();
    let signed = signed_webhook("/webhooks/stripe", &customer_created("evt_5")).to_request();
    let header = signed.headers().get(SIGNATURE_HEADER).cloned().unwrap();
    let req = TestRequest::post()
        .uri("/webhooks/stripe")
        .insert_header((SIGNATURE_HEADER, header))
        .set_payload(customer_created("evt_6"));
    let (status, body) = send_request(req, configure(store_with(|_| {}), true)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.starts_with(r#"{"error":"Webhook signature rejected."#), "{body}");
}

#[actix_web::test]
async fn malformed_payloads_are_refused() {
    let _ = env_logger::try_init().ok();
    let req = signed_webhook("/webhooks/stripe", r#"{"id": "evt_7", "type": "charge.succ"#);
    let (status, _) = send_request(req, configure(store_with(|_| {}), true)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn unreachable_event_ledger_asks_for_a_retry() {
    let _ = env_logger::try_init().ok();
    let store = store_with(|store| {
        store.expect_claim_event().returning(|_, _| Err(WebhookEventError::DatabaseError("disk I/O error".into())));
    });
    let req = signed_webhook("/webhooks/stripe", &customer_created("evt_8"));
    let (status, _) = send_request(req, configure(store, true)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[actix_web::test]
async fn unknown_provider() {
    let _ = env_logger::try_init().ok();
    let req = signed_webhook("/webhooks/paypal", &customer_created("evt_9"));
    let (status, body) = send_request(req, configure(store_with(|_| {}), true)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"Unsupported webhook provider: paypal"}"#);
}

#[actix_web::test]
async fn unsigned_deliveries_pass_when_checks_are_off() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::post().uri("/webhooks/stripe").set_payload(customer_created("evt_10"));
    let (status, body) = send_request(req, configure(store_with(first_delivery), false)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"received":true}"#);
}
