use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use venue_payment_engine::{
    db_types::{MinorUnits, TransactionStatus},
    events::EventProducers,
    traits::{InsertResult, LedgerError, ProcessorClientError, ProcessorRefund, RefundableCharge},
    IssuedRefund,
    RefundApi,
};
use vpg_common::Secret;

use super::{
    helpers::{account, charge, operator_request, refund, send_request, OPERATOR_KEY},
    mocks::{store_with, MockProcessor, MockStore},
};
use crate::{
    data_objects::PendingStatusSync,
    middleware::OperatorAuthFactory,
    routes::{IssueRefundRoute, ResyncRefundRoute},
};

fn configure(store: MockStore, processor: MockProcessor) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let api = RefundApi::new(store, processor, EventProducers::default());
        let scope = web::scope("/api")
            .wrap(OperatorAuthFactory::new(Secret::new(OPERATOR_KEY.to_string())))
            .service(IssueRefundRoute::<MockStore, MockProcessor>::new())
            .service(ResyncRefundRoute::<MockStore, MockProcessor>::new());
        cfg.app_data(web::Data::new(api)).service(scope);
    }
}

/// Charge #7 of 5000 on account #3 (org_harbour), with 1000 already refunded.
fn partially_refunded_charge(store: &mut MockStore) {
    store.expect_fetch_refundable_charge().withf(|id| *id == 7).returning(|_| {
        let charge = charge(7, 3, 5000, TransactionStatus::PartiallyRefunded);
        Ok(Some(RefundableCharge { charge, refunded: MinorUnits::from(1000) }))
    });
    store.expect_fetch_account().withf(|id| *id == 3).returning(|_| Ok(Some(account(3, "acct_1PbX", "org_harbour"))));
}

fn refund_request(org: &str, body: &str) -> TestRequest {
    let req = TestRequest::post().uri(&format!("/api/orgs/{org}/transactions/7/refund")).set_payload(body.to_string());
    operator_request(req)
}

fn processor_that_refunds() -> MockProcessor {
    let mut processor = MockProcessor::new();
    processor
        .expect_create_refund()
        .withf(|req| {
            req.external_account_id == "acct_1PbX" &&
                req.external_charge_id == "ch_7" &&
                req.amount == MinorUnits::from(4000) &&
                req.idempotency_key == "vpg-refund-7-1000-4000"
        })
        .times(1)
        .returning(|req| Ok(ProcessorRefund { id: "re_9".into(), amount: req.amount, status: "succeeded".into() }));
    processor
}

#[actix_web::test]
async fn refund_without_operator_key() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::post().uri("/api/orgs/org_harbour/transactions/7/refund");
    let (status, body) = send_request(req, configure(store_with(|_| {}), MockProcessor::new())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, r#"{"error":"Operator authentication failed. A valid operator API key is required."}"#);
}

#[actix_web::test]
async fn refund_with_wrong_operator_key() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::post()
        .uri("/api/orgs/org_harbour/transactions/7/refund")
        .insert_header(("Authorization", "Bearer op_test_guessed"));
    let (status, _) = send_request(req, configure(store_with(|_| {}), MockProcessor::new())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn refund_remaining_balance() {
    let _ = env_logger::try_init().ok();
    let store = store_with(|store| {
        partially_refunded_charge(store);
        store.expect_insert_refund().returning(|r| {
            assert_eq!(r.charge_id, 7);
            assert_eq!(r.external_refund_id.as_deref(), Some("re_9"));
            Ok(InsertResult::Inserted(refund(9, 3, 7, r.amount.value())))
        });
        store.expect_sync_charge_refund_status().withf(|id| *id == 7).returning(|_| {
            Ok(charge(7, 3, 5000, TransactionStatus::Refunded))
        });
    });
    let (status, body) = send_request(refund_request("org_harbour", ""), configure(store, processor_that_refunds())).await;
    assert_eq!(status, StatusCode::OK);
    let issued: IssuedRefund = serde_json::from_str(&body).unwrap();
    assert_eq!(issued.refund.amount, MinorUnits::from(4000));
    assert_eq!(issued.refund.external_refund_id.as_deref(), Some("re_9"));
    assert_eq!(issued.charge.status, TransactionStatus::Refunded);
}

#[actix_web::test]
async fn refund_more_than_remains() {
    let _ = env_logger::try_init().ok();
    // The processor must not be called
    let store = store_with(partially_refunded_charge);
    let req = refund_request("org_harbour", r#"{"amount": 4500}"#);
    let (status, body) = send_request(req, configure(store, MockProcessor::new())).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body, r#"{"error":"Refund of 4500 exceeds the remaining refundable balance of 4000"}"#);
}

#[actix_web::test]
async fn refund_a_zero_amount() {
    let _ = env_logger::try_init().ok();
    let store = store_with(partially_refunded_charge);
    let req = refund_request("org_harbour", r#"{"amount": 0}"#);
    let (status, _) = send_request(req, configure(store, MockProcessor::new())).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[actix_web::test]
async fn refund_another_orgs_charge() {
    let _ = env_logger::try_init().ok();
    let store = store_with(partially_refunded_charge);
    let req = refund_request("org_elsewhere", r#"{"amount": 100}"#);
    let (status, body) = send_request(req, configure(store, MockProcessor::new())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"Transaction 7 does not exist"}"#);
}

#[actix_web::test]
async fn refund_unknown_charge() {
    let _ = env_logger::try_init().ok();
    let store = store_with(|store| {
        store.expect_fetch_refundable_charge().returning(|_| Ok(None));
    });
    let (status, _) = send_request(refund_request("org_harbour", ""), configure(store, MockProcessor::new())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn refund_with_malformed_body() {
    let _ = env_logger::try_init().ok();
    let req = refund_request("org_harbour", r#"{"amount": "lots"}"#);
    let (status, _) = send_request(req, configure(store_with(|_| {}), MockProcessor::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn refund_rejected_by_processor() {
    let _ = env_logger::try_init().ok();
    let store = store_with(partially_refunded_charge);
    let mut processor = MockProcessor::new();
    processor.expect_create_refund().returning(|_| {
        Err(ProcessorClientError::Rejected { status: 400, message: "Charge ch_7 has been disputed".into() })
    });
    let (status, _) = send_request(refund_request("org_harbour", ""), configure(store, processor)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[actix_web::test]
async fn refund_recorded_but_status_not_synced() {
    let _ = env_logger::try_init().ok();
    let store = store_with(|store| {
        partially_refunded_charge(store);
        store.expect_insert_refund().returning(|r| Ok(InsertResult::Inserted(refund(9, 3, 7, r.amount.value()))));
        store
            .expect_sync_charge_refund_status()
            .returning(|_| Err(LedgerError::DatabaseError("database is locked".into())));
    });
    let (status, body) = send_request(refund_request("org_harbour", ""), configure(store, processor_that_refunds())).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let pending: PendingStatusSync = serde_json::from_str(&body).unwrap();
    assert_eq!(pending.refund.id, 9);
    assert!(pending.message.contains("database is locked"));
}

#[actix_web::test]
async fn resync_charge_status() {
    let _ = env_logger::try_init().ok();
    let store = store_with(|store| {
        partially_refunded_charge(store);
        store.expect_sync_charge_refund_status().returning(|_| Ok(charge(7, 3, 5000, TransactionStatus::Refunded)));
    });
    let req = operator_request(TestRequest::post().uri("/api/orgs/org_harbour/transactions/7/resync"));
    let (status, body) = send_request(req, configure(store, MockProcessor::new())).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""status":"refunded""#), "{body}");
}
