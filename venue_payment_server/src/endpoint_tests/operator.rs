use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use serde_json::{json, Value};
use venue_payment_engine::{
    db_types::{AccountStatus, FeePercent, TransactionStatus},
    events::EventProducers,
    traits::{AccountChanged, FeePolicyError, InsertResult},
    FeePolicyApi,
    LedgerApi,
    WebhookApi,
};
use vpg_common::Secret;

use super::{
    helpers::{account, charge, operator_request, send_request, OPERATOR_KEY},
    mocks::{store_with, MockStore},
};
use crate::{
    middleware::OperatorAuthFactory,
    routes::{
        OrgFeeRoute,
        ReauthorizeAccountRoute,
        RegisterAccountRoute,
        ReplayWebhookRoute,
        SetOrgFeeRoute,
        SetPlatformFeeRoute,
        TransactionsRoute,
    },
};

fn configure(store: MockStore) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let fee_api = FeePolicyApi::new(store.clone()).with_default_fee(FeePercent::from_tenths(30).unwrap());
        let ledger_api = LedgerApi::new(store.clone(), EventProducers::default());
        let webhook_api = WebhookApi::new(store, EventProducers::default());
        let scope = web::scope("/api")
            .wrap(OperatorAuthFactory::new(Secret::new(OPERATOR_KEY.to_string())))
            .service(TransactionsRoute::<MockStore>::new())
            .service(OrgFeeRoute::<MockStore>::new())
            .service(SetOrgFeeRoute::<MockStore>::new())
            .service(SetPlatformFeeRoute::<MockStore>::new())
            .service(RegisterAccountRoute::<MockStore>::new())
            .service(ReauthorizeAccountRoute::<MockStore>::new())
            .service(ReplayWebhookRoute::<MockStore>::new());
        cfg.app_data(web::Data::new(fee_api))
            .app_data(web::Data::new(ledger_api))
            .app_data(web::Data::new(webhook_api))
            .service(scope);
    }
}

fn json_body(body: &str) -> Value {
    serde_json::from_str(body).unwrap()
}

#[actix_web::test]
async fn org_fee_override_wins() {
    let _ = env_logger::try_init().ok();
    let store = store_with(|store| {
        store.expect_fetch_org_fee_override().returning(|_| Ok(Some(FeePercent::from_tenths(25).unwrap())));
    });
    let req = operator_request(TestRequest::get().uri("/api/orgs/org_harbour/fee"));
    let (status, body) = send_request(req, configure(store)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body), json!({"percent": "2.5", "is_custom": true}));
}

#[actix_web::test]
async fn org_fee_falls_back_to_the_default() {
    let _ = env_logger::try_init().ok();
    let store = store_with(|store| {
        store.expect_fetch_org_fee_override().returning(|_| Ok(None));
        store.expect_fetch_platform_fee().returning(|| Ok(None));
    });
    let req = operator_request(TestRequest::get().uri("/api/orgs/org_harbour/fee"));
    let (status, body) = send_request(req, configure(store)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body), json!({"percent": "3.0", "is_custom": false}));
}

#[actix_web::test]
async fn org_fee_lookup_failure_is_not_a_zero_fee() {
    let _ = env_logger::try_init().ok();
    let store = store_with(|store| {
        store.expect_fetch_org_fee_override().returning(|_| Err(FeePolicyError::Unavailable("pool timed out".into())));
    });
    let req = operator_request(TestRequest::get().uri("/api/orgs/org_harbour/fee"));
    let (status, _) = send_request(req, configure(store)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[actix_web::test]
async fn set_org_fee_override() {
    let _ = env_logger::try_init().ok();
    let store = store_with(|store| {
        store
            .expect_set_org_fee_override()
            .withf(|org, percent| org.as_str() == "org_harbour" && *percent == FeePercent::from_tenths(45).ok())
            .returning(|_, _| Ok(()));
    });
    let req = operator_request(TestRequest::put().uri("/api/orgs/org_harbour/fee").set_json(json!({"percent": 4.5})));
    let (status, body) = send_request(req, configure(store)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body), json!({"success": true, "message": "Platform fee for org_harbour set to 4.5%"}));
}

#[actix_web::test]
async fn clear_org_fee_override() {
    let _ = env_logger::try_init().ok();
    let store = store_with(|store| {
        store.expect_set_org_fee_override().withf(|_, percent| percent.is_none()).returning(|_, _| Ok(()));
    });
    let req = operator_request(TestRequest::put().uri("/api/orgs/org_harbour/fee").set_json(json!({"percent": null})));
    let (status, body) = send_request(req, configure(store)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["message"], "Platform fee override for org_harbour removed");
}

#[actix_web::test]
async fn platform_fee_out_of_range() {
    let _ = env_logger::try_init().ok();
    let req =
        operator_request(TestRequest::put().uri("/api/settings/platform_fee").set_json(json!({"percent": "150"})));
    let (status, _) = send_request(req, configure(store_with(|_| {}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn fee_routes_need_the_operator_key() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::put().uri("/api/settings/platform_fee").set_json(json!({"percent": "1.0"}));
    let (status, _) = send_request(req, configure(store_with(|_| {}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn transactions_by_status() {
    let _ = env_logger::try_init().ok();
    let store = store_with(|store| {
        store
            .expect_search_transactions()
            .withf(|q| {
                q.org_id.as_ref().map(|o| o.as_str()) == Some("org_harbour") &&
                    q.status == Some(vec![TransactionStatus::Refunded, TransactionStatus::PartiallyRefunded])
            })
            .returning(|_| Ok(vec![charge(7, 3, 5000, TransactionStatus::PartiallyRefunded)]));
    });
    let uri = "/api/orgs/org_harbour/transactions?status=refunded,partially_refunded";
    let (status, body) = send_request(operator_request(TestRequest::get().uri(uri)), configure(store)).await;
    assert_eq!(status, StatusCode::OK);
    let body = json_body(&body);
    assert_eq!(body.as_array().map(Vec::len), Some(1));
    assert_eq!(body[0]["external_charge_id"], "ch_7");
    assert_eq!(body[0]["status"], "partially_refunded");
}

#[actix_web::test]
async fn transactions_with_unknown_status() {
    let _ = env_logger::try_init().ok();
    let uri = "/api/orgs/org_harbour/transactions?status=settled";
    let (status, _) = send_request(operator_request(TestRequest::get().uri(uri)), configure(store_with(|_| {}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn register_account() {
    let _ = env_logger::try_init().ok();
    let store = store_with(|store| {
        store
            .expect_insert_account()
            .withf(|a| a.external_account_id == "acct_1PbX" && a.org_id.as_str() == "org_harbour")
            .returning(|_| Ok(InsertResult::Inserted(account(3, "acct_1PbX", "org_harbour"))));
    });
    let req = operator_request(
        TestRequest::post()
            .uri("/api/accounts")
            .set_json(json!({"external_account_id": "acct_1PbX", "org_id": "org_harbour"})),
    );
    let (status, body) = send_request(req, configure(store)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json_body(&body)["id"], 3);
}

#[actix_web::test]
async fn register_account_twice() {
    let _ = env_logger::try_init().ok();
    let store = store_with(|store| {
        store
            .expect_insert_account()
            .returning(|_| Ok(InsertResult::AlreadyExists(account(3, "acct_1PbX", "org_harbour"))));
    });
    let req = operator_request(
        TestRequest::post()
            .uri("/api/accounts")
            .set_json(json!({"external_account_id": "acct_1PbX", "org_id": "org_harbour"})),
    );
    let (status, _) = send_request(req, configure(store)).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn reauthorize_disabled_account() {
    let _ = env_logger::try_init().ok();
    let store = store_with(|store| {
        store.expect_reauthorize_account().returning(|_| {
            let mut old = account(3, "acct_1PbX", "org_harbour");
            old.status = AccountStatus::Disabled;
            Ok(Some(AccountChanged::new(Some(old), account(3, "acct_1PbX", "org_harbour"))))
        });
    });
    let req = operator_request(TestRequest::post().uri("/api/accounts/acct_1PbX/reauthorize"));
    let (status, body) = send_request(req, configure(store)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["status"], "active");
}

#[actix_web::test]
async fn reauthorize_unknown_account() {
    let _ = env_logger::try_init().ok();
    let store = store_with(|store| {
        store.expect_reauthorize_account().returning(|_| Ok(None));
    });
    let req = operator_request(TestRequest::post().uri("/api/accounts/acct_missing/reauthorize"));
    let (status, body) = send_request(req, configure(store)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"The data was not found. Connected account acct_missing"}"#);
}

#[actix_web::test]
async fn replay_unknown_event() {
    let _ = env_logger::try_init().ok();
    let store = store_with(|store| {
        store.expect_fetch_event().returning(|_| Ok(None));
    });
    let req = operator_request(TestRequest::post().uri("/api/webhooks/evt_missing/replay"));
    let (status, _) = send_request(req, configure(store)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
