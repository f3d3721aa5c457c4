use actix_web::{
    body::MessageBody,
    http::{header, StatusCode},
    test,
    test::TestRequest,
    web::ServiceConfig,
    App,
};
use chrono::Utc;
use log::debug;
use serde_json::json;
use venue_payment_engine::db_types::{ConnectedAccount, Transaction, TransactionStatus};

use crate::{helpers::calculate_signature, middleware::SIGNATURE_HEADER};

// Test credentials. DO NOT re-use these anywhere.
pub const SIGNING_SECRET: &str = "whsec_test_5f3c0a9e7b214d6c";
pub const OPERATOR_KEY: &str = "op_test_0d9b6e21c4f7";

/// Sends the request through an app built by `configure`. Errors raised by middleware are turned into responses, so
/// every call yields a status and a body.
pub async fn send_request<F>(req: TestRequest, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => {
            let status = res.status();
            let body = test::read_body(res).await;
            (status, String::from_utf8_lossy(&body).into_owned())
        },
        Err(e) => {
            let res = e.error_response();
            let status = res.status();
            let body = res.into_body().try_into_bytes().unwrap_or_default();
            (status, String::from_utf8_lossy(&body).into_owned())
        },
    }
}

/// A webhook delivery signed the way the processor signs it.
pub fn signed_webhook(path: &str, payload: &str) -> TestRequest {
    let timestamp = Utc::now().timestamp();
    let signature = calculate_signature(SIGNING_SECRET, timestamp, payload.as_bytes()).unwrap();
    TestRequest::post()
        .uri(path)
        .insert_header((SIGNATURE_HEADER, format!("t={timestamp},v1={signature}")))
        .insert_header((header::CONTENT_TYPE, "application/json"))
        .set_payload(payload.to_string())
}

pub fn operator_request(req: TestRequest) -> TestRequest {
    req.insert_header((header::AUTHORIZATION, format!("Bearer {OPERATOR_KEY}")))
}

pub fn account(id: i64, external_account_id: &str, org_id: &str) -> ConnectedAccount {
    serde_json::from_value(json!({
        "id": id,
        "external_account_id": external_account_id,
        "org_id": org_id,
        "status": "active",
        "charges_enabled": true,
        "payouts_enabled": true,
        "details_submitted": true,
        "business_name": "Harbour Lights Theatre",
        "country": "GB",
        "default_currency": "gbp",
        "created_at": "2024-05-29T16:26:40Z",
        "updated_at": "2024-05-29T16:26:40Z",
    }))
    .unwrap()
}

pub fn charge(id: i64, account_id: i64, amount: i64, status: TransactionStatus) -> Transaction {
    serde_json::from_value(json!({
        "id": id,
        "account_id": account_id,
        "txn_type": "charge",
        "status": status,
        "external_charge_id": format!("ch_{id}"),
        "external_payment_intent_id": format!("pi_{id}"),
        "external_refund_id": null,
        "amount": amount,
        "currency": "usd",
        "platform_fee": amount * 3 / 100,
        "processor_fee": 175,
        "processor_fee_source": "estimated",
        "net_amount": amount - amount * 3 / 100 - 175,
        "metadata": {},
        "created_at": "2024-05-29T16:30:00Z",
        "updated_at": "2024-05-29T16:30:00Z",
    }))
    .unwrap()
}

pub fn refund(id: i64, account_id: i64, charge_id: i64, amount: i64) -> Transaction {
    serde_json::from_value(json!({
        "id": id,
        "account_id": account_id,
        "txn_type": "refund",
        "status": "succeeded",
        "external_charge_id": format!("ch_{charge_id}"),
        "external_payment_intent_id": null,
        "external_refund_id": format!("re_{id}"),
        "amount": amount,
        "currency": "usd",
        "platform_fee": 0,
        "processor_fee": 0,
        "processor_fee_source": "reported",
        "net_amount": -amount,
        "metadata": { "processor_refund_status": "succeeded" },
        "created_at": "2024-05-30T09:00:00Z",
        "updated_at": "2024-05-30T09:00:00Z",
    }))
    .unwrap()
}
