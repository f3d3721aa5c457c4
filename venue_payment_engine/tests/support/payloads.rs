//! Processor notification payloads, shaped like the processor sends them.
use serde_json::{json, Value};

pub fn envelope(id: &str, event_type: &str, account: Option<&str>, object: Value) -> String {
    let mut value = json!({
        "id": id,
        "type": event_type,
        "created": 1_717_000_000,
        "data": { "object": object },
    });
    if let Some(account) = account {
        value["account"] = json!(account);
    }
    value.to_string()
}

pub fn account_updated(id: &str, account: &str, details_submitted: bool, charges_enabled: bool) -> String {
    let object = json!({
        "id": account,
        "object": "account",
        "charges_enabled": charges_enabled,
        "payouts_enabled": charges_enabled,
        "details_submitted": details_submitted,
        "business_profile": { "name": "Harbour Lights Theatre" },
        "country": "GB",
        "default_currency": "gbp",
        "metadata": {},
    });
    envelope(id, "account.updated", Some(account), object)
}

pub fn account_deauthorized(id: &str, account: &str) -> String {
    envelope(id, "account.application.deauthorized", Some(account), json!({ "id": "ca_platform" }))
}

pub fn account_authorized(id: &str, account: &str) -> String {
    envelope(id, "account.application.authorized", Some(account), json!({ "id": "ca_platform" }))
}

pub fn charge(id: &str, event_type: &str, account: &str, charge_id: &str, amount: i64) -> String {
    let object = json!({
        "id": charge_id,
        "object": "charge",
        "amount": amount,
        "amount_refunded": 0,
        "currency": "usd",
        "payment_intent": format!("pi_{charge_id}"),
        "balance_transaction": "txn_123",
        "metadata": { "order": "tickets-42" },
    });
    envelope(id, event_type, Some(account), object)
}

pub fn charge_with_reported_fee(id: &str, account: &str, charge_id: &str, amount: i64, fee: i64) -> String {
    let object = json!({
        "id": charge_id,
        "amount": amount,
        "currency": "usd",
        "balance_transaction": { "id": "txn_456", "fee": fee },
    });
    envelope(id, "charge.succeeded", Some(account), object)
}

pub fn charge_refunded(id: &str, account: &str, charge_id: &str, amount: i64, refunded: i64) -> String {
    let object = json!({
        "id": charge_id,
        "amount": amount,
        "amount_refunded": refunded,
        "currency": "usd",
    });
    envelope(id, "charge.refunded", Some(account), object)
}

pub fn dispute_created(id: &str, account: &str, charge_id: &str, amount: i64) -> String {
    let object = json!({
        "id": format!("dp_{charge_id}"),
        "charge": charge_id,
        "amount": amount,
        "reason": "fraudulent",
    });
    envelope(id, "charge.dispute.created", Some(account), object)
}

pub fn payout(id: &str, event_type: &str, account: &str, payout_id: &str, status: &str) -> String {
    let mut object = json!({
        "id": payout_id,
        "amount": 12_500,
        "currency": "usd",
        "status": status,
        "arrival_date": 1_717_200_000,
    });
    if status == "failed" {
        object["failure_code"] = json!("account_closed");
        object["failure_message"] = json!("The bank account has been closed");
    }
    envelope(id, event_type, Some(account), object)
}

pub fn account_updated_for_org(id: &str, account: &str, org: &str) -> String {
    let object = json!({
        "id": account,
        "charges_enabled": false,
        "payouts_enabled": false,
        "details_submitted": false,
        "metadata": { "organization_id": org },
    });
    envelope(id, "account.updated", Some(account), object)
}
