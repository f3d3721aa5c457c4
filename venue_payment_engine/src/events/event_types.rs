use serde::{Deserialize, Serialize};

use crate::db_types::{AccountStatus, Admission, ConnectedAccount, Transaction};

/// Published once for every successful run of the event handlers for a webhook event. Deliveries that the idempotency
/// gate short-circuits do not publish this event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookProcessedEvent {
    pub event_id: String,
    pub event_type: String,
    pub admission: Admission,
}

impl WebhookProcessedEvent {
    pub fn new<S1: Into<String>, S2: Into<String>>(event_id: S1, event_type: S2, admission: Admission) -> Self {
        Self { event_id: event_id.into(), event_type: event_type.into(), admission }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeRecordedEvent {
    pub charge: Transaction,
}

impl ChargeRecordedEvent {
    pub fn new(charge: Transaction) -> Self {
        Self { charge }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundIssuedEvent {
    pub charge: Transaction,
    pub refund: Transaction,
}

impl RefundIssuedEvent {
    pub fn new(charge: Transaction, refund: Transaction) -> Self {
        Self { charge, refund }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStatusChangedEvent {
    /// `None` if the account was created by this change
    pub old_status: Option<AccountStatus>,
    pub account: ConnectedAccount,
}

impl AccountStatusChangedEvent {
    pub fn new(old_status: Option<AccountStatus>, account: ConnectedAccount) -> Self {
        Self { old_status, account }
    }
}
