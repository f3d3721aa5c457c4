use std::fmt::Display;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::{
    db_types::PayoutStatus,
    processor_events::{
        objects::{AccountObject, ChargeObject, DisputeObject, PayoutObject},
        WebhookEnvelope,
    },
};

#[derive(Debug, Clone, Error)]
pub enum EventParseError {
    #[error("Malformed event envelope: {0}")]
    MalformedEnvelope(String),
    #[error("Event {event_id} of type {event_type} has a malformed object: {reason}")]
    MalformedObject { event_id: String, event_type: String, reason: String },
    #[error("Event {event_id} of type {event_type} is missing the connected account id")]
    MissingAccount { event_id: String, event_type: String },
}

/// Which payout notification produced a [`ProcessorEvent::PayoutUpdated`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutEventKind {
    Updated,
    Paid,
    Failed,
    Canceled,
}

impl PayoutEventKind {
    /// The status implied by the notification. A generic update carries its status in the object.
    pub fn status(&self, payout: &PayoutObject) -> PayoutStatus {
        match self {
            PayoutEventKind::Updated => payout.status,
            PayoutEventKind::Paid => PayoutStatus::Paid,
            PayoutEventKind::Failed => PayoutStatus::Failed,
            PayoutEventKind::Canceled => PayoutStatus::Canceled,
        }
    }
}

/// A processor notification, validated against the shape its type promises.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessorEvent {
    AccountUpdated { account: AccountObject },
    AccountDeauthorized { external_account_id: String },
    AccountReauthorized { external_account_id: String },
    PayoutCreated { external_account_id: Option<String>, payout: PayoutObject },
    PayoutUpdated { kind: PayoutEventKind, payout: PayoutObject },
    ChargeSucceeded { external_account_id: Option<String>, charge: ChargeObject },
    ChargeFailed { external_account_id: Option<String>, charge: ChargeObject },
    ChargeRefunded { charge: ChargeObject },
    DisputeCreated { dispute: DisputeObject },
    /// A well-formed event of a type the ledger does not track
    Unknown { event_type: String },
}

impl ProcessorEvent {
    pub fn category(&self) -> &str {
        match self {
            ProcessorEvent::AccountUpdated { .. } => "account_updated",
            ProcessorEvent::AccountDeauthorized { .. } => "account_deauthorized",
            ProcessorEvent::AccountReauthorized { .. } => "account_reauthorized",
            ProcessorEvent::PayoutCreated { .. } => "payout_created",
            ProcessorEvent::PayoutUpdated { .. } => "payout_updated",
            ProcessorEvent::ChargeSucceeded { .. } => "charge_succeeded",
            ProcessorEvent::ChargeFailed { .. } => "charge_failed",
            ProcessorEvent::ChargeRefunded { .. } => "charge_refunded",
            ProcessorEvent::DisputeCreated { .. } => "dispute_created",
            ProcessorEvent::Unknown { .. } => "unknown",
        }
    }
}

impl Display for ProcessorEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessorEvent::Unknown { event_type } => write!(f, "unknown({event_type})"),
            e => f.write_str(e.category()),
        }
    }
}

impl TryFrom<&WebhookEnvelope> for ProcessorEvent {
    type Error = EventParseError;

    fn try_from(envelope: &WebhookEnvelope) -> Result<Self, Self::Error> {
        let object = || envelope.data.object.clone();
        let event = match envelope.event_type.as_str() {
            "account.updated" => ProcessorEvent::AccountUpdated { account: typed(envelope, object())? },
            "account.application.deauthorized" => {
                ProcessorEvent::AccountDeauthorized { external_account_id: required_account(envelope)? }
            },
            "account.application.authorized" => {
                ProcessorEvent::AccountReauthorized { external_account_id: required_account(envelope)? }
            },
            "payout.created" => ProcessorEvent::PayoutCreated {
                external_account_id: envelope.account.clone(),
                payout: typed(envelope, object())?,
            },
            "payout.updated" => payout_update(envelope, PayoutEventKind::Updated)?,
            "payout.paid" => payout_update(envelope, PayoutEventKind::Paid)?,
            "payout.failed" => payout_update(envelope, PayoutEventKind::Failed)?,
            "payout.canceled" => payout_update(envelope, PayoutEventKind::Canceled)?,
            "charge.succeeded" => {
                let charge = charge_object(envelope)?;
                let external_account_id = charge_account(envelope, &charge);
                ProcessorEvent::ChargeSucceeded { external_account_id, charge }
            },
            "charge.failed" => {
                let charge = charge_object(envelope)?;
                let external_account_id = charge_account(envelope, &charge);
                ProcessorEvent::ChargeFailed { external_account_id, charge }
            },
            "charge.refunded" => ProcessorEvent::ChargeRefunded { charge: charge_object(envelope)? },
            "charge.dispute.created" => ProcessorEvent::DisputeCreated { dispute: typed(envelope, object())? },
            other => ProcessorEvent::Unknown { event_type: other.to_string() },
        };
        Ok(event)
    }
}

fn typed<T: DeserializeOwned>(envelope: &WebhookEnvelope, object: Value) -> Result<T, EventParseError> {
    serde_json::from_value(object).map_err(|e| EventParseError::MalformedObject {
        event_id: envelope.id.clone(),
        event_type: envelope.event_type.clone(),
        reason: e.to_string(),
    })
}

/// Charge amounts are never negative. A payload that says otherwise is rejected before it reaches the ledger.
fn charge_object(envelope: &WebhookEnvelope) -> Result<ChargeObject, EventParseError> {
    let charge: ChargeObject = typed(envelope, envelope.data.object.clone())?;
    if charge.amount.is_negative() || charge.amount_refunded.is_negative() {
        return Err(EventParseError::MalformedObject {
            event_id: envelope.id.clone(),
            event_type: envelope.event_type.clone(),
            reason: format!("charge {} has a negative amount", charge.id),
        });
    }
    Ok(charge)
}

fn required_account(envelope: &WebhookEnvelope) -> Result<String, EventParseError> {
    envelope.account.clone().filter(|a| !a.is_empty()).ok_or_else(|| EventParseError::MissingAccount {
        event_id: envelope.id.clone(),
        event_type: envelope.event_type.clone(),
    })
}

fn payout_update(envelope: &WebhookEnvelope, kind: PayoutEventKind) -> Result<ProcessorEvent, EventParseError> {
    let payout = typed(envelope, envelope.data.object.clone())?;
    Ok(ProcessorEvent::PayoutUpdated { kind, payout })
}

/// Connected-account charges carry the account on the envelope. Destination charges made on the platform carry it in
/// the charge itself.
fn charge_account(envelope: &WebhookEnvelope, charge: &ChargeObject) -> Option<String> {
    envelope.account.clone().or_else(|| charge.destination_account().map(String::from))
}
