//! Data types that are persisted in the ledger store.
//!
//! These types are backend-agnostic. The SQLite backend maps them with `sqlx::FromRow`, but nothing here depends on a
//! particular database.
use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, Type};
use thiserror::Error;
pub use vpg_common::{FeePercent, MinorUnits};

/// Free-form string key-value data attached to processor objects.
pub type Metadata = BTreeMap<String, String>;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

/// Generates `as_str`, `Display` and `FromStr` for enums that are persisted and transmitted as lowercase strings.
macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    s => Err(ConversionError(format!("{s} is not a valid {}", stringify!($name)))),
                }
            }
        }
    };
}

//--------------------------------------        OrgId        ---------------------------------------------------------
/// Identifier of an organization (a venue operator). Organizations are owned by an external service; the ledger only
/// stores the reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrgId(pub String);

impl OrgId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OrgId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for OrgId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrgId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

//--------------------------------------    AccountStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    /// The account has been created but no update has been received from the processor yet.
    Pending,
    /// The organization has not finished submitting its details.
    Onboarding,
    /// Details are submitted and charges are enabled.
    Active,
    /// Details are submitted, but the processor has disabled charges.
    Restricted,
    /// The organization revoked the platform's access. Terminal until explicitly re-authorized.
    Disabled,
}

string_enum!(AccountStatus {
    Pending => "pending",
    Onboarding => "onboarding",
    Active => "active",
    Restricted => "restricted",
    Disabled => "disabled",
});

impl AccountStatus {
    /// Derives the account status from the capability flags reported by the processor.
    ///
    /// `payouts_enabled` does not participate in the derivation.
    pub fn derive(details_submitted: bool, charges_enabled: bool) -> Self {
        match (details_submitted, charges_enabled) {
            (true, true) => AccountStatus::Active,
            (true, false) => AccountStatus::Restricted,
            (false, _) => AccountStatus::Onboarding,
        }
    }
}

//--------------------------------------  ConnectedAccount  ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ConnectedAccount {
    pub id: i64,
    pub external_account_id: String,
    pub org_id: OrgId,
    pub status: AccountStatus,
    pub charges_enabled: bool,
    pub payouts_enabled: bool,
    pub details_submitted: bool,
    pub business_name: Option<String>,
    pub country: Option<String>,
    pub default_currency: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConnectedAccount {
    pub fn is_disabled(&self) -> bool {
        self.status == AccountStatus::Disabled
    }
}

/// A connected account that an organization has started onboarding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewConnectedAccount {
    pub external_account_id: String,
    pub org_id: OrgId,
}

impl NewConnectedAccount {
    pub fn new<S: Into<String>>(external_account_id: S, org_id: OrgId) -> Self {
        Self { external_account_id: external_account_id.into(), org_id }
    }
}

/// The full set of account fields carried by an account-update event. Descriptive fields replace the stored values
/// wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountUpdate {
    pub external_account_id: String,
    /// Used to create the account row if the update arrives before onboarding registered the account.
    pub org_id: Option<OrgId>,
    pub charges_enabled: bool,
    pub payouts_enabled: bool,
    pub details_submitted: bool,
    pub business_name: Option<String>,
    pub country: Option<String>,
    pub default_currency: Option<String>,
}

impl AccountUpdate {
    pub fn derived_status(&self) -> AccountStatus {
        AccountStatus::derive(self.details_submitted, self.charges_enabled)
    }
}

//--------------------------------------   TransactionType   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Charge,
    Refund,
}

string_enum!(TransactionType {
    Charge => "charge",
    Refund => "refund",
});

//--------------------------------------  TransactionStatus  ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Succeeded,
    Failed,
    Refunded,
    PartiallyRefunded,
    Disputed,
}

string_enum!(TransactionStatus {
    Succeeded => "succeeded",
    Failed => "failed",
    Refunded => "refunded",
    PartiallyRefunded => "partially_refunded",
    Disputed => "disputed",
});

impl TransactionStatus {
    /// The charge statuses from which a charge may move to `self`.
    ///
    /// `failed` is terminal, and a charge is never moved back to `succeeded` or `failed`.
    pub fn charge_predecessors(&self) -> &'static [TransactionStatus] {
        use TransactionStatus::*;
        match self {
            Refunded => &[Succeeded, PartiallyRefunded],
            PartiallyRefunded => &[Succeeded, PartiallyRefunded],
            Disputed => &[Succeeded, PartiallyRefunded, Refunded],
            Succeeded | Failed => &[],
        }
    }

    /// The status of a charge of `amount` once `refunded` of it has been returned.
    pub fn for_refunded_amount(amount: MinorUnits, refunded: MinorUnits) -> Self {
        if refunded >= amount {
            TransactionStatus::Refunded
        } else if refunded.is_positive() {
            TransactionStatus::PartiallyRefunded
        } else {
            TransactionStatus::Succeeded
        }
    }
}

//--------------------------------------      FeeSource      ---------------------------------------------------------
/// Where the processor fee recorded on a transaction came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FeeSource {
    /// Calculated locally with the fixed estimation formula. Not authoritative.
    Estimated,
    /// Reported by the processor.
    Reported,
}

string_enum!(FeeSource {
    Estimated => "estimated",
    Reported => "reported",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorFee {
    pub amount: MinorUnits,
    pub source: FeeSource,
}

impl ProcessorFee {
    pub fn estimated(amount: MinorUnits) -> Self {
        Self { amount, source: FeeSource::Estimated }
    }

    pub fn reported(amount: MinorUnits) -> Self {
        Self { amount, source: FeeSource::Reported }
    }

    pub fn none() -> Self {
        Self::reported(MinorUnits::ZERO)
    }
}

//--------------------------------------     Transaction     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub account_id: i64,
    pub txn_type: TransactionType,
    pub status: TransactionStatus,
    pub external_charge_id: Option<String>,
    pub external_payment_intent_id: Option<String>,
    pub external_refund_id: Option<String>,
    pub amount: MinorUnits,
    pub currency: String,
    pub platform_fee: MinorUnits,
    pub processor_fee: MinorUnits,
    pub processor_fee_source: FeeSource,
    pub net_amount: MinorUnits,
    pub metadata: Json<Metadata>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn is_charge(&self) -> bool {
        self.txn_type == TransactionType::Charge
    }
}

/// A charge outcome reported by the processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCharge {
    pub account_id: i64,
    pub external_charge_id: String,
    pub external_payment_intent_id: Option<String>,
    pub status: TransactionStatus,
    pub amount: MinorUnits,
    pub currency: String,
    pub platform_fee: MinorUnits,
    pub processor_fee: ProcessorFee,
    pub metadata: Metadata,
}

impl NewCharge {
    /// `amount - platform_fee - processor_fee` for successful charges. Failed charges move no money.
    pub fn net_amount(&self) -> MinorUnits {
        match self.status {
            TransactionStatus::Failed => MinorUnits::ZERO,
            _ => self.amount - self.platform_fee - self.processor_fee.amount,
        }
    }
}

/// A refund against a charge. The refund row carries the charge's external id, and its net amount is `-amount`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRefund {
    /// The internal id of the charge being refunded
    pub charge_id: i64,
    pub external_refund_id: Option<String>,
    pub amount: MinorUnits,
    pub metadata: Metadata,
}

//--------------------------------------     PayoutStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    Pending,
    InTransit,
    Paid,
    Failed,
    Canceled,
}

string_enum!(PayoutStatus {
    Pending => "pending",
    InTransit => "in_transit",
    Paid => "paid",
    Failed => "failed",
    Canceled => "canceled",
});

impl PayoutStatus {
    /// The payout statuses from which a payout may move to `self`.
    ///
    /// `failed` and `canceled` are terminal. A `paid` payout may still fail (the bank can return the funds), but
    /// never moves back to `pending` or `in_transit`. Re-applying the current status is always allowed.
    pub fn predecessors(&self) -> &'static [PayoutStatus] {
        use PayoutStatus::*;
        match self {
            Pending => &[Pending],
            InTransit => &[Pending, InTransit],
            Paid => &[Pending, InTransit, Paid],
            Failed => &[Pending, InTransit, Paid, Failed],
            Canceled => &[Pending, InTransit, Canceled],
        }
    }
}

//--------------------------------------        Payout       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Payout {
    pub id: i64,
    pub account_id: i64,
    pub external_payout_id: String,
    pub amount: MinorUnits,
    pub currency: String,
    pub status: PayoutStatus,
    pub arrival_date: Option<DateTime<Utc>>,
    pub failure_code: Option<String>,
    pub failure_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayout {
    pub account_id: i64,
    pub external_payout_id: String,
    pub amount: MinorUnits,
    pub currency: String,
    pub status: PayoutStatus,
    pub arrival_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutUpdate {
    pub external_payout_id: String,
    pub status: PayoutStatus,
    pub arrival_date: Option<DateTime<Utc>>,
    pub failure_code: Option<String>,
    pub failure_message: Option<String>,
}

//--------------------------------------     WebhookEvent     ---------------------------------------------------------
/// One row per distinct processor event id ever received.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct WebhookEventRecord {
    pub event_id: String,
    pub event_type: String,
    /// The raw payload as first received. Redeliveries never overwrite it.
    pub payload: String,
    pub processed: bool,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    /// While this (unix milliseconds) is in the future, some worker is running handlers for the event.
    pub claimed_until_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWebhookEvent {
    pub event_id: String,
    pub event_type: String,
    pub payload: String,
}

impl NewWebhookEvent {
    pub fn new<S1: Into<String>, S2: Into<String>, S3: Into<String>>(event_id: S1, event_type: S2, payload: S3) -> Self {
        Self { event_id: event_id.into(), event_type: event_type.into(), payload: payload.into() }
    }
}

//--------------------------------------      Admission      ---------------------------------------------------------
/// The idempotency gate's verdict for one delivery of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Admission {
    /// First delivery of this event id. The caller holds the claim and must run the handlers.
    FirstSeen,
    /// The event was seen before but never completed. The caller holds the claim and must re-run the handlers.
    RetryPending,
    /// The event's effects are already applied. The caller must not run the handlers.
    AlreadyProcessed,
    /// Another worker currently holds the claim. The caller must not run the handlers.
    InFlight,
}

impl Admission {
    pub fn should_process(&self) -> bool {
        matches!(self, Admission::FirstSeen | Admission::RetryPending)
    }
}
