//! Typed processor objects carried in `data.object`.
//!
//! Only the fields the ledger uses are modelled. Unknown fields are ignored.
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{AccountUpdate, Metadata, MinorUnits, OrgId, PayoutStatus};

/// The metadata key that links a connected account to its organization.
pub const ORGANIZATION_ID_KEY: &str = "organization_id";

//--------------------------------------       Account        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountObject {
    pub id: String,
    #[serde(default)]
    pub charges_enabled: bool,
    #[serde(default)]
    pub payouts_enabled: bool,
    #[serde(default)]
    pub details_submitted: bool,
    #[serde(default)]
    pub business_profile: Option<BusinessProfile>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub default_currency: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessProfile {
    #[serde(default)]
    pub name: Option<String>,
}

impl AccountObject {
    pub fn to_update(&self) -> AccountUpdate {
        AccountUpdate {
            external_account_id: self.id.clone(),
            org_id: self.metadata.get(ORGANIZATION_ID_KEY).map(|s| OrgId::from(s.as_str())),
            charges_enabled: self.charges_enabled,
            payouts_enabled: self.payouts_enabled,
            details_submitted: self.details_submitted,
            business_name: self.business_profile.as_ref().and_then(|p| p.name.clone()),
            country: self.country.clone(),
            default_currency: self.default_currency.clone(),
        }
    }
}

//--------------------------------------        Payout        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutObject {
    pub id: String,
    pub amount: MinorUnits,
    pub currency: String,
    pub status: PayoutStatus,
    /// Unix timestamp (seconds)
    #[serde(default)]
    pub arrival_date: Option<i64>,
    #[serde(default)]
    pub failure_code: Option<String>,
    #[serde(default)]
    pub failure_message: Option<String>,
}

impl PayoutObject {
    pub fn arrival(&self) -> Option<DateTime<Utc>> {
        self.arrival_date.and_then(|ts| Utc.timestamp_opt(ts, 0).single())
    }
}

//--------------------------------------        Charge        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeObject {
    pub id: String,
    pub amount: MinorUnits,
    #[serde(default)]
    pub amount_refunded: MinorUnits,
    pub currency: String,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub balance_transaction: Option<BalanceTransactionRef>,
    #[serde(default)]
    pub transfer_data: Option<TransferData>,
    #[serde(default)]
    pub on_behalf_of: Option<String>,
    #[serde(default)]
    pub failure_message: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// A balance transaction is either a bare id or, when the processor expands it, the full object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BalanceTransactionRef {
    Expanded(BalanceTransaction),
    Id(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceTransaction {
    pub id: String,
    pub fee: MinorUnits,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferData {
    pub destination: String,
}

impl ChargeObject {
    /// The processor fee, if the processor reported it with the charge.
    pub fn reported_fee(&self) -> Option<MinorUnits> {
        match &self.balance_transaction {
            Some(BalanceTransactionRef::Expanded(bt)) => Some(bt.fee),
            _ => None,
        }
    }

    /// The connected account a platform-side charge was made for.
    pub fn destination_account(&self) -> Option<&str> {
        self.transfer_data.as_ref().map(|t| t.destination.as_str()).or(self.on_behalf_of.as_deref())
    }
}

//--------------------------------------        Dispute       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeObject {
    pub id: String,
    /// The external id of the disputed charge
    pub charge: String,
    pub amount: MinorUnits,
    #[serde(default)]
    pub reason: Option<String>,
}
