use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{AccountStatus, ConnectedAccount, MinorUnits, OrgId, PayoutStatus, Transaction, TransactionStatus},
    traits::LedgerError,
};

/// The result of an insert-if-absent against a natural key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsertResult<T> {
    Inserted(T),
    /// A row with the same natural key already exists. The existing row is returned unchanged.
    AlreadyExists(T),
}

impl<T> InsertResult<T> {
    pub fn was_inserted(&self) -> bool {
        matches!(self, InsertResult::Inserted(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            InsertResult::Inserted(v) | InsertResult::AlreadyExists(v) => v,
        }
    }
}

/// An account row before and after a change. `old` is `None` if the row was created by the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountChanged {
    pub old: Option<ConnectedAccount>,
    pub new: ConnectedAccount,
}

impl AccountChanged {
    pub fn new(old: Option<ConnectedAccount>, new: ConnectedAccount) -> Self {
        Self { old, new }
    }

    pub fn old_status(&self) -> Option<AccountStatus> {
        self.old.as_ref().map(|a| a.status)
    }

    pub fn status_changed(&self) -> bool {
        self.old_status() != Some(self.new.status)
    }
}

/// A charge together with what has been refunded against it so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundableCharge {
    pub charge: Transaction,
    pub refunded: MinorUnits,
}

impl RefundableCharge {
    pub fn remaining(&self) -> MinorUnits {
        self.charge.amount - self.refunded
    }

    /// How much of the processor's reported refund total has no refund row in the ledger. Refunds issued from the
    /// processor dashboard only show up here.
    pub fn unrecorded_refunds(&self, processor_refunded: MinorUnits) -> MinorUnits {
        if processor_refunded > self.refunded {
            processor_refunded - self.refunded
        } else {
            MinorUnits::ZERO
        }
    }
}

//--------------------------------------  TransactionQueryFilter  ---------------------------------------------------
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransactionQueryFilter {
    pub org_id: Option<OrgId>,
    pub account_id: Option<i64>,
    pub external_charge_id: Option<String>,
    pub status: Option<Vec<TransactionStatus>>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl TransactionQueryFilter {
    pub fn for_org(org_id: OrgId) -> Self {
        Self { org_id: Some(org_id), ..Default::default() }
    }

    pub fn with_account_id(mut self, account_id: i64) -> Self {
        self.account_id = Some(account_id);
        self
    }

    pub fn with_external_charge_id<S: Into<String>>(mut self, charge_id: S) -> Self {
        self.external_charge_id = Some(charge_id.into());
        self
    }

    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn since<T>(mut self, since: T) -> Result<Self, LedgerError>
    where
        T: TryInto<DateTime<Utc>>,
        T::Error: Display,
    {
        let dt = since.try_into().map_err(|e| LedgerError::QueryError(e.to_string()))?;
        self.since = Some(dt);
        Ok(self)
    }

    pub fn until<T>(mut self, until: T) -> Result<Self, LedgerError>
    where
        T: TryInto<DateTime<Utc>>,
        T::Error: Display,
    {
        let dt = until.try_into().map_err(|e| LedgerError::QueryError(e.to_string()))?;
        self.until = Some(dt);
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.org_id.is_none() &&
            self.account_id.is_none() &&
            self.external_charge_id.is_none() &&
            self.status.as_ref().map_or(true, |s| s.is_empty()) &&
            self.since.is_none() &&
            self.until.is_none()
    }
}

impl Display for TransactionQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "No filters.");
        }
        if let Some(org_id) = &self.org_id {
            write!(f, "org_id: {org_id}. ")?;
        }
        if let Some(account_id) = &self.account_id {
            write!(f, "account_id: {account_id}. ")?;
        }
        if let Some(charge_id) = &self.external_charge_id {
            write!(f, "external_charge_id: {charge_id}. ")?;
        }
        if let Some(statuses) = &self.status {
            let statuses = statuses.iter().map(|s| s.to_string()).collect::<Vec<String>>().join(",");
            write!(f, "statuses: [{statuses}]. ")?;
        }
        if let Some(since) = &self.since {
            write!(f, "since {since}. ")?;
        }
        if let Some(until) = &self.until {
            write!(f, "until {until}. ")?;
        }
        Ok(())
    }
}

//--------------------------------------    PayoutQueryFilter    ---------------------------------------------------
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PayoutQueryFilter {
    pub org_id: Option<OrgId>,
    pub status: Option<Vec<PayoutStatus>>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl PayoutQueryFilter {
    pub fn for_org(org_id: OrgId) -> Self {
        Self { org_id: Some(org_id), ..Default::default() }
    }

    pub fn with_status(mut self, status: PayoutStatus) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn with_range(mut self, since: Option<DateTime<Utc>>, until: Option<DateTime<Utc>>) -> Self {
        self.since = since;
        self.until = until;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.org_id.is_none() &&
            self.status.as_ref().map_or(true, |s| s.is_empty()) &&
            self.since.is_none() && self.until.is_none()
    }
}
