use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use venue_payment_engine::{
    db_types::{Admission, FeePercent, MinorUnits, OrgId, PayoutStatus, Transaction, TransactionStatus},
    traits::{PayoutQueryFilter, TransactionQueryFilter},
    DeliveryOutcome,
};

use crate::errors::ServerError;

/// The acknowledgement sent to the processor for every accepted webhook delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceivedResponse {
    pub received: bool,
}

impl ReceivedResponse {
    pub fn received() -> Self {
        Self { received: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefundParams {
    /// Defaults to the whole remaining refundable balance.
    #[serde(default)]
    pub amount: Option<MinorUnits>,
}

/// Returned with `202 Accepted` when the refund row exists but the charge status still needs a resync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingStatusSync {
    pub refund: Transaction,
    pub message: String,
}

/// What happened when an operator replayed a webhook event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayReport {
    pub event_id: String,
    pub admission: Admission,
    pub handled: bool,
    pub detail: String,
}

impl ReplayReport {
    pub fn new(event_id: &str, outcome: DeliveryOutcome) -> Self {
        let event_id = event_id.to_string();
        match outcome {
            DeliveryOutcome::Processed { admission, outcome } => {
                Self { event_id, admission, handled: true, detail: outcome.to_string() }
            },
            DeliveryOutcome::Duplicate(admission) => {
                Self { event_id, admission, handled: false, detail: "Handlers did not run".to_string() }
            },
            DeliveryOutcome::Failed { admission, error } => Self { event_id, admission, handled: false, detail: error },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeOverrideParams {
    /// `null` removes the override.
    pub percent: Option<FeePercent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformFeeParams {
    pub percent: FeePercent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterAccountParams {
    pub external_account_id: String,
    pub org_id: OrgId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingEventsParams {
    pub limit: Option<i64>,
}

/// Query parameters for the reporting routes. `status` is a comma-separated list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerQueryParams {
    pub status: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl LedgerQueryParams {
    fn statuses<T>(&self) -> Result<Option<Vec<T>>, ServerError>
    where
        T: std::str::FromStr,
        T::Err: Display,
    {
        let Some(status) = &self.status else {
            return Ok(None);
        };
        status
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<T>().map_err(|e| ServerError::InvalidRequestBody(e.to_string())))
            .collect::<Result<Vec<T>, _>>()
            .map(Some)
    }

    pub fn transaction_filter(&self, org_id: OrgId) -> Result<TransactionQueryFilter, ServerError> {
        let mut filter = TransactionQueryFilter::for_org(org_id);
        filter.status = self.statuses::<TransactionStatus>()?;
        filter.since = self.since;
        filter.until = self.until;
        Ok(filter)
    }

    pub fn payout_filter(&self, org_id: OrgId) -> Result<PayoutQueryFilter, ServerError> {
        let mut filter = PayoutQueryFilter::for_org(org_id).with_range(self.since, self.until);
        filter.status = self.statuses::<PayoutStatus>()?;
        Ok(filter)
    }
}
