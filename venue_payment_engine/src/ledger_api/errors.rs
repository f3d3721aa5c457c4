use thiserror::Error;

use crate::{
    db_types::{MinorUnits, Transaction, TransactionStatus},
    processor_events::EventParseError,
    traits::{FeePolicyError, LedgerError, ProcessorClientError, WebhookEventError},
};

/// A handler could not apply an event. The event stays unprocessed and is retried on redelivery or replay.
#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("{0}")]
    FeePolicy(#[from] FeePolicyError),
}

#[derive(Debug, Clone, Error)]
pub enum WebhookApiError {
    #[error("{0}")]
    Parse(#[from] EventParseError),
    #[error("The webhook event ledger is unavailable: {0}")]
    GateUnavailable(WebhookEventError),
    #[error("Webhook event {0} has not been recorded")]
    EventNotFound(String),
}

#[derive(Debug, Clone, Error)]
pub enum RefundError {
    #[error("Transaction {0} does not exist")]
    TransactionNotFound(i64),
    #[error("Transaction {0} is not a charge")]
    NotACharge(i64),
    #[error("Charge {id} is {status} and is not refundable")]
    NotRefundable { id: i64, status: TransactionStatus },
    #[error("Refund amount must be positive, got {0}")]
    InvalidAmount(MinorUnits),
    #[error("Refund of {requested} exceeds the remaining refundable balance of {remaining}")]
    ExceedsRefundableBalance { requested: MinorUnits, remaining: MinorUnits },
    #[error("Payment processor error: {0}")]
    Processor(#[from] ProcessorClientError),
    #[error("The refund timed out before the payment processor issued it. No refund was recorded. Retrying is safe.")]
    Timeout,
    #[error(
        "Refund {processor_refund_id} was issued by the payment processor but recording it timed out. Check the \
         charge's refunds before retrying."
    )]
    RecordTimeout { processor_refund_id: String },
    #[error(
        "Refund #{} was recorded but the charge status could not be updated ({reason}). Resync the charge to finish.",
        refund.id
    )]
    StatusSyncPending { refund: Box<Transaction>, reason: String },
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl RefundError {
    /// Validation errors are caused by the request and will not succeed on retry without changing it.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            RefundError::NotACharge(_) |
                RefundError::NotRefundable { .. } |
                RefundError::InvalidAmount(_) |
                RefundError::ExceedsRefundableBalance { .. }
        )
    }
}

impl From<LedgerError> for RefundError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::TransactionNotFound(id) => RefundError::TransactionNotFound(id),
            LedgerError::NotACharge(id) => RefundError::NotACharge(id),
            LedgerError::NotRefundable { id, status } => RefundError::NotRefundable { id, status },
            LedgerError::ExceedsRefundableBalance { requested, remaining } => {
                RefundError::ExceedsRefundableBalance { requested, remaining }
            },
            e => RefundError::DatabaseError(e.to_string()),
        }
    }
}
