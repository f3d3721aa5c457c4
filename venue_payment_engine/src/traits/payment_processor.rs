use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::MinorUnits;

#[derive(Debug, Clone, Error)]
pub enum ProcessorClientError {
    #[error("Could not reach the payment processor: {0}")]
    Transport(String),
    #[error("The payment processor rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("Could not interpret the payment processor's response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRequest {
    /// The connected account that owns the charge
    pub external_account_id: String,
    pub external_charge_id: String,
    pub amount: MinorUnits,
    /// Repeating a request with the same key returns the original refund instead of creating another one.
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorRefund {
    pub id: String,
    pub amount: MinorUnits,
    pub status: String,
}

/// The outbound side of the payment processor.
#[allow(async_fn_in_trait)]
pub trait PaymentProcessor: Clone {
    async fn create_refund(&self, request: RefundRequest) -> Result<ProcessorRefund, ProcessorClientError>;
}
