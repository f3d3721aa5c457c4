use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use venue_payment_engine::traits::{PaymentProcessor, ProcessorClientError, ProcessorRefund, RefundRequest};

/// An in-memory processor. Like the real one, it returns the original refund for a repeated idempotency key.
#[derive(Clone, Default)]
pub struct FakeProcessor {
    refunds: Arc<Mutex<HashMap<String, ProcessorRefund>>>,
    delay: Option<Duration>,
    reject: bool,
}

impl FakeProcessor {
    pub fn slow(delay: Duration) -> Self {
        Self { delay: Some(delay), ..Default::default() }
    }

    pub fn rejecting() -> Self {
        Self { reject: true, ..Default::default() }
    }

    pub fn issued(&self) -> usize {
        self.refunds.lock().map(|r| r.len()).unwrap_or_default()
    }
}

impl PaymentProcessor for FakeProcessor {
    async fn create_refund(&self, request: RefundRequest) -> Result<ProcessorRefund, ProcessorClientError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.reject {
            return Err(ProcessorClientError::Rejected { status: 402, message: "charge_already_refunded".into() });
        }
        let mut refunds = self.refunds.lock().map_err(|e| ProcessorClientError::Transport(e.to_string()))?;
        let n = refunds.len() + 1;
        let refund = refunds
            .entry(request.idempotency_key.clone())
            .or_insert_with(|| ProcessorRefund { id: format!("re_{n}"), amount: request.amount, status: "succeeded".into() })
            .clone();
        Ok(refund)
    }
}
