use std::{fmt::Debug, time::Duration};

use log::*;
use serde::{Deserialize, Serialize};
use tokio::time::{timeout_at, Instant};

use crate::{
    db_types::{Metadata, MinorUnits, NewRefund, OrgId, Transaction, TransactionStatus},
    events::{EventProducers, RefundIssuedEvent},
    ledger_api::errors::RefundError,
    traits::{LedgerManagement, PaymentProcessor, RefundRequest, RefundableCharge},
};

pub const DEFAULT_REFUND_TIMEOUT: Duration = Duration::from_secs(30);

/// A refund that was issued by the processor and recorded in the ledger, with the charge as it stands afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedRefund {
    pub refund: Transaction,
    pub charge: Transaction,
}

/// `RefundApi` issues operator-initiated refunds against recorded charges.
///
/// A refund runs in three steps, all inside one deadline:
/// 1. Issue the refund with the payment processor, using an idempotency key derived from the charge and its refund
///    state, so that a retried request does not refund twice.
/// 2. Insert the refund row. The store re-checks the remaining refundable balance atomically with the insert.
/// 3. Re-derive the charge's status from its refund totals.
///
/// The error reports how far the operation got. If step 3 fails, [`RefundApi::resync_refund_status`] completes it.
pub struct RefundApi<B, P> {
    db: B,
    processor: P,
    timeout: Duration,
    producers: EventProducers,
}

impl<B, P> Debug for RefundApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RefundApi (timeout {:?})", self.timeout)
    }
}

impl<B, P> RefundApi<B, P> {
    pub fn new(db: B, processor: P, producers: EventProducers) -> Self {
        Self { db, processor, timeout: DEFAULT_REFUND_TIMEOUT, producers }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl<B, P> RefundApi<B, P>
where
    B: LedgerManagement,
    P: PaymentProcessor,
{
    /// Refunds `amount` of the charge with internal id `transaction_id`, or everything still refundable if `amount` is
    /// `None`.
    pub async fn issue_refund(
        &self,
        org_id: &OrgId,
        transaction_id: i64,
        amount: Option<MinorUnits>,
    ) -> Result<IssuedRefund, RefundError> {
        let deadline = Instant::now() + self.timeout;
        let (request, charge) = timeout_at(deadline, self.prepare_refund(org_id, transaction_id, amount))
            .await
            .map_err(|_| RefundError::Timeout)??;
        let amount = request.amount;
        info!(
            "💸️ Issuing refund of {amount} {} against charge {} (#{transaction_id}) for org {org_id}",
            charge.currency, request.external_charge_id
        );
        let processor_refund =
            timeout_at(deadline, self.processor.create_refund(request)).await.map_err(|_| RefundError::Timeout)??;
        info!("💸️ Processor issued refund {} ({})", processor_refund.id, processor_refund.status);

        let mut metadata = Metadata::new();
        metadata.insert("processor_refund_status".into(), processor_refund.status.clone());
        metadata.insert("org_id".into(), org_id.to_string());
        let new_refund = NewRefund {
            charge_id: transaction_id,
            external_refund_id: Some(processor_refund.id.clone()),
            amount,
            metadata,
        };
        let refund = match timeout_at(deadline, self.db.insert_refund(new_refund)).await {
            Ok(Ok(result)) => result.into_inner(),
            Ok(Err(e)) => {
                error!(
                    "💸️ Refund {} was issued by the processor but could not be recorded against charge #{transaction_id}. \
                     {e}",
                    processor_refund.id
                );
                return Err(e.into());
            },
            Err(_) => {
                error!("💸️ Recording refund {} timed out", processor_refund.id);
                return Err(RefundError::RecordTimeout { processor_refund_id: processor_refund.id });
            },
        };
        info!("💸️ Refund {} recorded as #{} against charge #{transaction_id}", processor_refund.id, refund.id);

        let charge = match timeout_at(deadline, self.db.sync_charge_refund_status(transaction_id)).await {
            Ok(Ok(charge)) => charge,
            Ok(Err(e)) => return Err(self.sync_pending(refund, e.to_string())),
            Err(_) => return Err(self.sync_pending(refund, "timed out".to_string())),
        };
        self.producers.publish_refund_issued(RefundIssuedEvent::new(charge.clone(), refund.clone())).await;
        Ok(IssuedRefund { refund, charge })
    }

    /// Re-derives the charge's refund status from the refund rows recorded against it. Safe to repeat.
    pub async fn resync_refund_status(&self, org_id: &OrgId, transaction_id: i64) -> Result<Transaction, RefundError> {
        let _ = self.owned_charge(org_id, transaction_id).await?;
        let charge = self.db.sync_charge_refund_status(transaction_id).await?;
        debug!("💸️ Charge #{transaction_id} resynced. Status is {}", charge.status);
        Ok(charge)
    }

    async fn prepare_refund(
        &self,
        org_id: &OrgId,
        transaction_id: i64,
        amount: Option<MinorUnits>,
    ) -> Result<(RefundRequest, Transaction), RefundError> {
        let (refundable, external_account_id) = self.owned_charge(org_id, transaction_id).await?;
        let RefundableCharge { charge, refunded } = &refundable;
        let remaining = refundable.remaining();
        let refundable_status = matches!(charge.status, TransactionStatus::Succeeded | TransactionStatus::PartiallyRefunded);
        if !refundable_status || !remaining.is_positive() {
            return Err(RefundError::NotRefundable { id: transaction_id, status: charge.status });
        }
        let amount = amount.unwrap_or(remaining);
        if !amount.is_positive() {
            return Err(RefundError::InvalidAmount(amount));
        }
        if amount > remaining {
            return Err(RefundError::ExceedsRefundableBalance { requested: amount, remaining });
        }
        let Some(external_charge_id) = charge.external_charge_id.clone() else {
            return Err(RefundError::NotRefundable { id: transaction_id, status: charge.status });
        };
        let idempotency_key = format!("vpg-refund-{transaction_id}-{refunded}-{amount}");
        let request = RefundRequest { external_account_id, external_charge_id, amount, idempotency_key };
        Ok((request, refundable.charge))
    }

    /// The charge, if it exists and belongs to one of the organization's accounts. A charge owned by another
    /// organization is reported as not found.
    async fn owned_charge(
        &self,
        org_id: &OrgId,
        transaction_id: i64,
    ) -> Result<(RefundableCharge, String), RefundError> {
        let refundable = self
            .db
            .fetch_refundable_charge(transaction_id)
            .await?
            .ok_or(RefundError::TransactionNotFound(transaction_id))?;
        let account = self
            .db
            .fetch_account(refundable.charge.account_id)
            .await?
            .filter(|a| &a.org_id == org_id)
            .ok_or(RefundError::TransactionNotFound(transaction_id))?;
        Ok((refundable, account.external_account_id))
    }

    fn sync_pending(&self, refund: Transaction, reason: String) -> RefundError {
        warn!("💸️ Refund #{} is recorded but the charge status could not be updated. {reason}", refund.id);
        RefundError::StatusSyncPending { refund: Box::new(refund), reason }
    }
}
