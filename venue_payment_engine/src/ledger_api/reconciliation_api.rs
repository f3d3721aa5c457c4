use std::fmt::{Debug, Display};

use log::*;

use crate::{
    db_types::{
        FeeSource,
        MinorUnits,
        NewCharge,
        NewPayout,
        PayoutUpdate,
        ProcessorFee,
        TransactionStatus,
    },
    events::{AccountStatusChangedEvent, ChargeRecordedEvent, EventProducers},
    helpers::estimate_processor_fee,
    ledger_api::{errors::ReconcileError, fee_policy_api::FeePolicyApi},
    processor_events::{
        objects::{AccountObject, ChargeObject, DisputeObject, PayoutObject},
        PayoutEventKind,
        ProcessorEvent,
    },
    traits::{AccountChanged, FeeSettings, InsertResult, LedgerManagement},
};

/// What a handler did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The ledger reflects the event. This includes events whose effect had already been applied.
    Applied,
    /// The event could not be attributed to anything in the ledger, or its type is not tracked. Nothing was changed
    /// and nothing will change on retry, so the event counts as processed.
    Ignored(String),
}

impl Display for DispatchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchOutcome::Applied => write!(f, "applied"),
            DispatchOutcome::Ignored(reason) => write!(f, "ignored ({reason})"),
        }
    }
}

/// `ReconciliationApi` applies processor events to the ledger.
///
/// [`ReconciliationApi::dispatch`] invokes exactly one handler per event. Every handler is a keyed insert-if-absent or
/// a conditional update, so running it again after a partial failure converges on the same ledger state.
pub struct ReconciliationApi<B> {
    db: B,
    fees: FeePolicyApi<B>,
    producers: EventProducers,
}

impl<B> Debug for ReconciliationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi")
    }
}

impl<B: Clone> ReconciliationApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        let fees = FeePolicyApi::new(db.clone());
        Self { db, fees, producers }
    }

    pub fn with_fee_policy(mut self, fees: FeePolicyApi<B>) -> Self {
        self.fees = fees;
        self
    }
}

impl<B> ReconciliationApi<B>
where B: LedgerManagement + FeeSettings
{
    pub async fn dispatch(&self, event: &ProcessorEvent) -> Result<DispatchOutcome, ReconcileError> {
        trace!("🔄️ Dispatching {event}");
        match event {
            ProcessorEvent::AccountUpdated { account } => self.on_account_updated(account).await,
            ProcessorEvent::AccountDeauthorized { external_account_id } => {
                self.on_account_deauthorized(external_account_id).await
            },
            ProcessorEvent::AccountReauthorized { external_account_id } => {
                self.on_account_reauthorized(external_account_id).await
            },
            ProcessorEvent::PayoutCreated { external_account_id, payout } => {
                self.on_payout_created(external_account_id.as_deref(), payout).await
            },
            ProcessorEvent::PayoutUpdated { kind, payout } => self.on_payout_updated(*kind, payout).await,
            ProcessorEvent::ChargeSucceeded { external_account_id, charge } => {
                self.on_charge(external_account_id.as_deref(), charge, TransactionStatus::Succeeded).await
            },
            ProcessorEvent::ChargeFailed { external_account_id, charge } => {
                self.on_charge(external_account_id.as_deref(), charge, TransactionStatus::Failed).await
            },
            ProcessorEvent::ChargeRefunded { charge } => self.on_charge_refunded(charge).await,
            ProcessorEvent::DisputeCreated { dispute } => self.on_dispute_created(dispute).await,
            ProcessorEvent::Unknown { event_type } => {
                info!("🔄️ Ignoring event of untracked type {event_type}");
                Ok(DispatchOutcome::Ignored(format!("untracked event type {event_type}")))
            },
        }
    }

    //---------------------------------------------- Accounts ----------------------------------------------------------
    async fn on_account_updated(&self, account: &AccountObject) -> Result<DispatchOutcome, ReconcileError> {
        let update = account.to_update();
        match self.db.upsert_account(update).await? {
            Some(changed) => {
                if changed.new.is_disabled() {
                    info!(
                        "🔄️ Account {} is disabled. Capabilities refreshed, status left unchanged.",
                        changed.new.external_account_id
                    );
                }
                self.notify_account_change(changed).await;
                Ok(DispatchOutcome::Applied)
            },
            None => Ok(ignored(format!("account {} is not in the ledger and carries no organization id", account.id))),
        }
    }

    async fn on_account_deauthorized(&self, external_account_id: &str) -> Result<DispatchOutcome, ReconcileError> {
        match self.db.disable_account(external_account_id).await? {
            Some(changed) => {
                info!("🔄️ Account {external_account_id} has been deauthorized and is now disabled");
                self.notify_account_change(changed).await;
                Ok(DispatchOutcome::Applied)
            },
            None => Ok(ignored(format!("deauthorized account {external_account_id} is not in the ledger"))),
        }
    }

    async fn on_account_reauthorized(&self, external_account_id: &str) -> Result<DispatchOutcome, ReconcileError> {
        match self.db.reauthorize_account(external_account_id).await? {
            Some(changed) => {
                if changed.status_changed() {
                    info!("🔄️ Account {external_account_id} re-authorized. Status is now {}", changed.new.status);
                }
                self.notify_account_change(changed).await;
                Ok(DispatchOutcome::Applied)
            },
            None => Ok(ignored(format!("re-authorized account {external_account_id} is not in the ledger"))),
        }
    }

    async fn notify_account_change(&self, changed: AccountChanged) {
        if changed.status_changed() {
            debug!(
                "🔄️ Account {} status: {:?} -> {}",
                changed.new.external_account_id,
                changed.old_status(),
                changed.new.status
            );
            let event = AccountStatusChangedEvent::new(changed.old_status(), changed.new);
            self.producers.publish_account_status_changed(event).await;
        }
    }

    //---------------------------------------------- Payouts -----------------------------------------------------------
    async fn on_payout_created(
        &self,
        external_account_id: Option<&str>,
        payout: &PayoutObject,
    ) -> Result<DispatchOutcome, ReconcileError> {
        let Some(external_account_id) = external_account_id else {
            return Ok(ignored(format!("payout {} has no connected account", payout.id)));
        };
        let Some(account) = self.db.fetch_account_by_external_id(external_account_id).await? else {
            return Ok(ignored(format!("payout {} is for unknown account {external_account_id}", payout.id)));
        };
        let new_payout = NewPayout {
            account_id: account.id,
            external_payout_id: payout.id.clone(),
            amount: payout.amount,
            currency: payout.currency.clone(),
            status: payout.status,
            arrival_date: payout.arrival(),
        };
        match self.db.insert_payout(new_payout).await? {
            InsertResult::Inserted(p) => info!(
                "🔄️ Payout {} of {} {} recorded for account {external_account_id} ({})",
                p.external_payout_id, p.amount, p.currency, p.status
            ),
            InsertResult::AlreadyExists(p) => debug!("🔄️ Payout {} was already recorded", p.external_payout_id),
        }
        Ok(DispatchOutcome::Applied)
    }

    async fn on_payout_updated(
        &self,
        kind: PayoutEventKind,
        payout: &PayoutObject,
    ) -> Result<DispatchOutcome, ReconcileError> {
        let update = PayoutUpdate {
            external_payout_id: payout.id.clone(),
            status: kind.status(payout),
            arrival_date: payout.arrival(),
            failure_code: payout.failure_code.clone(),
            failure_message: payout.failure_message.clone(),
        };
        let status = update.status;
        if let Some(p) = self.db.update_payout(update).await? {
            info!("🔄️ Payout {} is now {}", p.external_payout_id, p.status);
            return Ok(DispatchOutcome::Applied);
        }
        match self.db.fetch_payout_by_external_id(&payout.id).await? {
            Some(p) if p.status == status => Ok(DispatchOutcome::Applied),
            Some(p) => Ok(ignored(format!("payout {} is {} and cannot move to {status}", p.external_payout_id, p.status))),
            None => Ok(ignored(format!("payout {} is not in the ledger yet", payout.id))),
        }
    }

    //---------------------------------------------- Charges -----------------------------------------------------------
    async fn on_charge(
        &self,
        external_account_id: Option<&str>,
        charge: &ChargeObject,
        status: TransactionStatus,
    ) -> Result<DispatchOutcome, ReconcileError> {
        let Some(external_account_id) = external_account_id else {
            return Ok(ignored(format!("charge {} has no connected account", charge.id)));
        };
        let Some(account) = self.db.fetch_account_by_external_id(external_account_id).await? else {
            return Ok(ignored(format!("charge {} is for unknown account {external_account_id}", charge.id)));
        };
        if let Some(existing) = self.db.fetch_charge_by_external_id(&charge.id).await? {
            debug!("🔄️ Charge {} was already recorded as #{}", charge.id, existing.id);
            return Ok(DispatchOutcome::Applied);
        }
        let (platform_fee, processor_fee) = if status == TransactionStatus::Failed {
            (MinorUnits::ZERO, ProcessorFee::none())
        } else {
            let platform_fee = self.fees.compute_fee_amount(&account.org_id, charge.amount).await?;
            let processor_fee = match charge.reported_fee() {
                Some(fee) => ProcessorFee::reported(fee),
                None => ProcessorFee::estimated(estimate_processor_fee(charge.amount)),
            };
            (platform_fee, processor_fee)
        };
        let new_charge = NewCharge {
            account_id: account.id,
            external_charge_id: charge.id.clone(),
            external_payment_intent_id: charge.payment_intent.clone(),
            status,
            amount: charge.amount,
            currency: charge.currency.clone(),
            platform_fee,
            processor_fee,
            metadata: charge.metadata.clone(),
        };
        match self.db.insert_charge(new_charge).await? {
            InsertResult::Inserted(txn) => {
                let estimated = if txn.processor_fee_source == FeeSource::Estimated { " (estimated)" } else { "" };
                info!(
                    "🔄️ Charge {} recorded as #{} for account {external_account_id}: {} {} {}, platform fee {}, \
                     processor fee {}{estimated}, net {}",
                    charge.id,
                    txn.id,
                    txn.status,
                    txn.amount,
                    txn.currency,
                    txn.platform_fee,
                    txn.processor_fee,
                    txn.net_amount
                );
                self.producers.publish_charge_recorded(ChargeRecordedEvent::new(txn)).await;
            },
            InsertResult::AlreadyExists(txn) => debug!("🔄️ Charge {} was already recorded as #{}", charge.id, txn.id),
        }
        Ok(DispatchOutcome::Applied)
    }

    async fn on_charge_refunded(&self, charge: &ChargeObject) -> Result<DispatchOutcome, ReconcileError> {
        let status = TransactionStatus::for_refunded_amount(charge.amount, charge.amount_refunded);
        if status == TransactionStatus::Succeeded {
            return Ok(ignored(format!("refund notification for charge {} carries no refunded amount", charge.id)));
        }
        let outcome = self.move_charge_to(&charge.id, status).await?;
        self.warn_on_unrecorded_refunds(charge).await?;
        Ok(outcome)
    }

    /// Refunds made outside the gateway only change the charge status. The refundable balance is computed from refund
    /// rows, so it overstates what is left until an operator records them.
    async fn warn_on_unrecorded_refunds(&self, charge: &ChargeObject) -> Result<(), ReconcileError> {
        let Some(txn) = self.db.fetch_charge_by_external_id(&charge.id).await? else {
            return Ok(());
        };
        let Some(refundable) = self.db.fetch_refundable_charge(txn.id).await? else {
            return Ok(());
        };
        let unrecorded = refundable.unrecorded_refunds(charge.amount_refunded);
        if unrecorded.is_positive() {
            warn!(
                "🔄️ The processor reports {} refunded on charge {} (#{}) but the ledger has refund rows for {}. {} was \
                 refunded outside the gateway and is still counted as refundable.",
                charge.amount_refunded, charge.id, txn.id, refundable.refunded, unrecorded
            );
        }
        Ok(())
    }

    async fn on_dispute_created(&self, dispute: &DisputeObject) -> Result<DispatchOutcome, ReconcileError> {
        info!("🔄️ Dispute {} opened against charge {} for {}", dispute.id, dispute.charge, dispute.amount);
        self.move_charge_to(&dispute.charge, TransactionStatus::Disputed).await
    }

    async fn move_charge_to(
        &self,
        external_charge_id: &str,
        status: TransactionStatus,
    ) -> Result<DispatchOutcome, ReconcileError> {
        if let Some(txn) = self.db.update_charge_status(external_charge_id, status).await? {
            info!("🔄️ Charge {external_charge_id} (#{}) is now {}", txn.id, txn.status);
            return Ok(DispatchOutcome::Applied);
        }
        match self.db.fetch_charge_by_external_id(external_charge_id).await? {
            Some(txn) if txn.status == status => Ok(DispatchOutcome::Applied),
            Some(txn) => Ok(ignored(format!("charge {external_charge_id} is {} and cannot move to {status}", txn.status))),
            None => Ok(ignored(format!("charge {external_charge_id} is not in the ledger"))),
        }
    }
}

fn ignored(reason: String) -> DispatchOutcome {
    warn!("🔄️ Event not applied: {reason}");
    DispatchOutcome::Ignored(reason)
}
