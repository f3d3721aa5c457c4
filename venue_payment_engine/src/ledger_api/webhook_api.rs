use std::{fmt::Debug, time::Duration};

use log::*;

use crate::{
    db_types::{Admission, NewWebhookEvent, WebhookEventRecord},
    events::{EventProducers, WebhookProcessedEvent},
    ledger_api::{
        errors::WebhookApiError,
        fee_policy_api::FeePolicyApi,
        idempotency_gate::IdempotencyGate,
        reconciliation_api::{DispatchOutcome, ReconciliationApi},
    },
    processor_events::{ProcessorEvent, WebhookEnvelope},
    traits::{FeeSettings, LedgerManagement, WebhookEventError, WebhookEventManagement},
};

/// The result of one delivery of a webhook event. Every variant is acknowledged to the processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// This delivery held the claim and the handlers completed.
    Processed { admission: Admission, outcome: DispatchOutcome },
    /// The event was already processed, or is being processed by another worker. Handlers did not run.
    Duplicate(Admission),
    /// The handlers failed. The error is recorded against the event, which stays unprocessed for a later retry.
    Failed { admission: Admission, error: String },
}

impl DeliveryOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, DeliveryOutcome::Failed { .. })
    }
}

/// `WebhookApi` is the entry point for processor notifications.
///
/// A delivery is parsed and validated first, then admitted through the [`IdempotencyGate`], and finally dispatched to
/// the [`ReconciliationApi`]. Handler failures are recorded in the webhook event ledger rather than returned, so that
/// the transport can acknowledge the delivery. Replays of recorded events go through the same path.
pub struct WebhookApi<B> {
    db: B,
    gate: IdempotencyGate<B>,
    reconciler: ReconciliationApi<B>,
    producers: EventProducers,
}

impl<B> Debug for WebhookApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WebhookApi ({:?})", self.gate)
    }
}

impl<B: Clone> WebhookApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        let gate = IdempotencyGate::new(db.clone());
        let reconciler = ReconciliationApi::new(db.clone(), producers.clone());
        Self { db, gate, reconciler, producers }
    }

    /// Sets how long a claim on an event lasts before another delivery may retry it.
    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.gate = self.gate.with_lease(lease);
        self
    }

    pub fn with_fee_policy(mut self, fees: FeePolicyApi<B>) -> Self {
        self.reconciler = self.reconciler.with_fee_policy(fees);
        self
    }
}

impl<B> WebhookApi<B>
where B: LedgerManagement + WebhookEventManagement + FeeSettings
{
    /// Processes one delivery of a verified webhook payload.
    ///
    /// Returns an error only if the payload is malformed, or if the webhook event ledger cannot be reached to admit
    /// the event. In the latter case nothing has been applied and the delivery should be retried by the transport.
    pub async fn process_delivery(&self, payload: &str) -> Result<DeliveryOutcome, WebhookApiError> {
        let envelope = WebhookEnvelope::parse(payload)?;
        let event = ProcessorEvent::try_from(&envelope)?;
        let record = NewWebhookEvent::new(envelope.id.as_str(), envelope.event_type.as_str(), payload);
        let admission = self.gate.admit(record).await.map_err(WebhookApiError::GateUnavailable)?;
        if !admission.should_process() {
            info!("🪝️ Webhook event {} ({}) short-circuited: {admission:?}", envelope.id, envelope.event_type);
            return Ok(DeliveryOutcome::Duplicate(admission));
        }
        Ok(self.run_handlers(&envelope, &event, admission).await)
    }

    /// Re-runs the handlers for a recorded event using its stored payload.
    pub async fn replay_event(&self, event_id: &str) -> Result<DeliveryOutcome, WebhookApiError> {
        let record = self
            .db
            .fetch_event(event_id)
            .await
            .map_err(WebhookApiError::GateUnavailable)?
            .ok_or_else(|| WebhookApiError::EventNotFound(event_id.to_string()))?;
        if record.processed {
            return Ok(DeliveryOutcome::Duplicate(Admission::AlreadyProcessed));
        }
        let envelope = WebhookEnvelope::parse(&record.payload)?;
        let event = ProcessorEvent::try_from(&envelope)?;
        let admission = self.gate.admit_existing(event_id).await.map_err(|e| match e {
            WebhookEventError::EventNotFound(id) => WebhookApiError::EventNotFound(id),
            e => WebhookApiError::GateUnavailable(e),
        })?;
        if !admission.should_process() {
            info!("🪝️ Replay of webhook event {event_id} short-circuited: {admission:?}");
            return Ok(DeliveryOutcome::Duplicate(admission));
        }
        info!("🪝️ Replaying webhook event {event_id} (attempt {})", record.attempts + 1);
        Ok(self.run_handlers(&envelope, &event, admission).await)
    }

    /// The oldest events whose handlers have not completed.
    pub async fn pending_events(&self, limit: i64) -> Result<Vec<WebhookEventRecord>, WebhookApiError> {
        self.db.fetch_unprocessed_events(limit).await.map_err(WebhookApiError::GateUnavailable)
    }

    async fn run_handlers(
        &self,
        envelope: &WebhookEnvelope,
        event: &ProcessorEvent,
        admission: Admission,
    ) -> DeliveryOutcome {
        let event_id = envelope.id.as_str();
        match self.reconciler.dispatch(event).await {
            Ok(outcome) => {
                if let Err(e) = self.gate.mark_processed(event_id).await {
                    // The ledger changes are in place. The event stays claimable and will be re-applied harmlessly.
                    error!("🪝️ Webhook event {event_id} was applied but could not be marked as processed. {e}");
                }
                info!("🪝️ Webhook event {event_id} ({}) processed: {outcome}", envelope.event_type);
                let hook = WebhookProcessedEvent::new(event_id, envelope.event_type.as_str(), admission);
                self.producers.publish_webhook_processed(hook).await;
                DeliveryOutcome::Processed { admission, outcome }
            },
            Err(e) => {
                let error = e.to_string();
                error!("🪝️ Webhook event {event_id} ({}) failed and will be retried. {error}", envelope.event_type);
                if let Err(e) = self.gate.record_failure(event_id, &error).await {
                    error!("🪝️ Could not record the failure of webhook event {event_id}. {e}");
                }
                DeliveryOutcome::Failed { admission, error }
            },
        }
    }
}
