use std::{fmt::Debug, time::Duration};

use log::*;

use crate::{
    db_types::{Admission, NewWebhookEvent},
    traits::{WebhookEventError, WebhookEventManagement},
};

pub const DEFAULT_LEASE: Duration = Duration::from_secs(60);

/// The idempotency gate decides, per delivery, whether the event handlers must run.
///
/// Every decision is a single atomic claim in the webhook event ledger, so concurrent deliveries of the same event,
/// from this process or any other instance sharing the store, see exactly one `FirstSeen` or `RetryPending`. The
/// claimant holds a lease; if it dies without reporting back, the event becomes claimable again when the lease runs
/// out.
#[derive(Clone)]
pub struct IdempotencyGate<B> {
    db: B,
    lease: Duration,
}

impl<B> Debug for IdempotencyGate<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "IdempotencyGate (lease {:?})", self.lease)
    }
}

impl<B> IdempotencyGate<B> {
    pub fn new(db: B) -> Self {
        Self { db, lease: DEFAULT_LEASE }
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }
}

impl<B> IdempotencyGate<B>
where B: WebhookEventManagement
{
    pub async fn admit(&self, event: NewWebhookEvent) -> Result<Admission, WebhookEventError> {
        let event_id = event.event_id.clone();
        let admission = self.db.claim_event(event, self.lease).await?;
        debug!("🚦️ Webhook event {event_id}: {admission:?}");
        Ok(admission)
    }

    /// Claims an already recorded event, e.g. for an operator replay.
    pub async fn admit_existing(&self, event_id: &str) -> Result<Admission, WebhookEventError> {
        let admission = self.db.claim_existing_event(event_id, self.lease).await?;
        debug!("🚦️ Webhook event {event_id} (replay): {admission:?}");
        Ok(admission)
    }

    pub async fn mark_processed(&self, event_id: &str) -> Result<(), WebhookEventError> {
        self.db.mark_event_processed(event_id).await?;
        trace!("🚦️ Webhook event {event_id} marked as processed");
        Ok(())
    }

    pub async fn record_failure(&self, event_id: &str, error: &str) -> Result<(), WebhookEventError> {
        self.db.record_event_failure(event_id, error).await?;
        trace!("🚦️ Failure recorded for webhook event {event_id}");
        Ok(())
    }
}
