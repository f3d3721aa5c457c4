use std::time::Duration;

use thiserror::Error;

use crate::db_types::{Admission, NewWebhookEvent, WebhookEventRecord};

#[derive(Debug, Clone, Error)]
pub enum WebhookEventError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Webhook event {0} has not been recorded")]
    EventNotFound(String),
}

impl From<sqlx::Error> for WebhookEventError {
    fn from(e: sqlx::Error) -> Self {
        WebhookEventError::DatabaseError(e.to_string())
    }
}

/// The idempotency ledger of webhook events.
///
/// Claims are atomic operations backed by the uniqueness of the event id. A claim holds a lease for the given
/// duration; no other caller can claim the same event while the lease is live.
#[allow(async_fn_in_trait)]
pub trait WebhookEventManagement: Clone {
    /// Inserts the event if it has never been seen, holding the lease. If the event already exists, this behaves like
    /// [`claim_existing_event`](WebhookEventManagement::claim_existing_event). The stored payload is never overwritten.
    async fn claim_event(&self, event: NewWebhookEvent, lease: Duration) -> Result<Admission, WebhookEventError>;

    /// Claims a previously recorded event for a retry, incrementing its attempt counter. Returns
    /// `AlreadyProcessed` or `InFlight` without claiming if the event is processed or currently leased.
    async fn claim_existing_event(&self, event_id: &str, lease: Duration) -> Result<Admission, WebhookEventError>;

    /// Marks the event as processed and releases the lease.
    async fn mark_event_processed(&self, event_id: &str) -> Result<(), WebhookEventError>;

    /// Records the handler error and releases the lease. The event stays unprocessed.
    async fn record_event_failure(&self, event_id: &str, error: &str) -> Result<(), WebhookEventError>;

    async fn fetch_event(&self, event_id: &str) -> Result<Option<WebhookEventRecord>, WebhookEventError>;

    /// Unprocessed events, oldest first.
    async fn fetch_unprocessed_events(&self, limit: i64) -> Result<Vec<WebhookEventRecord>, WebhookEventError>;
}
