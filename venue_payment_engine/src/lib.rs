//! Venue Payment Engine
//!
//! The payment engine keeps a local ledger of connected merchant accounts, transactions and payouts consistent with
//! the payment processor, which reports changes through at-least-once, unordered webhook notifications.
//!
//! The library is divided into three main sections:
//! 1. The storage traits ([`mod@traits`]) and their SQLite implementation ([`SqliteDatabase`]). The data types used in
//!    the ledger are defined in [`mod@db_types`] and are public. Every write is keyed, which is what makes replaying
//!    an event safe.
//! 2. The processor event model ([`mod@processor_events`]). Payloads are validated into a [`ProcessorEvent`] at the
//!    boundary, so the handlers work on known shapes.
//! 3. The public API ([`mod@ledger_api`]): webhook ingestion through an idempotency gate, the reconciliation
//!    handlers, fee policy, refunds and ledger queries.
//!
//! The engine also publishes events when the ledger changes (see [`mod@events`]). Subscribers register hooks and
//! receive a copy of each event.
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod ledger_api;
pub mod processor_events;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use ledger_api::{
    errors::{ReconcileError, RefundError, WebhookApiError},
    DeliveryOutcome,
    DispatchOutcome,
    FeePolicyApi,
    IdempotencyGate,
    IssuedRefund,
    LedgerApi,
    ReconciliationApi,
    RefundApi,
    ResolvedFee,
    WebhookApi,
};
pub use processor_events::ProcessorEvent;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{FeeSettings, LedgerManagement, PaymentProcessor, WebhookEventManagement};
