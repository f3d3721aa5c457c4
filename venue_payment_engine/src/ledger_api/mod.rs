//! The public APIs of the payment engine.
//!
//! Each API is generic over its storage backend and receives the event producers for the hooks it publishes.
//! * [`WebhookApi`] ingests processor notifications: parse, admit through the [`IdempotencyGate`], dispatch.
//! * [`ReconciliationApi`] holds the per-event ledger handlers.
//! * [`FeePolicyApi`] resolves platform fees.
//! * [`RefundApi`] issues operator refunds.
//! * [`LedgerApi`] registers accounts and answers ledger queries.
pub mod errors;
pub mod fee_policy_api;
pub mod idempotency_gate;
pub mod ledger_api;
pub mod reconciliation_api;
pub mod refund_api;
pub mod webhook_api;

pub use fee_policy_api::{FeePolicyApi, ResolvedFee};
pub use idempotency_gate::{IdempotencyGate, DEFAULT_LEASE};
pub use ledger_api::LedgerApi;
pub use reconciliation_api::{DispatchOutcome, ReconciliationApi};
pub use refund_api::{IssuedRefund, RefundApi, DEFAULT_REFUND_TIMEOUT};
pub use webhook_api::{DeliveryOutcome, WebhookApi};
