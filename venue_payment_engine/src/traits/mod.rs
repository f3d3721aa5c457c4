//! # Storage and collaborator interfaces
//!
//! This module defines the behaviour that backends must expose to support the venue payment engine.
//!
//! * [`LedgerManagement`] is the ledger store: connected accounts, transactions and payouts, with keyed inserts,
//!   conditional updates and filtered reporting queries.
//! * [`WebhookEventManagement`] is the idempotency ledger for webhook events. Its claim operations must be atomic and
//!   backed by a uniqueness constraint on the event id.
//! * [`FeeSettings`] stores the platform fee settings.
//! * [`PaymentProcessor`] is the outbound client to the payment processor, used for issuing refunds.
mod data_objects;
mod fee_settings;
mod ledger_management;
mod payment_processor;
mod webhook_event_management;

pub use data_objects::{AccountChanged, InsertResult, PayoutQueryFilter, RefundableCharge, TransactionQueryFilter};
pub use fee_settings::{FeePolicyError, FeeSettings};
pub use ledger_management::{LedgerError, LedgerManagement};
pub use payment_processor::{PaymentProcessor, ProcessorClientError, ProcessorRefund, RefundRequest};
pub use webhook_event_management::{WebhookEventError, WebhookEventManagement};
