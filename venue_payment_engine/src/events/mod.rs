//! Ledger hooks.
//!
//! The ledger APIs publish an event after each durable change to the ledger. Subscribers register a handler in
//! [`EventHooks`], and the APIs receive the matching [`EventProducers`].
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
