//! Processor notifications.
//!
//! Deliveries are parsed in two steps: the [`WebhookEnvelope`] common to every notification, then the typed
//! [`ProcessorEvent`] for the event type. Handlers only ever see the typed form.
mod envelope;
pub mod objects;
mod processor_event;

pub use envelope::{EventData, WebhookEnvelope};
pub use processor_event::{EventParseError, PayoutEventKind, ProcessorEvent};
