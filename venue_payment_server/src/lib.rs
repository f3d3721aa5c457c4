//! # Venue payment server
//! This crate hosts the HTTP surface of the venue payment gateway. It is responsible for:
//! * Receiving webhooks from the payment processor, checking their signatures, and handing them to the reconciliation
//!   engine in [`venue_payment_engine`].
//! * Serving the operator API: refunds, webhook replay, fee settings, account onboarding and ledger reports.
//! * Issuing refunds through the processor's REST API ([`processor_client::StripeClient`]).
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/webhooks/{provider}`: Processor webhooks. Only `stripe` is supported.
//! * `/api/...`: Operator routes. See [routes](routes/index.html).

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod middleware;
pub mod processor_client;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
