//! Outbound client for the payment processor's REST API.
use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
};
use serde::Deserialize;
use venue_payment_engine::traits::{PaymentProcessor, ProcessorClientError, ProcessorRefund, RefundRequest};

use crate::{config::ProcessorConfig, errors::ServerError};

const API_VERSION: &str = "2024-06-20";

#[derive(Clone)]
pub struct StripeClient {
    config: ProcessorConfig,
    client: Arc<Client>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

impl StripeClient {
    pub fn new(config: ProcessorConfig) -> Result<Self, ServerError> {
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert("Stripe-Version", HeaderValue::from_static(API_VERSION));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ServerError::InitializeError(format!("Could not create the processor client. {e}")))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/v1/{path}", self.config.api_url.trim_end_matches('/'))
    }
}

impl PaymentProcessor for StripeClient {
    async fn create_refund(&self, request: RefundRequest) -> Result<ProcessorRefund, ProcessorClientError> {
        let url = self.url("refunds");
        debug!(
            "💸️ Requesting refund of {} on charge {} for account {}",
            request.amount, request.external_charge_id, request.external_account_id
        );
        let amount = request.amount.value().to_string();
        let response = self
            .client
            .post(url)
            .basic_auth(self.config.api_key.reveal(), None::<&str>)
            .header("Stripe-Account", request.external_account_id.as_str())
            .header("Idempotency-Key", request.idempotency_key.as_str())
            .form(&[("charge", request.external_charge_id.as_str()), ("amount", amount.as_str())])
            .send()
            .await
            .map_err(|e| ProcessorClientError::Transport(e.to_string()))?;
        if response.status().is_success() {
            trace!("💸️ Refund request successful. {}", response.status());
            response.json::<ProcessorRefund>().await.map_err(|e| ProcessorClientError::InvalidResponse(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let text = response.text().await.map_err(|e| ProcessorClientError::Transport(e.to_string()))?;
            let message = serde_json::from_str::<ErrorBody>(&text).ok().and_then(|b| b.error.message).unwrap_or(text);
            warn!("💸️ The payment processor rejected the refund ({status}): {message}");
            Err(ProcessorClientError::Rejected { status, message })
        }
    }
}
