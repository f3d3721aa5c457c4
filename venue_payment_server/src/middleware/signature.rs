//! Webhook signature middleware for Actix Web.
//!
//! The payment processor signs every webhook with the shared signing secret (`VPG_WEBHOOK_SIGNING_SECRET`). The
//! signature covers the timestamp and the raw request body and is sent in the `Stripe-Signature` header as
//! `t=<timestamp>,v1=<hex hmac>`. See [`crate::helpers::verify_signature`].
//!
//! The body is read in full to check it, then handed back to the wrapped service unchanged, so the handler sees
//! exactly the bytes that were signed.
//!
//! Checks can be switched off with `VPG_WEBHOOK_SIGNATURE_CHECKS=false` for local development. The server logs a
//! warning at startup when they are.

use std::{
    future::{ready, Ready},
    rc::Rc,
    time::Duration,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    web,
    Error,
};
use chrono::Utc;
use futures::future::LocalBoxFuture;
use log::{trace, warn};
use vpg_common::Secret;

use crate::{errors::ServerError, helpers::verify_signature};

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

pub struct SignatureMiddlewareFactory {
    secret: Secret<String>,
    tolerance: Duration,
    // If false, then the middleware will not check the signature and always allow the call
    enabled: bool,
}

impl SignatureMiddlewareFactory {
    pub fn new(secret: Secret<String>, tolerance: Duration, enabled: bool) -> Self {
        SignatureMiddlewareFactory { secret, tolerance, enabled }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SignatureMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = SignatureMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SignatureMiddlewareService {
            secret: self.secret.clone(),
            tolerance: self.tolerance,
            enabled: self.enabled,
            service: Rc::new(service),
        }))
    }
}

pub struct SignatureMiddlewareService<S> {
    secret: Secret<String>,
    tolerance: Duration,
    enabled: bool,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for SignatureMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let secret = self.secret.reveal().clone();
        let tolerance = self.tolerance;
        let enabled = self.enabled;
        Box::pin(async move {
            if !enabled {
                trace!("🔐️ Webhook signature checks are disabled. Allowing request.");
                return service.call(req).await;
            }
            let header = req
                .headers()
                .get(SIGNATURE_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
                .ok_or_else(|| {
                    warn!("🔐️ No webhook signature found in request. Denying access.");
                    ServerError::InvalidSignature("No signature found.".into())
                })?;
            let data = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔐️ Failed to extract request data: {e:?}");
                ServerError::InvalidRequestBody("Failed to extract request data.".into())
            })?;
            match verify_signature(&secret, &header, data.as_ref(), tolerance, Utc::now().timestamp()) {
                Ok(()) => {
                    trace!("🔐️ Webhook signature check ✅️");
                    req.set_payload(bytes_to_payload(data));
                    service.call(req).await
                },
                Err(e) => {
                    warn!("🔐️ Invalid webhook signature. {e}. Denying access.");
                    Err(ServerError::InvalidSignature(e.to_string()).into())
                },
            }
        })
    }
}

fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
