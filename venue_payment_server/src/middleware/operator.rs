//! Operator authentication middleware.
//!
//! Guards the `/api` scope. Requests must carry `Authorization: Bearer <VPG_OPERATOR_API_KEY>`. If no key is
//! configured, every request is refused.

use std::{pin::Pin, rc::Rc};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error,
};
use futures::{
    future::{ok, Ready},
    Future,
};
use log::warn;
use subtle::ConstantTimeEq;
use vpg_common::Secret;

use crate::errors::ServerError;

pub struct OperatorAuthFactory {
    api_key: Secret<String>,
}

impl OperatorAuthFactory {
    pub fn new(api_key: Secret<String>) -> Self {
        OperatorAuthFactory { api_key }
    }
}

impl<S, B> Transform<S, ServiceRequest> for OperatorAuthFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = OperatorAuthService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(OperatorAuthService { api_key: self.api_key.clone(), service: Rc::new(service) })
    }
}

pub struct OperatorAuthService<S> {
    api_key: Secret<String>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for OperatorAuthService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let authorized = is_authorized(&req, &self.api_key);
        Box::pin(async move {
            if authorized {
                service.call(req).await
            } else {
                warn!("🔐️ Refused operator request to {} from {:?}", req.path(), req.peer_addr());
                Err(ServerError::Unauthorized("A valid operator API key is required.".into()).into())
            }
        })
    }
}

fn is_authorized(req: &ServiceRequest, api_key: &Secret<String>) -> bool {
    if api_key.is_empty() {
        return false;
    }
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|token| bool::from(token.trim().as_bytes().ct_eq(api_key.reveal().as_bytes())))
        .unwrap_or(false)
}
