//! Request handler definitions
//!
//! Define each route and it handler here.
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every ledger and processor call below is awaited, so workers keep
//! serving other requests while one waits on the database or the payment processor.
//!
//! ## Webhooks
//! The webhook route acknowledges every delivery it accepted with `200 {"received": true}`, including deliveries whose
//! handlers failed. Those failures are recorded against the event and are retried on redelivery or by an operator
//! replay. Only malformed payloads (`400`), bad signatures (`403`) and an unreachable event ledger (`503`) are refused.
//!
//! ## Operator routes
//! Everything under `/api` sits behind the operator key middleware. See [`crate::middleware::OperatorAuthFactory`].
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use venue_payment_engine::{
    db_types::{NewConnectedAccount, OrgId},
    traits::{FeeSettings, InsertResult, LedgerManagement, PaymentProcessor, WebhookEventManagement},
    DeliveryOutcome,
    FeePolicyApi,
    LedgerApi,
    RefundApi,
    RefundError,
    WebhookApi,
};

use crate::{
    data_objects::{
        FeeOverrideParams,
        JsonResponse,
        LedgerQueryParams,
        PendingEventsParams,
        PendingStatusSync,
        PlatformFeeParams,
        ReceivedResponse,
        RefundParams,
        RegisterAccountParams,
        ReplayReport,
    },
    errors::ServerError,
};

pub const SUPPORTED_PROVIDER: &str = "stripe";
const DEFAULT_PENDING_LIMIT: i64 = 100;

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal where $gen:ident: $($bounds:ty),+)  => {
        paste::paste! { pub struct [<$name:camel Route>]<$gen>(core::marker::PhantomData<fn() -> $gen>);}
        paste::paste! { impl<$gen> [<$name:camel Route>]<$gen> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> $gen>)
            }
        }}
        paste::paste! { impl<$gen> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$gen>
        where
            $gen: $($bounds +)+ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<$gen>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Webhooks  ----------------------------------------------------
route!(webhook => Post "/{provider}" where B: LedgerManagement, WebhookEventManagement, FeeSettings);
/// Route handler for processor webhooks.
///
/// The signature middleware has already checked the body, so the handler works on exactly the bytes that were signed.
pub async fn webhook<B>(
    path: web::Path<String>,
    body: web::Bytes,
    api: web::Data<WebhookApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: LedgerManagement + WebhookEventManagement + FeeSettings,
{
    let provider = path.into_inner();
    if provider != SUPPORTED_PROVIDER {
        debug!("🪝️ Received a webhook for unsupported provider {provider}");
        return Err(ServerError::UnknownProvider(provider));
    }
    let payload = std::str::from_utf8(&body).map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?;
    match api.process_delivery(payload).await? {
        DeliveryOutcome::Processed { admission, outcome } => {
            debug!("🪝️ Webhook delivery handled ({admission:?}): {outcome}");
        },
        DeliveryOutcome::Duplicate(admission) => {
            debug!("🪝️ Duplicate webhook delivery acknowledged ({admission:?})");
        },
        DeliveryOutcome::Failed { admission, error } => {
            warn!("🪝️ Webhook handlers failed ({admission:?}). The event stays pending for a retry. {error}");
        },
    }
    Ok(HttpResponse::Ok().json(ReceivedResponse::received()))
}

route!(pending_webhooks => Get "/webhooks/pending" where B: LedgerManagement, WebhookEventManagement, FeeSettings);
pub async fn pending_webhooks<B>(
    query: web::Query<PendingEventsParams>,
    api: web::Data<WebhookApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: LedgerManagement + WebhookEventManagement + FeeSettings,
{
    let limit = query.limit.unwrap_or(DEFAULT_PENDING_LIMIT).clamp(1, 1000);
    let events = api.pending_events(limit).await?;
    Ok(HttpResponse::Ok().json(events))
}

route!(replay_webhook => Post "/webhooks/{event_id}/replay" where B: LedgerManagement, WebhookEventManagement, FeeSettings);
pub async fn replay_webhook<B>(
    path: web::Path<String>,
    api: web::Data<WebhookApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: LedgerManagement + WebhookEventManagement + FeeSettings,
{
    let event_id = path.into_inner();
    info!("💻️ Operator replay of webhook event {event_id}");
    let outcome = api.replay_event(&event_id).await?;
    Ok(HttpResponse::Ok().json(ReplayReport::new(&event_id, outcome)))
}

//----------------------------------------------   Refunds  ----------------------------------------------------
route!(issue_refund => Post "/orgs/{org_id}/transactions/{id}/refund" impl LedgerManagement, PaymentProcessor);
/// Issues a refund against a charge. The body is optional: `{"amount": 1200}` refunds 1200 minor units, and an empty
/// body refunds whatever is left.
///
/// If the refund was recorded but the charge status could not be updated, the response is `202 Accepted` with the
/// refund row. Call the `resync` route to finish.
pub async fn issue_refund<B, P>(
    path: web::Path<(String, i64)>,
    body: web::Bytes,
    api: web::Data<RefundApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: LedgerManagement,
    P: PaymentProcessor,
{
    let (org_id, id) = path.into_inner();
    let org_id = OrgId::from(org_id);
    let params = if body.iter().all(u8::is_ascii_whitespace) {
        RefundParams::default()
    } else {
        serde_json::from_slice::<RefundParams>(&body).map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?
    };
    info!("💻️ Refund requested for transaction #{id} of org {org_id}. Amount: {:?}", params.amount);
    match api.issue_refund(&org_id, id, params.amount).await {
        Ok(issued) => Ok(HttpResponse::Ok().json(issued)),
        Err(RefundError::StatusSyncPending { refund, reason }) => {
            let message = format!("The charge status could not be updated ({reason}). Resync the charge to finish.");
            Ok(HttpResponse::Accepted().json(PendingStatusSync { refund: *refund, message }))
        },
        Err(e) => Err(e.into()),
    }
}

route!(resync_refund => Post "/orgs/{org_id}/transactions/{id}/resync" impl LedgerManagement, PaymentProcessor);
pub async fn resync_refund<B, P>(
    path: web::Path<(String, i64)>,
    api: web::Data<RefundApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: LedgerManagement,
    P: PaymentProcessor,
{
    let (org_id, id) = path.into_inner();
    let charge = api.resync_refund_status(&OrgId::from(org_id), id).await?;
    Ok(HttpResponse::Ok().json(charge))
}

//----------------------------------------------   Ledger  ----------------------------------------------------
route!(transactions => Get "/orgs/{org_id}/transactions" impl LedgerManagement);
pub async fn transactions<B: LedgerManagement>(
    path: web::Path<String>,
    query: web::Query<LedgerQueryParams>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let org_id = OrgId::from(path.into_inner());
    let filter = query.transaction_filter(org_id.clone())?;
    trace!("💻️ Transaction query for org {org_id}: {filter}");
    let transactions = api.transactions_for_org(&org_id, filter).await?;
    Ok(HttpResponse::Ok().json(transactions))
}

route!(payouts => Get "/orgs/{org_id}/payouts" impl LedgerManagement);
pub async fn payouts<B: LedgerManagement>(
    path: web::Path<String>,
    query: web::Query<LedgerQueryParams>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let org_id = OrgId::from(path.into_inner());
    let filter = query.payout_filter(org_id.clone())?;
    let payouts = api.payouts_for_org(&org_id, filter).await?;
    Ok(HttpResponse::Ok().json(payouts))
}

route!(register_account => Post "/accounts" impl LedgerManagement);
/// Records the connected account an organization is onboarding with. Registering the same account again is a no-op.
pub async fn register_account<B: LedgerManagement>(
    body: web::Json<RegisterAccountParams>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let RegisterAccountParams { external_account_id, org_id } = body.into_inner();
    match api.register_account(NewConnectedAccount::new(external_account_id, org_id)).await? {
        InsertResult::Inserted(account) => {
            info!("💻️ Registered connected account {} for org {}", account.external_account_id, account.org_id);
            Ok(HttpResponse::Created().json(account))
        },
        InsertResult::AlreadyExists(account) => Ok(HttpResponse::Ok().json(account)),
    }
}

route!(reauthorize_account => Post "/accounts/{account_id}/reauthorize" impl LedgerManagement);
pub async fn reauthorize_account<B: LedgerManagement>(
    path: web::Path<String>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let account = api.reauthorize_account(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(account))
}

//----------------------------------------------   Fees  ----------------------------------------------------
route!(org_fee => Get "/orgs/{org_id}/fee" impl FeeSettings);
pub async fn org_fee<B: FeeSettings>(
    path: web::Path<String>,
    api: web::Data<FeePolicyApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let fee = api.resolve_fee_percent(&OrgId::from(path.into_inner())).await?;
    Ok(HttpResponse::Ok().json(fee))
}

route!(set_org_fee => Put "/orgs/{org_id}/fee" impl FeeSettings);
pub async fn set_org_fee<B: FeeSettings>(
    path: web::Path<String>,
    body: web::Json<FeeOverrideParams>,
    api: web::Data<FeePolicyApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let org_id = OrgId::from(path.into_inner());
    let percent = body.into_inner().percent;
    api.set_org_fee_override(&org_id, percent).await?;
    let message = match percent {
        Some(p) => format!("Platform fee for {org_id} set to {p}%"),
        None => format!("Platform fee override for {org_id} removed"),
    };
    Ok(HttpResponse::Ok().json(JsonResponse::success(message)))
}

route!(set_platform_fee => Put "/settings/platform_fee" impl FeeSettings);
pub async fn set_platform_fee<B: FeeSettings>(
    body: web::Json<PlatformFeeParams>,
    api: web::Data<FeePolicyApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let percent = body.into_inner().percent;
    api.set_platform_fee(percent).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Platform fee set to {percent}%"))))
}
