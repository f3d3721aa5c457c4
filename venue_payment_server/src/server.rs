use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use futures::FutureExt;
use log::*;
use venue_payment_engine::{
    db_types::AccountStatus,
    events::{EventHandlers, EventHooks, EventProducers},
    FeePolicyApi,
    LedgerApi,
    RefundApi,
    SqliteDatabase,
    WebhookApi,
};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    middleware::{OperatorAuthFactory, SignatureMiddlewareFactory},
    processor_client::StripeClient,
    routes::{
        health,
        IssueRefundRoute,
        OrgFeeRoute,
        PayoutsRoute,
        PendingWebhooksRoute,
        ReauthorizeAccountRoute,
        RegisterAccountRoute,
        ReplayWebhookRoute,
        ResyncRefundRoute,
        SetOrgFeeRoute,
        SetPlatformFeeRoute,
        TransactionsRoute,
        WebhookRoute,
    },
};

const EVENT_BUFFER_SIZE: usize = 25;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    config.validate()?;
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let processor = StripeClient::new(config.processor.clone())?;
    let handlers = create_event_handlers();
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let srv = create_server_instance(config, db, processor, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Logs account status changes that need an operator's attention.
pub fn create_event_handlers() -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_account_status_changed(|ev| {
        let account = ev.account;
        if account.status == AccountStatus::Disabled {
            warn!(
                "📬️ Connected account {} of org {} was disabled. It needs to be re-authorized before it can take \
                 payments again.",
                account.external_account_id, account.org_id
            );
        } else {
            info!("📬️ Connected account {} is now {}", account.external_account_id, account.status);
        }
        async {}.boxed()
    });
    EventHandlers::new(EVENT_BUFFER_SIZE, hooks)
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    processor: StripeClient,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let srv = HttpServer::new(move || {
        let fee_api = FeePolicyApi::new(db.clone()).with_default_fee(config.default_fee);
        let webhook_api = WebhookApi::new(db.clone(), producers.clone())
            .with_lease(config.webhook_lease)
            .with_fee_policy(fee_api.clone());
        let refund_api =
            RefundApi::new(db.clone(), processor.clone(), producers.clone()).with_timeout(config.refund_timeout);
        let ledger_api = LedgerApi::new(db.clone(), producers.clone());
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("vpg::access_log"))
            .app_data(web::Data::new(webhook_api))
            .app_data(web::Data::new(refund_api))
            .app_data(web::Data::new(ledger_api))
            .app_data(web::Data::new(fee_api));
        let webhook_scope = web::scope("/webhooks")
            .wrap(SignatureMiddlewareFactory::new(
                config.webhooks.signing_secret.clone(),
                config.webhooks.tolerance,
                config.webhooks.signature_checks,
            ))
            .service(WebhookRoute::<SqliteDatabase>::new());
        let operator_scope = web::scope("/api")
            .wrap(OperatorAuthFactory::new(config.operator_api_key.clone()))
            .service(IssueRefundRoute::<SqliteDatabase, StripeClient>::new())
            .service(ResyncRefundRoute::<SqliteDatabase, StripeClient>::new())
            .service(TransactionsRoute::<SqliteDatabase>::new())
            .service(PayoutsRoute::<SqliteDatabase>::new())
            .service(OrgFeeRoute::<SqliteDatabase>::new())
            .service(SetOrgFeeRoute::<SqliteDatabase>::new())
            .service(SetPlatformFeeRoute::<SqliteDatabase>::new())
            .service(RegisterAccountRoute::<SqliteDatabase>::new())
            .service(ReauthorizeAccountRoute::<SqliteDatabase>::new())
            .service(PendingWebhooksRoute::<SqliteDatabase>::new())
            .service(ReplayWebhookRoute::<SqliteDatabase>::new());
        app.service(health).service(webhook_scope).service(operator_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
