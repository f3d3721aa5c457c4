use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    AccountStatusChangedEvent,
    ChargeRecordedEvent,
    EventHandler,
    EventProducer,
    Handler,
    RefundIssuedEvent,
    WebhookProcessedEvent,
};

type HookFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Default, Clone)]
pub struct EventProducers {
    pub webhook_processed_producer: Vec<EventProducer<WebhookProcessedEvent>>,
    pub charge_recorded_producer: Vec<EventProducer<ChargeRecordedEvent>>,
    pub refund_issued_producer: Vec<EventProducer<RefundIssuedEvent>>,
    pub account_status_producer: Vec<EventProducer<AccountStatusChangedEvent>>,
}

impl EventProducers {
    pub async fn publish_webhook_processed(&self, event: WebhookProcessedEvent) {
        for producer in &self.webhook_processed_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_charge_recorded(&self, event: ChargeRecordedEvent) {
        for producer in &self.charge_recorded_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_refund_issued(&self, event: RefundIssuedEvent) {
        for producer in &self.refund_issued_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_account_status_changed(&self, event: AccountStatusChangedEvent) {
        for producer in &self.account_status_producer {
            producer.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_webhook_processed: Option<EventHandler<WebhookProcessedEvent>>,
    pub on_charge_recorded: Option<EventHandler<ChargeRecordedEvent>>,
    pub on_refund_issued: Option<EventHandler<RefundIssuedEvent>>,
    pub on_account_status_changed: Option<EventHandler<AccountStatusChangedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_webhook_processed = hooks.on_webhook_processed.map(|f| EventHandler::new(buffer_size, f));
        let on_charge_recorded = hooks.on_charge_recorded.map(|f| EventHandler::new(buffer_size, f));
        let on_refund_issued = hooks.on_refund_issued.map(|f| EventHandler::new(buffer_size, f));
        let on_account_status_changed = hooks.on_account_status_changed.map(|f| EventHandler::new(buffer_size, f));
        Self { on_webhook_processed, on_charge_recorded, on_refund_issued, on_account_status_changed }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_webhook_processed {
            result.webhook_processed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_charge_recorded {
            result.charge_recorded_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_refund_issued {
            result.refund_issued_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_account_status_changed {
            result.account_status_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_webhook_processed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_charge_recorded {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_refund_issued {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_account_status_changed {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_webhook_processed: Option<Handler<WebhookProcessedEvent>>,
    pub on_charge_recorded: Option<Handler<ChargeRecordedEvent>>,
    pub on_refund_issued: Option<Handler<RefundIssuedEvent>>,
    pub on_account_status_changed: Option<Handler<AccountStatusChangedEvent>>,
}

impl EventHooks {
    pub fn on_webhook_processed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(WebhookProcessedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_webhook_processed = Some(Arc::new(f));
        self
    }

    pub fn on_charge_recorded<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(ChargeRecordedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_charge_recorded = Some(Arc::new(f));
        self
    }

    pub fn on_refund_issued<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(RefundIssuedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_refund_issued = Some(Arc::new(f));
        self
    }

    pub fn on_account_status_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(AccountStatusChangedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_account_status_changed = Some(Arc::new(f));
        self
    }
}
