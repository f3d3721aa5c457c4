use std::time::Duration;

use mockall::mock;
use venue_payment_engine::{
    db_types::{
        AccountUpdate,
        Admission,
        ConnectedAccount,
        FeePercent,
        NewCharge,
        NewConnectedAccount,
        NewPayout,
        NewRefund,
        NewWebhookEvent,
        OrgId,
        Payout,
        PayoutUpdate,
        Transaction,
        TransactionStatus,
        WebhookEventRecord,
    },
    traits::{
        AccountChanged,
        FeePolicyError,
        FeeSettings,
        InsertResult,
        LedgerError,
        LedgerManagement,
        PaymentProcessor,
        PayoutQueryFilter,
        ProcessorClientError,
        ProcessorRefund,
        RefundRequest,
        RefundableCharge,
        TransactionQueryFilter,
        WebhookEventError,
        WebhookEventManagement,
    },
};

mock! {
    pub Store {}
    impl Clone for Store {
        fn clone(&self) -> Self;
    }
    impl LedgerManagement for Store {
        async fn fetch_account(&self, account_id: i64) -> Result<Option<ConnectedAccount>, LedgerError>;
        async fn fetch_account_by_external_id(&self, external_account_id: &str) -> Result<Option<ConnectedAccount>, LedgerError>;
        async fn fetch_accounts_for_org(&self, org_id: &OrgId) -> Result<Vec<ConnectedAccount>, LedgerError>;
        async fn insert_account(&self, account: NewConnectedAccount) -> Result<InsertResult<ConnectedAccount>, LedgerError>;
        async fn upsert_account(&self, update: AccountUpdate) -> Result<Option<AccountChanged>, LedgerError>;
        async fn disable_account(&self, external_account_id: &str) -> Result<Option<AccountChanged>, LedgerError>;
        async fn reauthorize_account(&self, external_account_id: &str) -> Result<Option<AccountChanged>, LedgerError>;
        async fn fetch_transaction(&self, id: i64) -> Result<Option<Transaction>, LedgerError>;
        async fn fetch_charge_by_external_id(&self, external_charge_id: &str) -> Result<Option<Transaction>, LedgerError>;
        async fn fetch_refundable_charge(&self, id: i64) -> Result<Option<RefundableCharge>, LedgerError>;
        async fn insert_charge(&self, charge: NewCharge) -> Result<InsertResult<Transaction>, LedgerError>;
        async fn update_charge_status(&self, external_charge_id: &str, status: TransactionStatus) -> Result<Option<Transaction>, LedgerError>;
        async fn insert_refund(&self, refund: NewRefund) -> Result<InsertResult<Transaction>, LedgerError>;
        async fn sync_charge_refund_status(&self, charge_id: i64) -> Result<Transaction, LedgerError>;
        async fn search_transactions(&self, query: TransactionQueryFilter) -> Result<Vec<Transaction>, LedgerError>;
        async fn fetch_payout_by_external_id(&self, external_payout_id: &str) -> Result<Option<Payout>, LedgerError>;
        async fn insert_payout(&self, payout: NewPayout) -> Result<InsertResult<Payout>, LedgerError>;
        async fn update_payout(&self, update: PayoutUpdate) -> Result<Option<Payout>, LedgerError>;
        async fn search_payouts(&self, query: PayoutQueryFilter) -> Result<Vec<Payout>, LedgerError>;
    }
    impl WebhookEventManagement for Store {
        async fn claim_event(&self, event: NewWebhookEvent, lease: Duration) -> Result<Admission, WebhookEventError>;
        async fn claim_existing_event(&self, event_id: &str, lease: Duration) -> Result<Admission, WebhookEventError>;
        async fn mark_event_processed(&self, event_id: &str) -> Result<(), WebhookEventError>;
        async fn record_event_failure(&self, event_id: &str, error: &str) -> Result<(), WebhookEventError>;
        async fn fetch_event(&self, event_id: &str) -> Result<Option<WebhookEventRecord>, WebhookEventError>;
        async fn fetch_unprocessed_events(&self, limit: i64) -> Result<Vec<WebhookEventRecord>, WebhookEventError>;
    }
    impl FeeSettings for Store {
        async fn fetch_org_fee_override(&self, org_id: &OrgId) -> Result<Option<FeePercent>, FeePolicyError>;
        async fn set_org_fee_override(&self, org_id: &OrgId, percent: Option<FeePercent>) -> Result<(), FeePolicyError>;
        async fn fetch_platform_fee(&self) -> Result<Option<FeePercent>, FeePolicyError>;
        async fn set_platform_fee(&self, percent: FeePercent) -> Result<(), FeePolicyError>;
    }
}

mock! {
    pub Processor {}
    impl Clone for Processor {
        fn clone(&self) -> Self;
    }
    impl PaymentProcessor for Processor {
        async fn create_refund(&self, request: RefundRequest) -> Result<ProcessorRefund, ProcessorClientError>;
    }
}

/// A store with the expectations set by `setup`. Clones of the store get the same expectations, since the APIs hand
/// copies of the store to their components.
pub fn store_with(setup: fn(&mut MockStore)) -> MockStore {
    let mut store = MockStore::new();
    setup(&mut store);
    store.expect_clone().returning(move || store_with(setup));
    store
}
