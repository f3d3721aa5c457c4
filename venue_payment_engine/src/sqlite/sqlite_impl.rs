//! `SqliteDatabase` is the SQLite ledger backend.
//!
//! It implements [`LedgerManagement`], [`WebhookEventManagement`] and [`FeeSettings`] on top of the functions in
//! [`super::db`].
use std::{fmt::Debug, time::Duration};

use log::*;
use sqlx::{migrate::MigrateError, SqlitePool};

use super::db::{accounts, db_url, fee_settings, new_pool, payouts, transactions, webhook_events};
use crate::{
    db_types::{
        AccountStatus,
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
    helpers::{lease_expiry_ms, now_ms},
    traits::{
        AccountChanged,
        FeePolicyError,
        FeeSettings,
        InsertResult,
        LedgerError,
        LedgerManagement,
        PayoutQueryFilter,
        RefundableCharge,
        TransactionQueryFilter,
        WebhookEventError,
        WebhookEventManagement,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SqliteDatabase ({})", self.url)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `VPG_DATABASE_URL`
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date. Safe to call on every start.
    pub async fn run_migrations(&self) -> Result<(), MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    pub async fn close(&mut self) {
        self.pool.close().await;
    }
}

impl LedgerManagement for SqliteDatabase {
    async fn fetch_account(&self, account_id: i64) -> Result<Option<ConnectedAccount>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(accounts::fetch_account(account_id, &mut conn).await?)
    }

    async fn fetch_account_by_external_id(
        &self,
        external_account_id: &str,
    ) -> Result<Option<ConnectedAccount>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(accounts::fetch_by_external_id(external_account_id, &mut conn).await?)
    }

    async fn fetch_accounts_for_org(&self, org_id: &OrgId) -> Result<Vec<ConnectedAccount>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(accounts::fetch_for_org(org_id, &mut conn).await?)
    }

    async fn insert_account(
        &self,
        account: NewConnectedAccount,
    ) -> Result<InsertResult<ConnectedAccount>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let result = accounts::insert_account(account, &mut conn).await?;
        if let InsertResult::Inserted(a) = &result {
            info!("🗃️ Connected account {} registered for org {} with id {}", a.external_account_id, a.org_id, a.id);
        }
        Ok(result)
    }

    async fn upsert_account(&self, update: AccountUpdate) -> Result<Option<AccountChanged>, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let result = accounts::upsert_account(update, &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn disable_account(&self, external_account_id: &str) -> Result<Option<AccountChanged>, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let Some(old) = accounts::fetch_by_external_id(external_account_id, &mut tx).await? else {
            return Ok(None);
        };
        let new = accounts::set_status(external_account_id, AccountStatus::Disabled, &mut tx).await?;
        tx.commit().await?;
        Ok(new.map(|new| AccountChanged::new(Some(old), new)))
    }

    async fn reauthorize_account(&self, external_account_id: &str) -> Result<Option<AccountChanged>, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let Some(old) = accounts::fetch_by_external_id(external_account_id, &mut tx).await? else {
            return Ok(None);
        };
        let new = accounts::reauthorize(&old, &mut tx).await?.unwrap_or_else(|| old.clone());
        tx.commit().await?;
        Ok(Some(AccountChanged::new(Some(old), new)))
    }

    async fn fetch_transaction(&self, id: i64) -> Result<Option<Transaction>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(transactions::fetch_transaction(id, &mut conn).await?)
    }

    async fn fetch_charge_by_external_id(&self, external_charge_id: &str) -> Result<Option<Transaction>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(transactions::fetch_charge_by_external_id(external_charge_id, &mut conn).await?)
    }

    async fn fetch_refundable_charge(&self, id: i64) -> Result<Option<RefundableCharge>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        transactions::fetch_refundable_charge(id, &mut conn).await
    }

    async fn insert_charge(&self, charge: NewCharge) -> Result<InsertResult<Transaction>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        transactions::insert_charge(charge, &mut conn).await
    }

    async fn update_charge_status(
        &self,
        external_charge_id: &str,
        status: TransactionStatus,
    ) -> Result<Option<Transaction>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(transactions::update_charge_status(external_charge_id, status, &mut conn).await?)
    }

    async fn insert_refund(&self, refund: NewRefund) -> Result<InsertResult<Transaction>, LedgerError> {
        let mut tx = self.pool.begin().await?;
        transactions::lock_charge(refund.charge_id, &mut tx).await?;
        let result = transactions::insert_refund(refund, &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn sync_charge_refund_status(&self, charge_id: i64) -> Result<Transaction, LedgerError> {
        let mut tx = self.pool.begin().await?;
        transactions::lock_charge(charge_id, &mut tx).await?;
        let charge = transactions::sync_refund_status(charge_id, &mut tx).await?;
        tx.commit().await?;
        Ok(charge)
    }

    async fn search_transactions(&self, query: TransactionQueryFilter) -> Result<Vec<Transaction>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(transactions::search_transactions(query, &mut conn).await?)
    }

    async fn fetch_payout_by_external_id(&self, external_payout_id: &str) -> Result<Option<Payout>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payouts::fetch_by_external_id(external_payout_id, &mut conn).await?)
    }

    async fn insert_payout(&self, payout: NewPayout) -> Result<InsertResult<Payout>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        payouts::insert_payout(payout, &mut conn).await
    }

    async fn update_payout(&self, update: PayoutUpdate) -> Result<Option<Payout>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payouts::update_payout(update, &mut conn).await?)
    }

    async fn search_payouts(&self, query: PayoutQueryFilter) -> Result<Vec<Payout>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payouts::search_payouts(query, &mut conn).await?)
    }
}

impl WebhookEventManagement for SqliteDatabase {
    async fn claim_event(&self, event: NewWebhookEvent, lease: Duration) -> Result<Admission, WebhookEventError> {
        let mut conn = self.pool.acquire().await?;
        if webhook_events::insert_event(&event, lease_expiry_ms(lease), &mut conn).await? {
            return Ok(Admission::FirstSeen);
        }
        webhook_events::claim_existing(&event.event_id, now_ms(), lease_expiry_ms(lease), &mut conn).await
    }

    async fn claim_existing_event(&self, event_id: &str, lease: Duration) -> Result<Admission, WebhookEventError> {
        let mut conn = self.pool.acquire().await?;
        webhook_events::claim_existing(event_id, now_ms(), lease_expiry_ms(lease), &mut conn).await
    }

    async fn mark_event_processed(&self, event_id: &str) -> Result<(), WebhookEventError> {
        let mut conn = self.pool.acquire().await?;
        webhook_events::mark_processed(event_id, &mut conn).await
    }

    async fn record_event_failure(&self, event_id: &str, error: &str) -> Result<(), WebhookEventError> {
        let mut conn = self.pool.acquire().await?;
        webhook_events::record_failure(event_id, error, &mut conn).await
    }

    async fn fetch_event(&self, event_id: &str) -> Result<Option<WebhookEventRecord>, WebhookEventError> {
        let mut conn = self.pool.acquire().await?;
        Ok(webhook_events::fetch_event(event_id, &mut conn).await?)
    }

    async fn fetch_unprocessed_events(&self, limit: i64) -> Result<Vec<WebhookEventRecord>, WebhookEventError> {
        let mut conn = self.pool.acquire().await?;
        Ok(webhook_events::fetch_unprocessed(limit, &mut conn).await?)
    }
}

impl FeeSettings for SqliteDatabase {
    async fn fetch_org_fee_override(&self, org_id: &OrgId) -> Result<Option<FeePercent>, FeePolicyError> {
        let mut conn = self.pool.acquire().await?;
        fee_settings::fetch_org_override(org_id, &mut conn).await
    }

    async fn set_org_fee_override(&self, org_id: &OrgId, percent: Option<FeePercent>) -> Result<(), FeePolicyError> {
        let mut conn = self.pool.acquire().await?;
        match percent {
            Some(p) => fee_settings::upsert_org_override(org_id, p, &mut conn).await,
            None => fee_settings::delete_org_override(org_id, &mut conn).await,
        }
    }

    async fn fetch_platform_fee(&self) -> Result<Option<FeePercent>, FeePolicyError> {
        let mut conn = self.pool.acquire().await?;
        fee_settings::fetch_platform_fee(&mut conn).await
    }

    async fn set_platform_fee(&self, percent: FeePercent) -> Result<(), FeePolicyError> {
        let mut conn = self.pool.acquire().await?;
        fee_settings::upsert_platform_fee(percent, &mut conn).await
    }
}
