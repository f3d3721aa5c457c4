use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{ConnectedAccount, NewConnectedAccount, OrgId, Payout, Transaction},
    events::{AccountStatusChangedEvent, EventProducers},
    traits::{InsertResult, LedgerError, LedgerManagement, PayoutQueryFilter, TransactionQueryFilter},
};

/// `LedgerApi` covers onboarding and the operator's read access to the ledger.
///
/// Queries are always scoped to a single organization.
pub struct LedgerApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for LedgerApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LedgerApi")
    }
}

impl<B> LedgerApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> LedgerApi<B>
where B: LedgerManagement
{
    /// Records the link between an organization and its connected account when onboarding starts.
    pub async fn register_account(
        &self,
        account: NewConnectedAccount,
    ) -> Result<InsertResult<ConnectedAccount>, LedgerError> {
        let result = self.db.insert_account(account).await?;
        if let InsertResult::AlreadyExists(a) = &result {
            debug!("📒️ Connected account {} is already registered to org {}", a.external_account_id, a.org_id);
        }
        Ok(result)
    }

    /// The explicit re-onboarding path for a disabled account.
    pub async fn reauthorize_account(&self, external_account_id: &str) -> Result<ConnectedAccount, LedgerError> {
        let changed = self
            .db
            .reauthorize_account(external_account_id)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(external_account_id.to_string()))?;
        if changed.status_changed() {
            info!("📒️ Account {external_account_id} re-authorized by an operator. Status is now {}", changed.new.status);
            let event = AccountStatusChangedEvent::new(changed.old_status(), changed.new.clone());
            self.producers.publish_account_status_changed(event).await;
        }
        Ok(changed.new)
    }

    pub async fn fetch_account(&self, external_account_id: &str) -> Result<Option<ConnectedAccount>, LedgerError> {
        self.db.fetch_account_by_external_id(external_account_id).await
    }

    pub async fn accounts_for_org(&self, org_id: &OrgId) -> Result<Vec<ConnectedAccount>, LedgerError> {
        self.db.fetch_accounts_for_org(org_id).await
    }

    /// Transactions for the organization's accounts. Any organization set on the filter is replaced by `org_id`.
    pub async fn transactions_for_org(
        &self,
        org_id: &OrgId,
        mut filter: TransactionQueryFilter,
    ) -> Result<Vec<Transaction>, LedgerError> {
        filter.org_id = Some(org_id.clone());
        trace!("📒️ Searching transactions. {filter}");
        self.db.search_transactions(filter).await
    }

    /// Payouts to the organization's accounts. Any organization set on the filter is replaced by `org_id`.
    pub async fn payouts_for_org(
        &self,
        org_id: &OrgId,
        mut filter: PayoutQueryFilter,
    ) -> Result<Vec<Payout>, LedgerError> {
        filter.org_id = Some(org_id.clone());
        self.db.search_payouts(filter).await
    }
}
