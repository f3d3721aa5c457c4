use thiserror::Error;

use crate::{
    db_types::{
        AccountUpdate,
        ConnectedAccount,
        MinorUnits,
        NewCharge,
        NewConnectedAccount,
        NewPayout,
        NewRefund,
        OrgId,
        Payout,
        PayoutUpdate,
        Transaction,
        TransactionStatus,
    },
    traits::data_objects::{
        AccountChanged,
        InsertResult,
        PayoutQueryFilter,
        RefundableCharge,
        TransactionQueryFilter,
    },
};

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("User error constructing query: {0}")]
    QueryError(String),
    #[error("Connected account {0} does not exist")]
    AccountNotFound(String),
    #[error("Transaction {0} does not exist")]
    TransactionNotFound(i64),
    #[error("Transaction {0} is not a charge")]
    NotACharge(i64),
    #[error("Charge {id} is {status} and is not refundable")]
    NotRefundable { id: i64, status: TransactionStatus },
    #[error("Refund of {requested} exceeds the remaining refundable balance of {remaining}")]
    ExceedsRefundableBalance { requested: MinorUnits, remaining: MinorUnits },
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::DatabaseError(e.to_string())
    }
}

/// The ledger store: connected accounts, transactions and payouts.
///
/// Every mutation is keyed. Inserts are insert-if-absent against the natural (external) key and report whether the
/// row already existed. Updates are conditional on the key and, where a state machine applies, on the current status;
/// an update that matches no row is a no-op that returns `None` rather than an error. This makes every method safe to
/// call again after a partial failure.
#[allow(async_fn_in_trait)]
pub trait LedgerManagement: Clone {
    //---------------------------------------------- Accounts ----------------------------------------------------------
    async fn fetch_account(&self, account_id: i64) -> Result<Option<ConnectedAccount>, LedgerError>;

    async fn fetch_account_by_external_id(
        &self,
        external_account_id: &str,
    ) -> Result<Option<ConnectedAccount>, LedgerError>;

    async fn fetch_accounts_for_org(&self, org_id: &OrgId) -> Result<Vec<ConnectedAccount>, LedgerError>;

    /// Records a connected account for an organization that has started onboarding. The account starts as `pending`.
    async fn insert_account(
        &self,
        account: NewConnectedAccount,
    ) -> Result<InsertResult<ConnectedAccount>, LedgerError>;

    /// Overwrites the capability flags and descriptive fields of the account and recomputes its status.
    ///
    /// A `disabled` account keeps its status. If no account exists and the update carries an organization id, the
    /// account is created. Otherwise `None` is returned.
    async fn upsert_account(&self, update: AccountUpdate) -> Result<Option<AccountChanged>, LedgerError>;

    /// Marks the account as `disabled`. Returns `None` if the account does not exist.
    async fn disable_account(&self, external_account_id: &str) -> Result<Option<AccountChanged>, LedgerError>;

    /// Clears `disabled`, recomputing the status from the stored capability flags. Accounts that are not disabled are
    /// returned unchanged. Returns `None` if the account does not exist.
    async fn reauthorize_account(&self, external_account_id: &str) -> Result<Option<AccountChanged>, LedgerError>;

    //-------------------------------------------- Transactions --------------------------------------------------------
    async fn fetch_transaction(&self, id: i64) -> Result<Option<Transaction>, LedgerError>;

    async fn fetch_charge_by_external_id(&self, external_charge_id: &str) -> Result<Option<Transaction>, LedgerError>;

    /// Fetches the charge with the given id along with the sum of the refund rows recorded against it.
    async fn fetch_refundable_charge(&self, id: i64) -> Result<Option<RefundableCharge>, LedgerError>;

    /// Inserts the charge unless a charge with the same external charge id already exists.
    async fn insert_charge(&self, charge: NewCharge) -> Result<InsertResult<Transaction>, LedgerError>;

    /// Moves the charge to `status` if its current status is an allowed predecessor (see
    /// [`TransactionStatus::charge_predecessors`]). Returns the updated row, or `None` if no charge matched.
    async fn update_charge_status(
        &self,
        external_charge_id: &str,
        status: TransactionStatus,
    ) -> Result<Option<Transaction>, LedgerError>;

    /// Atomically re-checks the refundable balance of the charge and inserts the refund row.
    ///
    /// If the refund carries an external refund id that is already recorded, the existing row is returned as
    /// [`InsertResult::AlreadyExists`] and the balance is not checked again.
    async fn insert_refund(&self, refund: NewRefund) -> Result<InsertResult<Transaction>, LedgerError>;

    /// Re-derives `refunded` or `partially_refunded` for the charge from the refund rows recorded against it. This is a
    /// pure function of the current totals and can be repeated safely.
    async fn sync_charge_refund_status(&self, charge_id: i64) -> Result<Transaction, LedgerError>;

    async fn search_transactions(&self, query: TransactionQueryFilter) -> Result<Vec<Transaction>, LedgerError>;

    //---------------------------------------------- Payouts -----------------------------------------------------------
    async fn fetch_payout_by_external_id(&self, external_payout_id: &str) -> Result<Option<Payout>, LedgerError>;

    async fn insert_payout(&self, payout: NewPayout) -> Result<InsertResult<Payout>, LedgerError>;

    /// Applies the status and failure fields, subject to [`crate::db_types::PayoutStatus::predecessors`]. Returns
    /// `None` if no payout matched.
    async fn update_payout(&self, update: PayoutUpdate) -> Result<Option<Payout>, LedgerError>;

    async fn search_payouts(&self, query: PayoutQueryFilter) -> Result<Vec<Payout>, LedgerError>;
}

