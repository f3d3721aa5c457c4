use log::{debug, warn};
use sqlx::SqliteConnection;

use super::is_unique_violation;
use crate::{
    db_types::{AccountStatus, AccountUpdate, ConnectedAccount, NewConnectedAccount, OrgId},
    traits::{AccountChanged, InsertResult, LedgerError},
};

pub async fn fetch_account(id: i64, conn: &mut SqliteConnection) -> Result<Option<ConnectedAccount>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM connected_accounts WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_by_external_id(
    external_account_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<ConnectedAccount>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM connected_accounts WHERE external_account_id = $1")
        .bind(external_account_id)
        .fetch_optional(conn)
        .await
}

pub async fn fetch_for_org(org_id: &OrgId, conn: &mut SqliteConnection) -> Result<Vec<ConnectedAccount>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM connected_accounts WHERE org_id = $1 ORDER BY id")
        .bind(org_id.as_str())
        .fetch_all(conn)
        .await
}

/// Inserts a new `pending` account. If the external account id is already registered, the existing row is returned.
pub async fn insert_account(
    account: NewConnectedAccount,
    conn: &mut SqliteConnection,
) -> Result<InsertResult<ConnectedAccount>, LedgerError> {
    let result = sqlx::query_as(
        "INSERT INTO connected_accounts (external_account_id, org_id, status) VALUES ($1, $2, 'pending') RETURNING *",
    )
    .bind(&account.external_account_id)
    .bind(account.org_id.as_str())
    .fetch_one(&mut *conn)
    .await;
    match result {
        Ok(inserted) => Ok(InsertResult::Inserted(inserted)),
        Err(e) if is_unique_violation(&e) => {
            let existing = fetch_by_external_id(&account.external_account_id, conn).await?;
            existing.map(InsertResult::AlreadyExists).ok_or_else(|| LedgerError::from(e))
        },
        Err(e) => Err(e.into()),
    }
}

/// Writes the account fields from an account-update event in a single statement.
///
/// The status is derived from the capability flags, except that `disabled` is preserved. If the update carries an
/// organization id, a missing account is created; otherwise a missing account is left alone and `None` is returned.
pub async fn upsert_account(
    update: AccountUpdate,
    conn: &mut SqliteConnection,
) -> Result<Option<AccountChanged>, LedgerError> {
    let old = fetch_by_external_id(&update.external_account_id, &mut *conn).await?;
    let status = update.derived_status();
    let new: Option<ConnectedAccount> = match &update.org_id {
        Some(org_id) => {
            let account = sqlx::query_as(
                r#"
                INSERT INTO connected_accounts (
                    external_account_id,
                    org_id,
                    status,
                    charges_enabled,
                    payouts_enabled,
                    details_submitted,
                    business_name,
                    country,
                    default_currency
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (external_account_id) DO UPDATE SET
                    status = CASE WHEN connected_accounts.status = 'disabled' THEN 'disabled' ELSE excluded.status END,
                    charges_enabled = excluded.charges_enabled,
                    payouts_enabled = excluded.payouts_enabled,
                    details_submitted = excluded.details_submitted,
                    business_name = excluded.business_name,
                    country = excluded.country,
                    default_currency = excluded.default_currency,
                    updated_at = CURRENT_TIMESTAMP
                RETURNING *;
                "#,
            )
            .bind(&update.external_account_id)
            .bind(org_id.as_str())
            .bind(status)
            .bind(update.charges_enabled)
            .bind(update.payouts_enabled)
            .bind(update.details_submitted)
            .bind(&update.business_name)
            .bind(&update.country)
            .bind(&update.default_currency)
            .fetch_one(&mut *conn)
            .await?;
            Some(account)
        },
        None => {
            sqlx::query_as(
                r#"
                UPDATE connected_accounts SET
                    status = CASE WHEN status = 'disabled' THEN 'disabled' ELSE $1 END,
                    charges_enabled = $2,
                    payouts_enabled = $3,
                    details_submitted = $4,
                    business_name = $5,
                    country = $6,
                    default_currency = $7,
                    updated_at = CURRENT_TIMESTAMP
                WHERE external_account_id = $8
                RETURNING *;
                "#,
            )
            .bind(status)
            .bind(update.charges_enabled)
            .bind(update.payouts_enabled)
            .bind(update.details_submitted)
            .bind(&update.business_name)
            .bind(&update.country)
            .bind(&update.default_currency)
            .bind(&update.external_account_id)
            .fetch_optional(&mut *conn)
            .await?
        },
    };
    match new {
        Some(new) => {
            if new.is_disabled() && status != AccountStatus::Disabled {
                warn!(
                    "🗃️ Account {} is disabled. The update was stored but the account stays disabled until it is \
                     re-authorized.",
                    new.external_account_id
                );
            }
            debug!("🗃️ Account {} is now {}", new.external_account_id, new.status);
            Ok(Some(AccountChanged::new(old, new)))
        },
        None => Ok(None),
    }
}

pub async fn set_status(
    external_account_id: &str,
    status: AccountStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<ConnectedAccount>, sqlx::Error> {
    sqlx::query_as(
        "UPDATE connected_accounts SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE external_account_id = $2 \
         RETURNING *",
    )
    .bind(status)
    .bind(external_account_id)
    .fetch_optional(conn)
    .await
}

/// Clears `disabled` by recomputing the status from the stored flags. The update only applies to disabled accounts.
pub async fn reauthorize(
    account: &ConnectedAccount,
    conn: &mut SqliteConnection,
) -> Result<Option<ConnectedAccount>, sqlx::Error> {
    let status = AccountStatus::derive(account.details_submitted, account.charges_enabled);
    sqlx::query_as(
        "UPDATE connected_accounts SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND status = \
         'disabled' RETURNING *",
    )
    .bind(status)
    .bind(account.id)
    .fetch_optional(conn)
    .await
}
