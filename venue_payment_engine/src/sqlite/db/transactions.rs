use log::{debug, trace};
use sqlx::{types::Json, QueryBuilder, Sqlite, SqliteConnection};

use super::is_unique_violation;
use crate::{
    db_types::{FeeSource, MinorUnits, NewCharge, NewRefund, Transaction, TransactionStatus},
    traits::{InsertResult, LedgerError, RefundableCharge, TransactionQueryFilter},
};

pub async fn fetch_transaction(id: i64, conn: &mut SqliteConnection) -> Result<Option<Transaction>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM transactions WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_charge_by_external_id(
    external_charge_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM transactions WHERE txn_type = 'charge' AND external_charge_id = $1")
        .bind(external_charge_id)
        .fetch_optional(conn)
        .await
}

pub async fn fetch_refund_by_external_id(
    external_refund_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM transactions WHERE txn_type = 'refund' AND external_refund_id = $1")
        .bind(external_refund_id)
        .fetch_optional(conn)
        .await
}

/// The sum of all refund rows recorded against the charge.
pub async fn refunded_total(external_charge_id: &str, conn: &mut SqliteConnection) -> Result<MinorUnits, sqlx::Error> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount), 0) FROM transactions WHERE txn_type = 'refund' AND external_charge_id = $1",
    )
    .bind(external_charge_id)
    .fetch_one(conn)
    .await?;
    Ok(MinorUnits::from(total))
}

pub async fn fetch_refundable_charge(
    id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<RefundableCharge>, LedgerError> {
    let Some(charge) = fetch_transaction(id, &mut *conn).await? else {
        return Ok(None);
    };
    if !charge.is_charge() {
        return Err(LedgerError::NotACharge(id));
    }
    let refunded = match &charge.external_charge_id {
        Some(cid) => refunded_total(cid, conn).await?,
        None => MinorUnits::ZERO,
    };
    Ok(Some(RefundableCharge { charge, refunded }))
}

/// Inserts the charge. If a charge with the same external charge id is already recorded, that row is returned
/// unchanged.
pub async fn insert_charge(
    charge: NewCharge,
    conn: &mut SqliteConnection,
) -> Result<InsertResult<Transaction>, LedgerError> {
    let net_amount = charge.net_amount();
    let result = sqlx::query_as(
        r#"
            INSERT INTO transactions (
                account_id,
                txn_type,
                status,
                external_charge_id,
                external_payment_intent_id,
                amount,
                currency,
                platform_fee,
                processor_fee,
                processor_fee_source,
                net_amount,
                metadata
            ) VALUES ($1, 'charge', $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *;
        "#,
    )
    .bind(charge.account_id)
    .bind(charge.status)
    .bind(&charge.external_charge_id)
    .bind(&charge.external_payment_intent_id)
    .bind(charge.amount)
    .bind(&charge.currency)
    .bind(charge.platform_fee)
    .bind(charge.processor_fee.amount)
    .bind(charge.processor_fee.source)
    .bind(net_amount)
    .bind(Json(&charge.metadata))
    .fetch_one(&mut *conn)
    .await;
    match result {
        Ok(txn) => Ok(InsertResult::Inserted(txn)),
        Err(e) if is_unique_violation(&e) => {
            let existing = fetch_charge_by_external_id(&charge.external_charge_id, conn).await?;
            existing.map(InsertResult::AlreadyExists).ok_or_else(|| LedgerError::from(e))
        },
        Err(e) => Err(e.into()),
    }
}

/// Validates the refund against the charge's remaining balance and inserts the refund row.
///
/// Run this inside a write transaction: the balance check and the insert must see the same refund totals.
pub async fn insert_refund(
    refund: NewRefund,
    conn: &mut SqliteConnection,
) -> Result<InsertResult<Transaction>, LedgerError> {
    if let Some(refund_id) = &refund.external_refund_id {
        if let Some(existing) = fetch_refund_by_external_id(refund_id, &mut *conn).await? {
            debug!("🗃️ Refund {refund_id} is already recorded as transaction #{}", existing.id);
            return Ok(InsertResult::AlreadyExists(existing));
        }
    }
    let RefundableCharge { charge, refunded } = fetch_refundable_charge(refund.charge_id, &mut *conn)
        .await?
        .ok_or(LedgerError::TransactionNotFound(refund.charge_id))?;
    if !matches!(charge.status, TransactionStatus::Succeeded | TransactionStatus::PartiallyRefunded) {
        return Err(LedgerError::NotRefundable { id: charge.id, status: charge.status });
    }
    let remaining = charge.amount - refunded;
    if refund.amount > remaining {
        return Err(LedgerError::ExceedsRefundableBalance { requested: refund.amount, remaining });
    }
    let txn: Transaction = sqlx::query_as(
        r#"
            INSERT INTO transactions (
                account_id,
                txn_type,
                status,
                external_charge_id,
                external_payment_intent_id,
                external_refund_id,
                amount,
                currency,
                platform_fee,
                processor_fee,
                processor_fee_source,
                net_amount,
                metadata
            ) VALUES ($1, 'refund', 'succeeded', $2, $3, $4, $5, $6, 0, 0, $7, $8, $9)
            RETURNING *;
        "#,
    )
    .bind(charge.account_id)
    .bind(&charge.external_charge_id)
    .bind(&charge.external_payment_intent_id)
    .bind(&refund.external_refund_id)
    .bind(refund.amount)
    .bind(&charge.currency)
    .bind(FeeSource::Reported)
    .bind(-refund.amount)
    .bind(Json(&refund.metadata))
    .fetch_one(conn)
    .await?;
    debug!(
        "🗃️ Refund #{} of {} {} recorded against charge #{} ({} of {} now refunded)",
        txn.id,
        txn.amount,
        txn.currency,
        charge.id,
        refunded + refund.amount,
        charge.amount
    );
    Ok(InsertResult::Inserted(txn))
}

/// Moves a charge to `status` if its current status allows it. Returns `None` if no charge matched.
pub async fn update_charge_status(
    external_charge_id: &str,
    status: TransactionStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, sqlx::Error> {
    let predecessors = status.charge_predecessors();
    if predecessors.is_empty() {
        return Ok(None);
    }
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE transactions SET status = ");
    builder.push_bind(status);
    builder.push(", updated_at = CURRENT_TIMESTAMP WHERE txn_type = 'charge' AND external_charge_id = ");
    builder.push_bind(external_charge_id);
    builder.push(" AND status IN (");
    let mut list = builder.separated(", ");
    for s in predecessors {
        list.push_bind(*s);
    }
    builder.push(") RETURNING *");
    trace!("🗃️ Executing query: {}", builder.sql());
    builder.build_query_as::<Transaction>().fetch_optional(conn).await
}

/// Recomputes `refunded` / `partially_refunded` for the charge from its refund rows.
///
/// Charges whose current status does not allow the move (e.g. disputed) are returned unchanged.
pub async fn sync_refund_status(charge_id: i64, conn: &mut SqliteConnection) -> Result<Transaction, LedgerError> {
    let RefundableCharge { charge, refunded } = fetch_refundable_charge(charge_id, &mut *conn)
        .await?
        .ok_or(LedgerError::TransactionNotFound(charge_id))?;
    let target = TransactionStatus::for_refunded_amount(charge.amount, refunded);
    if target == TransactionStatus::Succeeded || target == charge.status {
        return Ok(charge);
    }
    let Some(external_charge_id) = charge.external_charge_id.as_deref() else {
        return Ok(charge);
    };
    match update_charge_status(external_charge_id, target, conn).await? {
        Some(updated) => {
            debug!("🗃️ Charge #{charge_id} is now {target} ({refunded} of {} refunded)", updated.amount);
            Ok(updated)
        },
        None => {
            debug!("🗃️ Charge #{charge_id} is {} and was not moved to {target}", charge.status);
            Ok(charge)
        },
    }
}

/// Takes the write lock on the database by touching the charge row, so that reads that follow in the same transaction
/// cannot be invalidated by a concurrent writer.
pub async fn lock_charge(charge_id: i64, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE transactions SET updated_at = updated_at WHERE id = $1").bind(charge_id).execute(conn).await?;
    Ok(())
}

/// Fetches transactions according to the filter, oldest first.
pub async fn search_transactions(
    query: TransactionQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<Transaction>, sqlx::Error> {
    let mut builder = QueryBuilder::<Sqlite>::new(
        "SELECT transactions.* FROM transactions JOIN connected_accounts ON connected_accounts.id = \
         transactions.account_id ",
    );
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(org_id) = query.org_id {
        where_clause.push("connected_accounts.org_id = ");
        where_clause.push_bind_unseparated(org_id.0);
    }
    if let Some(account_id) = query.account_id {
        where_clause.push("transactions.account_id = ");
        where_clause.push_bind_unseparated(account_id);
    }
    if let Some(charge_id) = query.external_charge_id {
        where_clause.push("transactions.external_charge_id = ");
        where_clause.push_bind_unseparated(charge_id);
    }
    if let Some(statuses) = query.status.filter(|s| !s.is_empty()) {
        where_clause.push("transactions.status IN (");
        for (i, status) in statuses.into_iter().enumerate() {
            if i > 0 {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(status);
        }
        where_clause.push_unseparated(")");
    }
    if let Some(since) = query.since {
        where_clause.push("datetime(transactions.created_at) >= datetime(");
        where_clause.push_bind_unseparated(since);
        where_clause.push_unseparated(")");
    }
    if let Some(until) = query.until {
        where_clause.push("datetime(transactions.created_at) <= datetime(");
        where_clause.push_bind_unseparated(until);
        where_clause.push_unseparated(")");
    }
    builder.push(" ORDER BY transactions.created_at ASC, transactions.id ASC");
    trace!("🗃️ Executing query: {}", builder.sql());
    let transactions = builder.build_query_as::<Transaction>().fetch_all(conn).await?;
    trace!("🗃️ Result of search_transactions: {}", transactions.len());
    Ok(transactions)
}
