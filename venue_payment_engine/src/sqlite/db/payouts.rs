use log::trace;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use super::is_unique_violation;
use crate::{
    db_types::{NewPayout, Payout, PayoutUpdate},
    traits::{InsertResult, LedgerError, PayoutQueryFilter},
};

pub async fn fetch_by_external_id(
    external_payout_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payout>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payouts WHERE external_payout_id = $1")
        .bind(external_payout_id)
        .fetch_optional(conn)
        .await
}

pub async fn insert_payout(payout: NewPayout, conn: &mut SqliteConnection) -> Result<InsertResult<Payout>, LedgerError> {
    let result = sqlx::query_as(
        r#"
            INSERT INTO payouts (account_id, external_payout_id, amount, currency, status, arrival_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(payout.account_id)
    .bind(&payout.external_payout_id)
    .bind(payout.amount)
    .bind(&payout.currency)
    .bind(payout.status)
    .bind(payout.arrival_date)
    .fetch_one(&mut *conn)
    .await;
    match result {
        Ok(p) => Ok(InsertResult::Inserted(p)),
        Err(e) if is_unique_violation(&e) => {
            let existing = fetch_by_external_id(&payout.external_payout_id, conn).await?;
            existing.map(InsertResult::AlreadyExists).ok_or_else(|| LedgerError::from(e))
        },
        Err(e) => Err(e.into()),
    }
}

/// Applies a payout status update if the current status is an allowed predecessor of the new one. Failure fields and
/// the arrival date are only overwritten when the update carries a value.
pub async fn update_payout(update: PayoutUpdate, conn: &mut SqliteConnection) -> Result<Option<Payout>, sqlx::Error> {
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE payouts SET status = ");
    builder.push_bind(update.status);
    builder.push(", arrival_date = COALESCE(");
    builder.push_bind(update.arrival_date);
    builder.push(", arrival_date), failure_code = COALESCE(");
    builder.push_bind(update.failure_code);
    builder.push(", failure_code), failure_message = COALESCE(");
    builder.push_bind(update.failure_message);
    builder.push(", failure_message), updated_at = CURRENT_TIMESTAMP WHERE external_payout_id = ");
    builder.push_bind(update.external_payout_id);
    builder.push(" AND status IN (");
    let mut list = builder.separated(", ");
    for s in update.status.predecessors() {
        list.push_bind(*s);
    }
    builder.push(") RETURNING *");
    trace!("🗃️ Executing query: {}", builder.sql());
    builder.build_query_as::<Payout>().fetch_optional(conn).await
}

pub async fn search_payouts(query: PayoutQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Payout>, sqlx::Error> {
    let mut builder = QueryBuilder::<Sqlite>::new(
        "SELECT payouts.* FROM payouts JOIN connected_accounts ON connected_accounts.id = payouts.account_id ",
    );
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(org_id) = query.org_id {
        where_clause.push("connected_accounts.org_id = ");
        where_clause.push_bind_unseparated(org_id.0);
    }
    if let Some(statuses) = query.status.filter(|s| !s.is_empty()) {
        where_clause.push("payouts.status IN (");
        for (i, status) in statuses.into_iter().enumerate() {
            if i > 0 {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(status);
        }
        where_clause.push_unseparated(")");
    }
    if let Some(since) = query.since {
        where_clause.push("datetime(payouts.created_at) >= datetime(");
        where_clause.push_bind_unseparated(since);
        where_clause.push_unseparated(")");
    }
    if let Some(until) = query.until {
        where_clause.push("datetime(payouts.created_at) <= datetime(");
        where_clause.push_bind_unseparated(until);
        where_clause.push_unseparated(")");
    }
    builder.push(" ORDER BY payouts.created_at ASC, payouts.id ASC");
    trace!("🗃️ Executing query: {}", builder.sql());
    builder.build_query_as::<Payout>().fetch_all(conn).await
}
