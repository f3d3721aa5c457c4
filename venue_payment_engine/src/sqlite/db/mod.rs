//! # SQLite ledger functions
//!
//! The low-level SQLite interactions for the ledger.
//!
//! These are plain functions that take a `&mut SqliteConnection`. Callers obtain a connection from the pool, or open a
//! transaction and pass `&mut tx`, without any other change to the call.
use std::{env, str::FromStr, time::Duration};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

pub mod accounts;
pub mod fee_settings;
pub mod payouts;
pub mod transactions;
pub mod webhook_events;

const SQLITE_DB_URL: &str = "sqlite://data/venue_ledger.db";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub fn db_url() -> String {
    let result = env::var("VPG_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ VPG_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}

pub(crate) fn is_unique_violation(e: &SqlxError) -> bool {
    matches!(e, SqlxError::Database(err) if err.is_unique_violation())
}
