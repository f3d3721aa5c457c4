use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};
use venue_payment_engine::{
    db_types::{NewConnectedAccount, OrgId},
    LedgerManagement,
    SqliteDatabase,
};

pub fn random_db_path() -> String {
    let path = std::env::temp_dir().join(format!("vpg_it_ledger_{}.db", rand::random::<u64>()));
    format!("sqlite://{}", path.display())
}

pub async fn prepare_test_env() -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    let url = random_db_path();
    if let Err(e) = Sqlite::drop_database(&url).await {
        trace!("🚀️ Nothing to drop at {url}: {e:?}");
    }
    Sqlite::create_database(&url).await.expect("Error creating database");
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error connecting to database");
    db.run_migrations().await.expect("Error running migrations");
    debug!("🚀️ Test database ready at {url}");
    db
}

pub async fn tear_down(mut db: SqliteDatabase) {
    let url = db.url().to_string();
    db.close().await;
    if let Err(e) = Sqlite::drop_database(&url).await {
        warn!("🚀️ Failed to drop test database {url}: {e:?}");
    }
}

/// Registers `external_id` for the org, as the onboarding flow would.
pub async fn seed_account(db: &SqliteDatabase, external_id: &str, org: &str) -> i64 {
    db.insert_account(NewConnectedAccount::new(external_id, OrgId::from(org)))
        .await
        .expect("Error seeding account")
        .into_inner()
        .id
}
